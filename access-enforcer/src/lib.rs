//! Policy enforcement point for axum applications.
//!
//! The enforcer wraps protected routes as middleware: it extracts an access
//! request (subject via a pluggable extractor, operation via
//! (path-pattern, method) bindings held in a route trie), asks the
//! `access-core` context handler for a decision, enforces the decision's
//! obligations (mandatory) and advices (best-effort), and either forwards to
//! the downstream handler or answers with a structured denial.
//!
//! ```ignore
//! let enforcer = Arc::new(
//!     Enforcer::new(context_handler, request_extractor)
//!         .with_obligation_handler(AUDIT_LOG_OBLIGATION_ID, Arc::new(AuditLogHandler::new()))
//!         .with_advice_handler(CACHE_HINT_ADVICE_ID, Arc::new(CacheHintHandler::new())),
//! );
//! let app = Router::new()
//!     .route("/orders", post(create_order))
//!     .layer(middleware::from_fn_with_state(enforcer, enforce));
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod advice;
pub mod enforcer;
pub mod errors;
pub mod extract;
pub mod obligation;
pub mod trie;

pub use advice::{CacheHintHandler, CACHE_HINT_ADVICE_ID, DEFAULT_TTL_HEADER};
pub use enforcer::{
    enforce, AdviceHandler, EnforcementContext, Enforcer, ErrorBody, ErrorFormatter, ObligationHandler,
};
pub use errors::{BuildError, ExtractError, HandlerError};
pub use extract::{
    uuid_segment, EntityOperationExtractor, ExtensionSubjectExtractor, IdExtractor, Operation,
    OperationExtractor, RequestExtractor, RequestExtractorBuilder, SubjectExtractor,
};
pub use obligation::{AuditLogHandler, AUDIT_LOG_OBLIGATION_ID};
pub use trie::{PathTrie, TrieError, WILDCARD_SEGMENT};
