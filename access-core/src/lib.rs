//! XACML-aligned authorization decision pipeline.
//!
//! The crate decomposes an authorization decision into cooperating roles:
//! an information point supplying attribute bundles ([`info`]), a retriever
//! returning policy content ([`retrieve`]), resolvers proposing applicable
//! policies ([`resolve`]), a pluggable evaluator ([`evaluate`]), the
//! decision point orchestrating them ([`decision`]), and the context handler
//! that enriches raw access requests and drives the decision point
//! ([`context`]). The enforcement point that gates HTTP requests on the
//! resulting decisions lives in the companion `access-enforcer` crate.
//!
//! No state outlives a request: every record is built while serving one
//! access request and dropped with its response.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod context;
pub mod decision;
pub mod errors;
pub mod evaluate;
pub mod info;
pub mod model;
pub mod resolve;
pub mod retrieve;

pub use context::{AccessEvaluator, ContextHandler, InfoAnalyser, RoleAnalyser};
pub use decision::{DecisionMaker, DecisionPoint};
pub use errors::{AccessError, BoxError, DecisionError, EvaluateError, InfoError, ResolveError, RetrieveError};
pub use evaluate::{ruleset::RuleSetEvaluator, PolicyEvaluator};
pub use info::{InfoProvider, RoutingInfoProvider};
pub use model::{
    AccessRequest, AccessResponse, Action, Advice, Attributes, Decision, DecisionRequest,
    DecisionResponse, EnrichedAccessRequest, EvaluationResult, GetInfoRequest, GetInfoResponse,
    InfoParams, Obligation, Policy, PolicyIdReference, Resource, Status, StatusCode, Subject,
};
pub use resolve::{PolicyResolver, RoleResolver, StaticResolver};
pub use retrieve::{file_store::FileStore, PolicyRetriever};
