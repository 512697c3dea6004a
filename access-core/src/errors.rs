//! Error taxonomy for the decision pipeline.
//!
//! Component-internal recoverable conditions collapse into a
//! `DecisionResponse` at the decision-point boundary; only the errors defined
//! here cross component boundaries as `Err` values.

use thiserror::Error;

/// Boxed error used at pluggable seams (stores, custom resolvers, analysers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by information providers.
#[derive(Debug, Error)]
pub enum InfoError {
    /// No sub-provider is registered for the requested info type.
    #[error("unsupported info type {info_type}")]
    UnsupportedInfoType { info_type: String },

    /// The request parameters do not match the shape the provider accepts.
    #[error("{reason}")]
    InvalidParams { reason: String },

    /// The backing store failed while looking up attributes.
    #[error("{context}")]
    Lookup {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl InfoError {
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams { reason: reason.into() }
    }

    pub fn lookup(context: impl Into<String>, source: BoxError) -> Self {
        Self::Lookup { context: context.into(), source }
    }
}

/// Failures raised by policy retrievers.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("policy {id}@{version} not found")]
    NotFound {
        id: String,
        version: String,
        #[source]
        source: std::io::Error,
    },

    #[error("policy path for {id}@{version} is a directory, not a file")]
    NotAFile { id: String, version: String },

    #[error("failed to read policy {id}@{version}")]
    Read {
        id: String,
        version: String,
        #[source]
        source: std::io::Error,
    },

    /// Escape hatch for retriever implementations backed by other stores.
    #[error(transparent)]
    Store(#[from] BoxError),
}

/// Failures of the resolution phase inside the decision point.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no policy resolvers configured")]
    NoResolvers,

    #[error("duplicate policy reference detected: policy '{id}' version '{version}' returned by multiple resolvers")]
    DuplicateReference { id: String, version: String },

    #[error("duplicate policy ID '{id}' found: existing version '{existing}', conflicting version '{conflicting}'")]
    VersionConflict { id: String, existing: String, conflicting: String },

    #[error(transparent)]
    Resolver(#[from] BoxError),
}

/// Failures raised by policy evaluators.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("invalid decision request: {reason}")]
    InvalidRequest { reason: String },

    #[error("no policies provided for evaluation")]
    NoPolicies,

    #[error("malformed policy document {id}@{version}")]
    MalformedPolicy {
        id: String,
        version: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("policy evaluation failed: {reason}")]
    Evaluation { reason: String },

    #[error("no evaluation results returned from policy engine")]
    EmptyResult,

    #[error(transparent)]
    Engine(#[from] BoxError),
}

/// Input-validation failure at the decision-point entry. Everything else the
/// decision point encounters becomes a `DecisionResponse` instead.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision request id cannot be nil")]
    NilRequestId,
}

/// Failures crossing the context-handler boundary. These are distinct from a
/// Deny decision: the enforcement point maps them to internal errors.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("failed to enrich request: {source}")]
    Enrichment {
        #[source]
        source: InfoError,
    },

    #[error("failed to analyse requirements: {source}")]
    Analysis {
        #[source]
        source: BoxError,
    },

    #[error("failed to get additional info: {source}")]
    AdditionalInfo {
        #[source]
        source: InfoError,
    },

    #[error("failed to get additional info: duplicate info for {key}")]
    DuplicateInfo { key: String },

    #[error("failed to make decision: {source}")]
    Decision {
        #[source]
        source: DecisionError,
    },
}
