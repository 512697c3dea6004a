//! Access-request extraction: subject identity plus the operation implied by
//! the request's path and method.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use uuid::Uuid;

use access_core::{AccessRequest, Action, Resource, Subject};

use crate::errors::{BuildError, ExtractError};
use crate::trie::PathTrie;

/// An action and resource pair extracted from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub action: Action,
    pub resource: Resource,
}

/// Extracts the requesting subject from an HTTP request.
#[async_trait]
pub trait SubjectExtractor: Send + Sync {
    async fn extract(&self, parts: &Parts) -> Result<Subject, ExtractError>;
}

/// Extracts the attempted operation from an HTTP request.
#[async_trait]
pub trait OperationExtractor: Send + Sync {
    async fn extract(&self, parts: &Parts) -> Result<Operation, ExtractError>;
}

/// Reads the subject from request extensions, where the embedding
/// application's authentication layer (JWT middleware or similar) is
/// expected to have stored it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionSubjectExtractor;

impl ExtensionSubjectExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubjectExtractor for ExtensionSubjectExtractor {
    async fn extract(&self, parts: &Parts) -> Result<Subject, ExtractError> {
        parts
            .extensions
            .get::<Subject>()
            .cloned()
            .ok_or_else(|| ExtractError::subject("subject not found in request extensions"))
    }
}

/// Extracts a resource id from request parts.
pub type IdExtractor = Arc<dyn Fn(&Parts) -> Result<String, ExtractError> + Send + Sync>;

/// Id extractor reading the path segment at `index` and requiring it to be a
/// UUID.
pub fn uuid_segment(index: usize) -> IdExtractor {
    Arc::new(move |parts: &Parts| {
        let path = parts.uri.path().to_string();
        let segments = path_segments(&path);
        let segment = segments.get(index).ok_or_else(|| {
            ExtractError::operation(format!("path {path} has no segment at position {index}"))
        })?;
        Uuid::parse_str(segment)
            .map_err(|_| ExtractError::operation(format!("segment '{segment}' is not a valid UUID")))?;
        Ok((*segment).to_string())
    })
}

/// Operation extractor for one entity type: a fixed action, a fixed resource
/// type, and an optional resource-id extractor for operations that address a
/// specific entity.
pub struct EntityOperationExtractor {
    action: String,
    resource_type: String,
    id_extractor: Option<IdExtractor>,
}

impl EntityOperationExtractor {
    /// Collection-level operations (create, list) carry no resource id.
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self { action: action.into(), resource_type: resource_type.into(), id_extractor: None }
    }

    /// Adds resource-id extraction for entity-level operations.
    #[must_use]
    pub fn with_id_extractor(mut self, id_extractor: IdExtractor) -> Self {
        self.id_extractor = Some(id_extractor);
        self
    }
}

#[async_trait]
impl OperationExtractor for EntityOperationExtractor {
    async fn extract(&self, parts: &Parts) -> Result<Operation, ExtractError> {
        let mut resource = Resource::new("", self.resource_type.clone());
        if let Some(id_extractor) = &self.id_extractor {
            resource.id = id_extractor(parts)?;
        }

        Ok(Operation { action: Action::new(self.action.clone()), resource })
    }
}

type OperationsByMethod = HashMap<String, Arc<dyn OperationExtractor>>;

/// Extracts a full [`AccessRequest`] from HTTP request parts: the subject via
/// the configured subject extractor, the operation via the
/// (path-pattern, method) bindings held in a route trie.
pub struct RequestExtractor {
    subject_extractor: Arc<dyn SubjectExtractor>,
    operations: PathTrie<OperationsByMethod>,
}

impl std::fmt::Debug for RequestExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExtractor").finish_non_exhaustive()
    }
}

impl RequestExtractor {
    pub fn builder() -> RequestExtractorBuilder {
        RequestExtractorBuilder::default()
    }

    pub async fn extract(&self, parts: &Parts) -> Result<AccessRequest, ExtractError> {
        let subject = self.subject_extractor.extract(parts).await?;
        let operation = self.extract_operation(parts).await?;

        Ok(AccessRequest { subject, action: operation.action, resource: operation.resource })
    }

    async fn extract_operation(&self, parts: &Parts) -> Result<Operation, ExtractError> {
        let path = parts.uri.path().to_string();
        let segments = path_segments(&path);

        let by_method = self
            .operations
            .search(&segments)
            .map_err(|_| ExtractError::UnknownPath { path: path.clone() })?;

        let method = parts.method.as_str().to_uppercase();
        let extractor = by_method
            .get(&method)
            .ok_or_else(|| ExtractError::UnknownMethod { method, path: path.clone() })?;

        extractor.extract(parts).await
    }
}

/// Builder for [`RequestExtractor`]. Operation registrations validate
/// eagerly; required fields are checked at [`build`](Self::build).
#[derive(Default)]
pub struct RequestExtractorBuilder {
    subject_extractor: Option<Arc<dyn SubjectExtractor>>,
    operations: PathTrie<OperationsByMethod>,
}

impl std::fmt::Debug for RequestExtractorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExtractorBuilder")
            .field("has_subject_extractor", &self.subject_extractor.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestExtractorBuilder {
    #[must_use]
    pub fn subject_extractor(mut self, extractor: Arc<dyn SubjectExtractor>) -> Self {
        self.subject_extractor = Some(extractor);
        self
    }

    /// Binds an operation extractor to a path pattern and method. The path
    /// may contain `*` wildcard segments; the method is normalized to
    /// uppercase.
    pub fn operation(
        mut self,
        path: &str,
        method: &str,
        extractor: Arc<dyn OperationExtractor>,
    ) -> Result<Self, BuildError> {
        if path.is_empty() {
            return Err(BuildError::EmptyPath);
        }
        if method.is_empty() {
            return Err(BuildError::EmptyMethod);
        }

        let segments = path_segments(path);
        let normalized = method.to_uppercase();

        if let Some(by_method) = self.operations.value_mut(&segments) {
            if by_method.contains_key(&normalized) {
                return Err(BuildError::DuplicateOperation { method: normalized, path: path.to_string() });
            }
            by_method.insert(normalized, extractor);
            return Ok(self);
        }

        let mut by_method = OperationsByMethod::new();
        by_method.insert(normalized, extractor);
        // The path was just checked for an existing value.
        self.operations
            .insert(&segments, by_method)
            .map_err(|_| BuildError::DuplicateOperation { method: method.to_uppercase(), path: path.to_string() })?;
        Ok(self)
    }

    pub fn build(self) -> Result<RequestExtractor, BuildError> {
        let subject_extractor = self.subject_extractor.ok_or(BuildError::MissingSubjectExtractor)?;
        Ok(RequestExtractor { subject_extractor, operations: self.operations })
    }
}

/// Splits a URL path into segments; the root path has none.
fn path_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}
