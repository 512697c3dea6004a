//! Policy retrieval: resolving policy references into policy content.

pub mod file_store;

use async_trait::async_trait;

use crate::errors::RetrieveError;
use crate::model::{Policy, PolicyIdReference};

/// Returns policy content for a set of references.
///
/// The order of the returned policies is unspecified; callers rely only on
/// (id, version) identity. Implementations must return promptly when the
/// calling task is cancelled.
#[async_trait]
pub trait PolicyRetriever: Send + Sync {
    async fn get_policies(&self, refs: &[PolicyIdReference]) -> Result<Vec<Policy>, RetrieveError>;
}
