//! Information point: typed attribute lookup for subjects, resources and
//! whatever else the info analysers ask for.

pub mod entity;
pub mod rbac;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::InfoError;
use crate::model::{GetInfoRequest, GetInfoResponse};

/// Supplies attribute bundles for an info type.
///
/// Implementations must be safe for concurrent use; the context handler
/// issues overlapping calls against a shared provider.
#[async_trait]
pub trait InfoProvider: Send + Sync {
    async fn get_info(&self, req: &GetInfoRequest) -> Result<GetInfoResponse, InfoError>;
}

/// Routes information requests to a sub-provider registered for the request's
/// info type.
///
/// The registry is fixed at construction time; a request for an unregistered
/// type fails with [`InfoError::UnsupportedInfoType`].
#[derive(Default)]
pub struct RoutingInfoProvider {
    providers: HashMap<String, Arc<dyn InfoProvider>>,
}

impl RoutingInfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sub-provider for an info type, replacing any previous
    /// registration for the same type.
    #[must_use]
    pub fn with_provider(mut self, info_type: impl Into<String>, provider: Arc<dyn InfoProvider>) -> Self {
        self.providers.insert(info_type.into(), provider);
        self
    }
}

#[async_trait]
impl InfoProvider for RoutingInfoProvider {
    async fn get_info(&self, req: &GetInfoRequest) -> Result<GetInfoResponse, InfoError> {
        let provider = self
            .providers
            .get(&req.info_type)
            .ok_or_else(|| InfoError::UnsupportedInfoType { info_type: req.info_type.clone() })?;

        provider.get_info(req).await
    }
}
