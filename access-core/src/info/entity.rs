//! Generic attribute provider for UUID-keyed entities.
//!
//! Domain stores (users, orders, documents, ...) plug in through
//! [`EntityAttributesStore`]; the provider owns parameter validation so every
//! entity type reports shape mismatches the same way.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{BoxError, InfoError};
use crate::info::InfoProvider;
use crate::model::{Attributes, GetInfoRequest, GetInfoResponse, InfoParams};

/// Read-only attribute lookup contract a domain store implements.
#[async_trait]
pub trait EntityAttributesStore: Send + Sync {
    async fn attributes_by_id(&self, id: Uuid) -> Result<Attributes, BoxError>;
}

/// Information provider for one entity type backed by an attribute store.
pub struct EntityInfoProvider {
    entity: String,
    store: Arc<dyn EntityAttributesStore>,
}

impl EntityInfoProvider {
    /// `entity` names the entity type in error messages ("user", "order", ...).
    pub fn new(entity: impl Into<String>, store: Arc<dyn EntityAttributesStore>) -> Self {
        Self { entity: entity.into(), store }
    }
}

#[async_trait]
impl InfoProvider for EntityInfoProvider {
    async fn get_info(&self, req: &GetInfoRequest) -> Result<GetInfoResponse, InfoError> {
        let raw_id = match &req.params {
            InfoParams::Id(id) => id,
            other => {
                return Err(InfoError::invalid_params(format!(
                    "{} ID parameter must be a string, got {}",
                    self.entity,
                    other.kind(),
                )));
            }
        };

        // List-style operations carry no id; there is nothing to look up.
        if raw_id.is_empty() {
            return Ok(GetInfoResponse::default());
        }

        let id = Uuid::parse_str(raw_id).map_err(|_| {
            InfoError::invalid_params(format!(
                "{} ID must be a valid UUID format, got: {raw_id}",
                self.entity,
            ))
        })?;

        let attributes = self
            .store
            .attributes_by_id(id)
            .await
            .map_err(|err| InfoError::lookup(format!("failed to get {} attributes for {id}", self.entity), err))?;

        Ok(GetInfoResponse { info: attributes })
    }
}
