//! Role-based access information: role hierarchy expansion and the
//! permissions attached to the expanded role set.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BoxError, InfoError};
use crate::info::InfoProvider;
use crate::model::{Attributes, GetInfoRequest, GetInfoResponse, InfoParams};

/// Attribute key under which the provider publishes the hierarchy bundle.
pub const ROLE_HIERARCHY_KEY: &str = "role_hierarchy";
/// Attribute key under which the provider publishes the permission map.
pub const ROLE_PERMISSIONS_KEY: &str = "role_permissions";

/// A role permission with optional conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PermissionCondition>,
}

/// A conditional constraint on a permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionCondition {
    pub attribute_key: String,
    pub operator: String,
    pub attribute_value: Value,
}

/// Requested roles and the transitive descendant set they expand to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleHierarchy {
    pub requested_roles: Vec<String>,
    pub descendants: Vec<String>,
}

/// Read-only contract this provider needs from the role store.
#[async_trait]
pub trait RoleHierarchyStore: Send + Sync {
    /// All descendant roles of the given roots, the roots included.
    async fn role_descendants(&self, roots: &[String]) -> Result<Vec<String>, BoxError>;

    /// Permissions grouped by role name for the given roles.
    async fn permissions_by_roles(&self, roles: &[String]) -> Result<HashMap<String, Vec<Permission>>, BoxError>;
}

/// Information provider resolving role hierarchies and permissions.
pub struct RbacInfoProvider {
    store: Arc<dyn RoleHierarchyStore>,
}

impl RbacInfoProvider {
    pub fn new(store: Arc<dyn RoleHierarchyStore>) -> Self {
        Self { store }
    }

    async fn resolve(&self, role_names: Vec<String>) -> Result<GetInfoResponse, InfoError> {
        let normalized: Vec<String> = role_names
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if normalized.is_empty() {
            return Err(InfoError::invalid_params("at least one role name must be provided"));
        }

        let descendants = self
            .store
            .role_descendants(&normalized)
            .await
            .map_err(|err| InfoError::lookup(format!("failed to get role descendants for roles {normalized:?}"), err))?;
        if descendants.is_empty() {
            return Err(InfoError::invalid_params(format!(
                "none of the requested roles were found: {normalized:?}",
            )));
        }

        let permissions = self
            .store
            .permissions_by_roles(&descendants)
            .await
            .map_err(|err| InfoError::lookup(format!("failed to get permissions for roles {descendants:?}"), err))?;

        let mut info = Attributes::new();
        info.insert(
            ROLE_HIERARCHY_KEY.to_string(),
            serde_json::json!(RoleHierarchy { requested_roles: normalized, descendants }),
        );
        info.insert(ROLE_PERMISSIONS_KEY.to_string(), serde_json::json!(permissions));

        Ok(GetInfoResponse { info })
    }
}

#[async_trait]
impl InfoProvider for RbacInfoProvider {
    async fn get_info(&self, req: &GetInfoRequest) -> Result<GetInfoResponse, InfoError> {
        // Role lists arrive either as a typed string sequence or, when they
        // come through a JSON decode path, as a heterogeneous sequence whose
        // elements must all be strings.
        match &req.params {
            InfoParams::Names(names) => self.resolve(names.clone()).await,
            InfoParams::Values(values) => {
                let mut names = Vec::with_capacity(values.len());
                for value in values {
                    match value.as_str() {
                        Some(s) => names.push(s.to_string()),
                        None => return Err(InfoError::invalid_params("role names must be a list of strings")),
                    }
                }
                self.resolve(names).await
            }
            other => Err(InfoError::invalid_params(format!(
                "role names parameter must be a list of strings, got {}",
                other.kind(),
            ))),
        }
    }
}
