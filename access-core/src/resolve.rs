//! Policy resolvers: pure predicates proposing policy references for a
//! decision request.

use async_trait::async_trait;

use crate::errors::BoxError;
use crate::model::{DecisionRequest, PolicyIdReference, ROLES_ATTRIBUTE};

/// Inspects a decision request and proposes zero or more applicable policy
/// references. The decision point unions the outputs of every registered
/// resolver.
#[async_trait]
pub trait PolicyResolver: Send + Sync {
    async fn resolve(&self, req: &DecisionRequest) -> Result<Vec<PolicyIdReference>, BoxError>;
}

/// Always proposes its one configured reference.
pub struct StaticResolver {
    reference: PolicyIdReference,
}

impl StaticResolver {
    pub fn new(reference: PolicyIdReference) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl PolicyResolver for StaticResolver {
    async fn resolve(&self, _req: &DecisionRequest) -> Result<Vec<PolicyIdReference>, BoxError> {
        Ok(vec![self.reference.clone()])
    }
}

/// Proposes its reference only when the subject attributes carry a `roles`
/// key. This is a presence check: an empty or null value still triggers.
pub struct RoleResolver {
    reference: PolicyIdReference,
}

impl RoleResolver {
    pub fn new(reference: PolicyIdReference) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl PolicyResolver for RoleResolver {
    async fn resolve(&self, req: &DecisionRequest) -> Result<Vec<PolicyIdReference>, BoxError> {
        if !req.subject.attributes.contains_key(ROLES_ATTRIBUTE) {
            return Ok(Vec::new());
        }

        Ok(vec![self.reference.clone()])
    }
}
