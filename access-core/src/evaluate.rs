//! Policy evaluation contract.
//!
//! The decision point treats policy content opaquely and hands it here; the
//! engine behind this trait is pluggable. [`ruleset::RuleSetEvaluator`] is
//! the built-in reference binding.

pub mod ruleset;

use async_trait::async_trait;

use crate::errors::EvaluateError;
use crate::model::{DecisionRequest, EvaluationResult, Policy};

/// Evaluates a decision request against a set of policies.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        req: &DecisionRequest,
        policies: &[Policy],
    ) -> Result<EvaluationResult, EvaluateError>;
}
