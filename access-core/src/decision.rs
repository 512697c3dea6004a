//! Policy decision point: resolve applicable policies, retrieve their
//! content, evaluate, and answer with a decision response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;

use crate::errors::{DecisionError, ResolveError};
use crate::evaluate::PolicyEvaluator;
use crate::model::{Decision, DecisionRequest, DecisionResponse, PolicyIdReference, Status, StatusCode};
use crate::resolve::PolicyResolver;
use crate::retrieve::PolicyRetriever;

/// Makes authorization decisions for fully assembled decision requests.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Evaluates a decision request.
    ///
    /// # Errors
    ///
    /// Only input validation fails with an error; every internal failure is
    /// converted into a `DecisionResponse` so callers can apply a uniform
    /// policy to Indeterminate outcomes.
    async fn decide(&self, req: &DecisionRequest) -> Result<DecisionResponse, DecisionError>;
}

/// The built-in decision point.
///
/// Resolvers run in parallel and their outputs are unioned into a set with
/// at most one reference per policy id; duplicate references and version
/// conflicts fail the resolution phase.
pub struct DecisionPoint {
    resolvers: Vec<Arc<dyn PolicyResolver>>,
    retriever: Arc<dyn PolicyRetriever>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl DecisionPoint {
    pub fn new(retriever: Arc<dyn PolicyRetriever>, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        Self { resolvers: Vec::new(), retriever, evaluator }
    }

    /// Registers a policy resolver. Resolvers are independent; registration
    /// order carries no meaning.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PolicyResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    async fn resolve(&self, req: &DecisionRequest) -> Result<Vec<PolicyIdReference>, ResolveError> {
        if self.resolvers.is_empty() {
            return Err(ResolveError::NoResolvers);
        }

        let seen: Mutex<HashMap<String, PolicyIdReference>> = Mutex::new(HashMap::new());

        try_join_all(self.resolvers.iter().map(|resolver| {
            let seen = &seen;
            async move {
                let references = resolver.resolve(req).await.map_err(ResolveError::Resolver)?;
                if references.is_empty() {
                    return Ok(());
                }

                let mut seen = seen.lock().unwrap();
                for reference in references {
                    match seen.get(&reference.id) {
                        None => {
                            seen.insert(reference.id.clone(), reference);
                        }
                        Some(existing) if existing.version == reference.version => {
                            return Err(ResolveError::DuplicateReference {
                                id: reference.id,
                                version: reference.version,
                            });
                        }
                        Some(existing) => {
                            return Err(ResolveError::VersionConflict {
                                id: reference.id.clone(),
                                existing: existing.version.clone(),
                                conflicting: reference.version,
                            });
                        }
                    }
                }
                Ok(())
            }
        }))
        .await?;

        let seen = seen.into_inner().unwrap();
        Ok(seen.into_values().collect())
    }
}

fn indeterminate(
    req: &DecisionRequest,
    code: StatusCode,
    message: String,
    policy_id_references: Vec<PolicyIdReference>,
) -> DecisionResponse {
    DecisionResponse {
        request_id: req.request_id,
        decision: Decision::Indeterminate,
        status: Status::new(code, message),
        obligations: Vec::new(),
        advice: Vec::new(),
        evaluated_at: Utc::now(),
        policy_id_references,
    }
}

#[async_trait]
impl DecisionMaker for DecisionPoint {
    async fn decide(&self, req: &DecisionRequest) -> Result<DecisionResponse, DecisionError> {
        if req.request_id.is_nil() {
            return Err(DecisionError::NilRequestId);
        }

        let references = match self.resolve(req).await {
            Ok(references) => references,
            Err(err) => {
                tracing::debug!(request_id = %req.request_id, error = %err, "policy resolution failed");
                return Ok(indeterminate(
                    req,
                    StatusCode::ProcessingError,
                    format!("Failed to resolve policies: {err}"),
                    Vec::new(),
                ));
            }
        };

        if references.is_empty() {
            return Ok(DecisionResponse {
                request_id: req.request_id,
                decision: Decision::NotApplicable,
                status: Status::new(StatusCode::PolicyNotFound, "No applicable policies found for the request"),
                obligations: Vec::new(),
                advice: Vec::new(),
                evaluated_at: Utc::now(),
                policy_id_references: Vec::new(),
            });
        }

        let policies = match self.retriever.get_policies(&references).await {
            Ok(policies) => policies,
            Err(err) => {
                tracing::debug!(request_id = %req.request_id, error = %err, "policy retrieval failed");
                return Ok(indeterminate(
                    req,
                    StatusCode::ProcessingError,
                    format!("Failed to retrieve policies: {err}"),
                    references,
                ));
            }
        };

        let result = match self.evaluator.evaluate(req, &policies).await {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(request_id = %req.request_id, error = %err, "policy evaluation failed");
                return Ok(indeterminate(
                    req,
                    StatusCode::EvaluationError,
                    format!("Policy evaluation failed: {err}"),
                    references,
                ));
            }
        };

        Ok(DecisionResponse {
            request_id: req.request_id,
            decision: result.decision,
            status: result.status,
            obligations: result.obligations,
            advice: result.advice,
            evaluated_at: Utc::now(),
            policy_id_references: references,
        })
    }
}
