//! Policy enforcement point: axum middleware gating requests on access
//! decisions and enforcing the obligations and advices attached to them.
//!
//! Enforcement logging here is operational (observability and correlation);
//! it is intentionally distinct from any auditing performed via obligations.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use access_core::{AccessEvaluator, Advice, Obligation};

use crate::errors::HandlerError;
use crate::extract::RequestExtractor;

/// Standardized error response body written on denial and failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: error.into(), message: message.into() }
    }
}

/// Renders an error status and body into the HTTP response.
pub type ErrorFormatter = Arc<dyn Fn(StatusCode, &ErrorBody) -> Response + Send + Sync>;

/// What obligation and advice handlers get to work with: the request that
/// was gated and the response headers staged by the enforcer.
///
/// Handlers run before the downstream handler, and staged headers are
/// applied onto the final response afterwards, so a header set here is final
/// no matter what downstream writes.
pub struct EnforcementContext<'a> {
    pub request: &'a Parts,
    pub response_headers: &'a mut HeaderMap,
}

/// Handles one obligation attached to a decision. Obligations are mandatory:
/// on a permitted request a handler failure voids the permit.
#[async_trait]
pub trait ObligationHandler: Send + Sync {
    async fn handle(&self, obligation: &Obligation, ctx: &mut EnforcementContext<'_>) -> Result<(), HandlerError>;
}

/// Handles one advice attached to a decision. Advices are best-effort:
/// failures are logged and swallowed.
#[async_trait]
pub trait AdviceHandler: Send + Sync {
    async fn handle(&self, advice: &Advice, ctx: &mut EnforcementContext<'_>) -> Result<(), HandlerError>;
}

/// The policy enforcement point.
///
/// Wrap it around protected routes with
/// `axum::middleware::from_fn_with_state(enforcer, enforce)`.
pub struct Enforcer {
    access_evaluator: Arc<dyn AccessEvaluator>,
    request_extractor: RequestExtractor,
    obligation_handlers: HashMap<String, Arc<dyn ObligationHandler>>,
    advice_handlers: HashMap<String, Arc<dyn AdviceHandler>>,
    error_formatter: ErrorFormatter,
}

impl Enforcer {
    pub fn new(access_evaluator: Arc<dyn AccessEvaluator>, request_extractor: RequestExtractor) -> Self {
        Self {
            access_evaluator,
            request_extractor,
            obligation_handlers: HashMap::new(),
            advice_handlers: HashMap::new(),
            error_formatter: Arc::new(default_error_formatter),
        }
    }

    /// Registers an obligation handler for an obligation id.
    #[must_use]
    pub fn with_obligation_handler(mut self, id: impl Into<String>, handler: Arc<dyn ObligationHandler>) -> Self {
        self.obligation_handlers.insert(id.into(), handler);
        self
    }

    /// Registers an advice handler for an advice id.
    #[must_use]
    pub fn with_advice_handler(mut self, id: impl Into<String>, handler: Arc<dyn AdviceHandler>) -> Self {
        self.advice_handlers.insert(id.into(), handler);
        self
    }

    /// Overrides the error-response formatter.
    #[must_use]
    pub fn with_error_formatter(mut self, formatter: ErrorFormatter) -> Self {
        self.error_formatter = formatter;
        self
    }

    fn error_response(&self, status: StatusCode, error: &str, message: &str, staged: &HeaderMap) -> Response {
        let mut response = (self.error_formatter)(status, &ErrorBody::new(error, message));
        apply_headers(&mut response, staged);
        response
    }

    /// Runs every obligation in declaration order. A missing handler is a
    /// failure: the policy demanded an action this enforcement point cannot
    /// perform.
    async fn run_obligations(
        &self,
        obligations: &[Obligation],
        ctx: &mut EnforcementContext<'_>,
    ) -> Result<(), HandlerError> {
        for obligation in obligations {
            let handler = self.obligation_handlers.get(&obligation.id).ok_or_else(|| {
                HandlerError::invalid(format!("no handler registered for obligation ID: {}", obligation.id))
            })?;

            handler.handle(obligation, ctx).await.map_err(|err| {
                HandlerError::invalid(format!("obligation handler failed for ID {}: {err}", obligation.id))
            })?;
        }
        Ok(())
    }

    /// Runs advice handlers in declaration order. Advice is optional, so
    /// missing handlers are skipped.
    async fn run_advices(&self, advices: &[Advice], ctx: &mut EnforcementContext<'_>) -> Result<(), HandlerError> {
        for advice in advices {
            let Some(handler) = self.advice_handlers.get(&advice.id) else {
                continue;
            };

            handler.handle(advice, ctx).await.map_err(|err| {
                HandlerError::invalid(format!("advice handler failed for ID {}: {err}", advice.id))
            })?;
        }
        Ok(())
    }
}

/// Enforcement middleware. Extracts an access request, evaluates it, and
/// either forwards to the downstream handler or answers with a structured
/// denial.
pub async fn enforce(State(enforcer): State<Arc<Enforcer>>, request: Request, next: Next) -> Response {
    use access_core::Decision;

    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.to_string());

    let access_req = match enforcer.request_extractor.extract(&parts).await {
        Ok(req) => req,
        Err(err) => {
            tracing::error!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                error = %err,
                "request_extraction_failed"
            );
            return enforcer.error_response(
                StatusCode::BAD_REQUEST,
                "request_extraction_failed",
                "Invalid access request",
                &HeaderMap::new(),
            );
        }
    };

    let access_resp = match enforcer.access_evaluator.evaluate_access(&access_req).await {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                error = %err,
                duration_ms = started.elapsed().as_millis() as u64,
                "access_evaluation_failed"
            );
            return enforcer.error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "access_evaluation_failed",
                "An internal error occurred while evaluating access",
                &HeaderMap::new(),
            );
        }
    };

    let access_request_id = access_resp.request_id;
    let mut staged = HeaderMap::new();

    match access_resp.decision {
        Decision::Permit => {
            let mut ctx = EnforcementContext { request: &parts, response_headers: &mut staged };
            if let Err(err) = enforcer.run_obligations(&access_resp.obligations, &mut ctx).await {
                tracing::error!(
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    access_request_id = %access_request_id,
                    error = %err,
                    obligations_count = access_resp.obligations.len(),
                    advices_count = access_resp.advices.len(),
                    decision = %access_resp.decision,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "obligation_failed"
                );
                return enforcer.error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "obligation_failed",
                    "An internal error occurred while enforcing obligations",
                    &staged,
                );
            }

            if let Err(err) = enforcer.run_advices(&access_resp.advices, &mut ctx).await {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    access_request_id = %access_request_id,
                    error = %err,
                    advices_count = access_resp.advices.len(),
                    decision = %access_resp.decision,
                    "advice_failed"
                );
            }

            tracing::info!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                access_request_id = %access_request_id,
                obligations_count = access_resp.obligations.len(),
                advices_count = access_resp.advices.len(),
                decision = %access_resp.decision,
                duration_ms = started.elapsed().as_millis() as u64,
                "access_permitted"
            );

            let mut response = next.run(Request::from_parts(parts, body)).await;
            apply_headers(&mut response, &staged);
            response
        }

        Decision::Deny => {
            let mut ctx = EnforcementContext { request: &parts, response_headers: &mut staged };
            if let Err(err) = enforcer.run_obligations(&access_resp.obligations, &mut ctx).await {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    access_request_id = %access_request_id,
                    error = %err,
                    obligations_count = access_resp.obligations.len(),
                    decision = %access_resp.decision,
                    "obligation_failed_on_deny"
                );
            }
            if let Err(err) = enforcer.run_advices(&access_resp.advices, &mut ctx).await {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    access_request_id = %access_request_id,
                    error = %err,
                    advices_count = access_resp.advices.len(),
                    decision = %access_resp.decision,
                    "advice_failed_on_deny"
                );
            }

            tracing::info!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                access_request_id = %access_request_id,
                obligations_count = access_resp.obligations.len(),
                advices_count = access_resp.advices.len(),
                decision = %access_resp.decision,
                duration_ms = started.elapsed().as_millis() as u64,
                "access_denied"
            );

            enforcer.error_response(
                StatusCode::FORBIDDEN,
                "access_denied",
                "You do not have permission to access this resource",
                &staged,
            )
        }

        Decision::NotApplicable => {
            tracing::info!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                access_request_id = %access_request_id,
                obligations_count = access_resp.obligations.len(),
                advices_count = access_resp.advices.len(),
                decision = %access_resp.decision,
                duration_ms = started.elapsed().as_millis() as u64,
                "access_not_applicable"
            );

            enforcer.error_response(
                StatusCode::FORBIDDEN,
                "access_denied",
                "You do not have permission to access this resource",
                &staged,
            )
        }

        Decision::Indeterminate => {
            tracing::error!(
                method = %method,
                path = %path,
                remote_addr = %remote_addr,
                access_request_id = %access_request_id,
                decision = %access_resp.decision,
                status_code = %access_resp.status.code,
                status_message = %access_resp.status.message,
                duration_ms = started.elapsed().as_millis() as u64,
                "access_indeterminate"
            );

            enforcer.error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "indeterminate_decision",
                "An internal error occurred while processing the access decision",
                &staged,
            )
        }
    }
}

fn default_error_formatter(status: StatusCode, body: &ErrorBody) -> Response {
    (status, axum::Json(body.clone())).into_response()
}

fn apply_headers(response: &mut Response, staged: &HeaderMap) {
    for (name, value) in staged {
        response.headers_mut().insert(name.clone(), value.clone());
    }
}
