//! Reference obligation handler: structured audit logging demanded by the
//! decision.

use async_trait::async_trait;
use serde::Deserialize;

use access_core::Obligation;

use crate::enforcer::{EnforcementContext, ObligationHandler};
use crate::errors::HandlerError;

/// Obligation id this handler is registered under by convention.
pub const AUDIT_LOG_OBLIGATION_ID: &str = "audit_logging";

/// Fixed attribute shape of audit log obligations.
#[derive(Debug, Deserialize)]
struct AuditLogAttributes {
    /// Log level (DEBUG, INFO, WARN, ERROR).
    #[serde(default)]
    level: String,
    /// Message to be logged.
    #[serde(default)]
    message: String,
}

/// Emits a structured log record at the level the obligation demands.
/// Unknown levels default to INFO; a missing level or message is a handler
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogHandler;

impl AuditLogHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ObligationHandler for AuditLogHandler {
    async fn handle(&self, obligation: &Obligation, _ctx: &mut EnforcementContext<'_>) -> Result<(), HandlerError> {
        let value = serde_json::to_value(&obligation.attributes)
            .map_err(|err| HandlerError::invalid(format!("invalid audit log attributes: {err}")))?;
        let attrs: AuditLogAttributes = serde_json::from_value(value)
            .map_err(|err| HandlerError::invalid(format!("invalid audit log attributes: {err}")))?;

        if attrs.level.is_empty() {
            return Err(HandlerError::invalid("invalid audit log attributes: level is required"));
        }
        if attrs.message.is_empty() {
            return Err(HandlerError::invalid("invalid audit log attributes: message is required"));
        }

        match attrs.level.to_uppercase().as_str() {
            "DEBUG" => tracing::debug!(obligation_id = %obligation.id, "{}", attrs.message),
            "WARN" => tracing::warn!(obligation_id = %obligation.id, "{}", attrs.message),
            "ERROR" => tracing::error!(obligation_id = %obligation.id, "{}", attrs.message),
            _ => tracing::info!(obligation_id = %obligation.id, "{}", attrs.message),
        }

        Ok(())
    }
}
