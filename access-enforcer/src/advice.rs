//! Reference advice handler: decision TTL cache hints.

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use serde_json::Value;

use access_core::Advice;

use crate::enforcer::{AdviceHandler, EnforcementContext};
use crate::errors::HandlerError;

/// Advice id this handler is registered under by convention.
pub const CACHE_HINT_ADVICE_ID: &str = "cache_hint";

/// Default response header carrying the decision TTL.
pub const DEFAULT_TTL_HEADER: &str = "X-ABAC-Decision-TTL";

/// Attribute naming the suggested TTL in seconds.
const TTL_SECONDS_ATTRIBUTE: &str = "ttl_seconds";

/// Sets a response header with the suggested decision TTL read from the
/// `ttl_seconds` attribute of a `cache_hint` advice.
pub struct CacheHintHandler {
    header_name: HeaderName,
}

impl Default for CacheHintHandler {
    fn default() -> Self {
        Self { header_name: HeaderName::from_static("x-abac-decision-ttl") }
    }
}

impl CacheHintHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the response header the TTL is written to.
    #[must_use]
    pub fn with_header_name(mut self, header_name: HeaderName) -> Self {
        self.header_name = header_name;
        self
    }
}

#[async_trait]
impl AdviceHandler for CacheHintHandler {
    async fn handle(&self, advice: &Advice, ctx: &mut EnforcementContext<'_>) -> Result<(), HandlerError> {
        let raw = advice
            .attributes
            .get(TTL_SECONDS_ATTRIBUTE)
            .ok_or_else(|| HandlerError::invalid("cache_hint advice missing 'ttl_seconds' attribute"))?;

        let ttl = to_seconds(raw)
            .ok_or_else(|| HandlerError::invalid(format!("cache_hint invalid 'ttl_seconds': {raw}")))?;
        if ttl <= 0 {
            return Err(HandlerError::invalid(format!("cache_hint 'ttl_seconds' must be > 0, got {ttl}")));
        }

        ctx.response_headers.insert(self.header_name.clone(), HeaderValue::from(ttl as u64));
        Ok(())
    }
}

/// Accepts integer, float, and numeric string TTLs.
fn to_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
