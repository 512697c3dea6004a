//! Data model shared across the decision pipeline.
//!
//! Every record here is created while serving a single request and dropped
//! when the response is written; the pipeline keeps no persistent state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Heterogeneous attribute bundle. Values cover the full JSON domain
/// (strings, numbers, booleans, null, sequences, nested mappings) and
/// round-trip through the evaluator unchanged.
pub type Attributes = HashMap<String, Value>;

/// Subject attribute key that carries the subject's role names.
///
/// Both the role policy resolver and the role info analyser key off the
/// presence of this attribute.
pub const ROLES_ATTRIBUTE: &str = "roles";

/// Outcome of an authorization decision.
///
/// The set is closed and case-sensitive; deserialization rejects any other
/// spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Request is allowed.
    Permit,
    /// Request is denied.
    Deny,
    /// Errors prevented making a decision.
    Indeterminate,
    /// No applicable policy was found.
    NotApplicable,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Permit => "Permit",
            Self::Deny => "Deny",
            Self::Indeterminate => "Indeterminate",
            Self::NotApplicable => "NotApplicable",
        };
        f.write_str(s)
    }
}

/// Detailed state of the decision process. Closed enumeration, same
/// deserialization rule as [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Decision was successfully evaluated.
    #[serde(rename = "OK")]
    Ok,
    /// A required attribute is missing.
    AttributeMissing,
    /// An internal processing error occurred.
    ProcessingError,
    /// The request is malformed.
    InvalidRequest,
    /// No matching policies were found.
    PolicyNotFound,
    /// General evaluation error.
    EvaluationError,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::AttributeMissing => "AttributeMissing",
            Self::ProcessingError => "ProcessingError",
            Self::InvalidRequest => "InvalidRequest",
            Self::PolicyNotFound => "PolicyNotFound",
            Self::EvaluationError => "EvaluationError",
        };
        f.write_str(s)
    }
}

/// Status detail attached to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// The entity requesting access (user, service, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(rename = "type")]
    pub subject_type: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Subject {
    /// A subject carrying no attributes yet.
    pub fn new(id: impl Into<String>, subject_type: impl Into<String>) -> Self {
        Self { id: id.into(), subject_type: subject_type.into(), attributes: Attributes::new() }
    }
}

/// The operation being performed on the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), attributes: Attributes::new() }
    }
}

/// The protected asset being accessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self { id: id.into(), resource_type: resource_type.into(), attributes: Attributes::new() }
    }
}

/// Access request as extracted by the enforcement point. Attribute bundles
/// are empty until the context handler enriches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: Subject,
    pub action: Action,
    pub resource: Resource,
}

/// An access request whose subject and resource attribute bundles have been
/// populated by the information point. Both bundles exist (possibly empty)
/// once enrichment succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedAccessRequest {
    pub subject: Subject,
    pub action: Action,
    pub resource: Resource,
}

/// A fully assembled decision request handed to the decision point.
///
/// The request id is generated when the request is constructed, is unique
/// per decision attempt, and is carried into the response unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub request_id: Uuid,
    pub subject: Subject,
    pub action: Action,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub environment: Attributes,
}

/// Reference to a policy by id and version. Identity is value-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyIdReference {
    pub id: String,
    pub version: String,
}

impl PolicyIdReference {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { id: id.into(), version: version.into() }
    }
}

/// A retrieved policy. Content is opaque to the decision point and is handed
/// to the evaluator unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub id: String,
    pub version: String,
    pub content: Vec<u8>,
}

/// A mandatory action that must be performed when enforcing the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// A recommended but not mandatory action related to the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub id: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// Output of the policy evaluation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decision: Decision,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Advice>,
}

/// Result of evaluating a decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub request_id: Uuid,
    pub decision: Decision,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Advice>,
    pub evaluated_at: DateTime<Utc>,
    pub policy_id_references: Vec<PolicyIdReference>,
}

/// The context handler's projection of a [`DecisionResponse`] for the
/// enforcement point. Structurally identical apart from the pluralized
/// advice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub request_id: Uuid,
    pub decision: Decision,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advices: Vec<Advice>,
    pub evaluated_at: DateTime<Utc>,
    pub policy_id_references: Vec<PolicyIdReference>,
}

impl From<DecisionResponse> for AccessResponse {
    fn from(resp: DecisionResponse) -> Self {
        Self {
            request_id: resp.request_id,
            decision: resp.decision,
            status: resp.status,
            obligations: resp.obligations,
            advices: resp.advice,
            evaluated_at: resp.evaluated_at,
            policy_id_references: resp.policy_id_references,
        }
    }
}

/// Accepted shapes for information request parameters.
///
/// Providers declare which variants they accept; keeping the shapes as an
/// explicit sum avoids downcasting at the provider boundary. The wire form
/// is untagged, so `"abc"`, `["a", "b"]` and arbitrary JSON all decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoParams {
    /// A single identifier, e.g. an entity id to look up.
    Id(String),
    /// A list of names, e.g. role names.
    Names(Vec<String>),
    /// A heterogeneous list; element types are validated by the provider.
    Values(Vec<Value>),
    /// Any other payload.
    Other(Value),
}

impl InfoParams {
    /// Human-readable shape name used in provider error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Id(_) => "string",
            Self::Names(_) => "string list",
            Self::Values(_) => "value list",
            Self::Other(_) => "value",
        }
    }
}

impl From<String> for InfoParams {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for InfoParams {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<Vec<String>> for InfoParams {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

/// Request for an attribute bundle from the information point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetInfoRequest {
    pub info_type: String,
    pub params: InfoParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

impl GetInfoRequest {
    pub fn new(info_type: impl Into<String>, params: impl Into<InfoParams>) -> Self {
        Self { info_type: info_type.into(), params: params.into(), context: None }
    }
}

/// Attribute bundle returned by the information point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetInfoResponse {
    pub info: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_rejects_unknown_spelling() {
        assert_eq!(serde_json::from_str::<Decision>("\"Permit\"").unwrap(), Decision::Permit);
        assert!(serde_json::from_str::<Decision>("\"permit\"").is_err());
        assert!(serde_json::from_str::<Decision>("\"Allow\"").is_err());
    }

    #[test]
    fn status_code_round_trip() {
        for (code, wire) in [
            (StatusCode::Ok, "\"OK\""),
            (StatusCode::AttributeMissing, "\"AttributeMissing\""),
            (StatusCode::ProcessingError, "\"ProcessingError\""),
            (StatusCode::InvalidRequest, "\"InvalidRequest\""),
            (StatusCode::PolicyNotFound, "\"PolicyNotFound\""),
            (StatusCode::EvaluationError, "\"EvaluationError\""),
        ] {
            assert_eq!(serde_json::to_string(&code).unwrap(), wire);
            assert_eq!(serde_json::from_str::<StatusCode>(wire).unwrap(), code);
        }
        assert!(serde_json::from_str::<StatusCode>("\"ok\"").is_err());
    }

    #[test]
    fn decision_request_uses_camel_case_wire_names() {
        let req = DecisionRequest {
            request_id: Uuid::new_v4(),
            subject: Subject::new("u1", "user"),
            action: Action::new("read"),
            resource: Resource::new("o1", "order"),
            environment: Attributes::new(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("requestId").is_some());
        assert_eq!(value["subject"]["type"], json!("user"));
        assert_eq!(value["resource"]["type"], json!("order"));
        // Empty bundles stay off the wire.
        assert!(value.get("environment").is_none());
        assert!(value["subject"].get("attributes").is_none());
    }

    #[test]
    fn access_response_pluralizes_advice() {
        let resp = DecisionResponse {
            request_id: Uuid::new_v4(),
            decision: Decision::Permit,
            status: Status::new(StatusCode::Ok, "evaluation completed"),
            obligations: vec![Obligation { id: "audit_logging".into(), attributes: Attributes::new() }],
            advice: vec![Advice { id: "cache_hint".into(), attributes: Attributes::new() }],
            evaluated_at: Utc::now(),
            policy_id_references: vec![PolicyIdReference::new("p", "v1")],
        };
        let access: AccessResponse = resp.clone().into();
        assert_eq!(access.request_id, resp.request_id);
        assert_eq!(access.advices, resp.advice);
        assert_eq!(access.policy_id_references, resp.policy_id_references);

        let value = serde_json::to_value(&access).unwrap();
        assert!(value.get("advices").is_some());
        assert!(value.get("evaluatedAt").is_some());
        assert!(value.get("policyIdReferences").is_some());
    }

    #[test]
    fn info_params_decode_untagged() {
        assert_eq!(serde_json::from_value::<InfoParams>(json!("u1")).unwrap(), InfoParams::Id("u1".into()));
        assert_eq!(
            serde_json::from_value::<InfoParams>(json!(["admin", "editor"])).unwrap(),
            InfoParams::Names(vec!["admin".into(), "editor".into()]),
        );
        assert_eq!(
            serde_json::from_value::<InfoParams>(json!(["admin", 1])).unwrap(),
            InfoParams::Values(vec![json!("admin"), json!(1)]),
        );
    }
}
