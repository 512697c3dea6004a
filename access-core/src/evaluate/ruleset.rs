//! Reference evaluator over declarative rule documents.
//!
//! Each policy's content is a JSON document of permission data, not a policy
//! language: a scope, an ordered rule table, and the obligations and advices
//! the policy attaches when it determines the outcome. Rule rows have the
//! same shape as the permission conditions served by the RBAC information
//! provider, so role permissions fetched into the environment can be matched
//! directly.
//!
//! Scopes combine as follows: when both a subject-scope and a resource-scope
//! verdict are present the final decision is Permit only if both are Permit;
//! otherwise the subject verdict wins when it is not Permit, else the
//! resource verdict stands. With a single scope present its verdict is the
//! decision; with none, NotApplicable.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EvaluateError;
use crate::evaluate::PolicyEvaluator;
use crate::info::rbac::{Permission, PermissionCondition, ROLE_PERMISSIONS_KEY};
use crate::model::{
    Advice, Decision, DecisionRequest, EvaluationResult, Obligation, Policy, Status, StatusCode,
};

/// Condition operator: attribute equals the (interpolated) value.
pub const OPERATOR_EQUALS: &str = "equals";
/// Condition operator: attribute differs from the (interpolated) value.
pub const OPERATOR_NOT_EQUALS: &str = "not_equals";

/// Which half of the combiner a policy document feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Subject,
    Resource,
}

/// Effect of a matched rule. Deliberately narrower than [`Decision`]:
/// documents cannot declare Indeterminate or NotApplicable outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleEffect {
    Permit,
    Deny,
}

/// One row of a document's rule table. The first matching row decides the
/// document's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub effect: RuleEffect,
    /// Action ids this rule applies to; empty matches any action.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Resource types this rule applies to; empty matches any type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
    /// Require a role permission from the environment bundle to grant the
    /// requested (action, resource type), conditions included.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_role_permissions: bool,
    /// Additional conditions on the resource attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PermissionCondition>,
}

/// A policy's content as understood by the reference evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    /// Attached when this document's verdict equals the final decision.
    /// String attribute values may reference request fields with `${...}`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advices: Vec<Advice>,
}

/// Reference [`PolicyEvaluator`] interpreting [`PolicyDocument`] content.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSetEvaluator;

impl RuleSetEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PolicyEvaluator for RuleSetEvaluator {
    async fn evaluate(
        &self,
        req: &DecisionRequest,
        policies: &[Policy],
    ) -> Result<EvaluationResult, EvaluateError> {
        if req.request_id.is_nil() {
            return Err(EvaluateError::InvalidRequest { reason: "request id cannot be nil".into() });
        }
        if policies.is_empty() {
            return Err(EvaluateError::NoPolicies);
        }

        let mut subject_verdict: Option<Decision> = None;
        let mut resource_verdict: Option<Decision> = None;
        let mut evaluated = Vec::with_capacity(policies.len());

        for policy in policies {
            let document: PolicyDocument =
                serde_json::from_slice(&policy.content).map_err(|err| EvaluateError::MalformedPolicy {
                    id: policy.id.clone(),
                    version: policy.version.clone(),
                    source: err,
                })?;
            let verdict = evaluate_document(&document, req)?;
            match document.scope {
                Scope::Subject => subject_verdict = Some(merge_scope(subject_verdict, verdict)),
                Scope::Resource => resource_verdict = Some(merge_scope(resource_verdict, verdict)),
            }
            evaluated.push((document, verdict));
        }

        let decision = combine(subject_verdict, resource_verdict);

        let mut obligations = Vec::new();
        let mut advice = Vec::new();
        for (document, verdict) in &evaluated {
            if *verdict != decision {
                continue;
            }
            obligations.extend(document.obligations.iter().map(|o| Obligation {
                id: o.id.clone(),
                attributes: o
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), interpolate_value(v, req)))
                    .collect(),
            }));
            advice.extend(document.advices.iter().map(|a| Advice {
                id: a.id.clone(),
                attributes: a
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), interpolate_value(v, req)))
                    .collect(),
            }));
        }

        let status = match decision {
            Decision::NotApplicable => Status::new(StatusCode::Ok, "no applicable policy rules"),
            _ => Status::new(StatusCode::Ok, "evaluation completed"),
        };

        Ok(EvaluationResult { decision, status, obligations, advice })
    }
}

fn evaluate_document(document: &PolicyDocument, req: &DecisionRequest) -> Result<Decision, EvaluateError> {
    for rule in &document.rules {
        if rule_matches(rule, req)? {
            return Ok(match rule.effect {
                RuleEffect::Permit => Decision::Permit,
                RuleEffect::Deny => Decision::Deny,
            });
        }
    }
    Ok(Decision::NotApplicable)
}

fn rule_matches(rule: &Rule, req: &DecisionRequest) -> Result<bool, EvaluateError> {
    if !rule.actions.is_empty() && !rule.actions.contains(&req.action.id) {
        return Ok(false);
    }
    if !rule.resource_types.is_empty() && !rule.resource_types.contains(&req.resource.resource_type) {
        return Ok(false);
    }
    if rule.use_role_permissions && !role_permission_grants(req)? {
        return Ok(false);
    }
    for condition in &rule.conditions {
        if !condition_holds(condition, req)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Checks whether any role permission in the environment bundle grants the
/// requested (action, resource type) with all of its conditions satisfied.
fn role_permission_grants(req: &DecisionRequest) -> Result<bool, EvaluateError> {
    let Some(bundle) = req.environment.get(ROLE_PERMISSIONS_KEY) else {
        return Ok(false);
    };
    let permissions: HashMap<String, Vec<Permission>> =
        serde_json::from_value(bundle.clone()).map_err(|err| EvaluateError::Evaluation {
            reason: format!("malformed {ROLE_PERMISSIONS_KEY} bundle: {err}"),
        })?;

    for role_permissions in permissions.values() {
        'permission: for permission in role_permissions {
            if permission.action != req.action.id || permission.resource != req.resource.resource_type {
                continue;
            }
            for condition in &permission.conditions {
                if !condition_holds(condition, req)? {
                    continue 'permission;
                }
            }
            return Ok(true);
        }
    }
    Ok(false)
}

fn condition_holds(condition: &PermissionCondition, req: &DecisionRequest) -> Result<bool, EvaluateError> {
    let expected = interpolate_value(&condition.attribute_value, req);
    let actual = req.resource.attributes.get(&condition.attribute_key);
    match condition.operator.as_str() {
        OPERATOR_EQUALS => Ok(actual == Some(&expected)),
        OPERATOR_NOT_EQUALS => Ok(actual != Some(&expected)),
        other => Err(EvaluateError::Evaluation {
            reason: format!("unsupported condition operator '{other}'"),
        }),
    }
}

fn merge_scope(current: Option<Decision>, verdict: Decision) -> Decision {
    // Deny overrides within a scope, then Permit, then NotApplicable.
    match (current, verdict) {
        (Some(Decision::Deny), _) | (_, Decision::Deny) => Decision::Deny,
        (Some(Decision::Permit), _) | (_, Decision::Permit) => Decision::Permit,
        _ => Decision::NotApplicable,
    }
}

fn combine(subject: Option<Decision>, resource: Option<Decision>) -> Decision {
    match (subject, resource) {
        (Some(Decision::Permit), Some(resource)) => resource,
        (Some(subject), Some(_)) => subject,
        (Some(subject), None) => subject,
        (None, Some(resource)) => resource,
        (None, None) => Decision::NotApplicable,
    }
}

/// Replaces `${...}` request-field references in string values. Sequences and
/// mappings are interpolated recursively; other value types pass through.
fn interpolate_value(value: &Value, req: &DecisionRequest) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, req)),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, req)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), interpolate_value(v, req))).collect())
        }
        other => other.clone(),
    }
}

fn interpolate_str(s: &str, req: &DecisionRequest) -> String {
    if !s.contains("${") {
        return s.to_string();
    }
    s.replace("${subject.id}", &req.subject.id)
        .replace("${subject.type}", &req.subject.subject_type)
        .replace("${action.id}", &req.action.id)
        .replace("${resource.id}", &req.resource.id)
        .replace("${resource.type}", &req.resource.resource_type)
        .replace("${request_id}", &req.request_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Attributes, Resource, Subject};
    use serde_json::json;
    use uuid::Uuid;

    fn policy(id: &str, document: Value) -> Policy {
        Policy { id: id.into(), version: "v1".into(), content: document.to_string().into_bytes() }
    }

    fn read_order_request(subject_id: &str, roles: Value, owner: &str) -> DecisionRequest {
        let mut subject_attributes = Attributes::new();
        subject_attributes.insert("roles".into(), roles);
        let mut resource_attributes = Attributes::new();
        resource_attributes.insert("owner".into(), json!(owner));
        DecisionRequest {
            request_id: Uuid::new_v4(),
            subject: Subject { id: subject_id.into(), subject_type: "user".into(), attributes: subject_attributes },
            action: Action::new("read"),
            resource: Resource { id: "o1".into(), resource_type: "order".into(), attributes: resource_attributes },
            environment: Attributes::new(),
        }
    }

    fn with_role_permissions(mut req: DecisionRequest, permissions: Value) -> DecisionRequest {
        req.environment.insert(ROLE_PERMISSIONS_KEY.into(), permissions);
        req
    }

    fn subject_rbac_policy() -> Policy {
        policy(
            "rbac-policy",
            json!({
                "scope": "subject",
                "rules": [{"effect": "Permit", "use_role_permissions": true}],
            }),
        )
    }

    fn resource_baseline_policy() -> Policy {
        policy(
            "default-policy",
            json!({
                "scope": "resource",
                "rules": [{"effect": "Permit"}],
                "obligations": [{
                    "id": "audit_logging",
                    "attributes": {
                        "level": "INFO",
                        "message": "permit: subject=${subject.type}/${subject.id} action=${action.id} resource=${resource.type}/${resource.id}",
                    },
                }],
                "advices": [{"id": "cache_hint", "attributes": {"ttl_seconds": 30}}],
            }),
        )
    }

    #[tokio::test]
    async fn unconditional_role_permission_permits() {
        let req = with_role_permissions(
            read_order_request("u1", json!(["admin"]), "u2"),
            json!({"admin": [{"action": "read", "resource": "order"}]}),
        );
        let policies = vec![resource_baseline_policy(), subject_rbac_policy()];

        let result = RuleSetEvaluator::new().evaluate(&req, &policies).await.unwrap();
        assert_eq!(result.decision, Decision::Permit);
        assert_eq!(result.status.code, StatusCode::Ok);

        let audit = &result.obligations[0];
        assert_eq!(audit.id, "audit_logging");
        assert_eq!(
            audit.attributes["message"],
            json!("permit: subject=user/u1 action=read resource=order/o1"),
        );
        assert_eq!(result.advice[0].attributes["ttl_seconds"], json!(30));
    }

    #[tokio::test]
    async fn ownership_condition_blocks_non_owner() {
        let permissions = json!({
            "customer": [{
                "action": "read",
                "resource": "order",
                "conditions": [{
                    "attribute_key": "owner",
                    "operator": "equals",
                    "attribute_value": "${subject.id}",
                }],
            }],
        });

        // Owner mismatch: no applicable permission, subject scope yields
        // NotApplicable and the combiner returns it.
        let req = with_role_permissions(read_order_request("u1", json!(["customer"]), "u2"), permissions.clone());
        let policies = vec![resource_baseline_policy(), subject_rbac_policy()];
        let result = RuleSetEvaluator::new().evaluate(&req, &policies).await.unwrap();
        assert_eq!(result.decision, Decision::NotApplicable);
        assert!(result.obligations.is_empty());

        // Owner match permits.
        let req = with_role_permissions(read_order_request("u1", json!(["customer"]), "u1"), permissions);
        let policies = vec![resource_baseline_policy(), subject_rbac_policy()];
        let result = RuleSetEvaluator::new().evaluate(&req, &policies).await.unwrap();
        assert_eq!(result.decision, Decision::Permit);
    }

    #[tokio::test]
    async fn deny_rule_overrides_permit_across_scopes() {
        let req = with_role_permissions(
            read_order_request("u1", json!(["admin"]), "u2"),
            json!({"admin": [{"action": "read", "resource": "order"}]}),
        );
        let embargo = policy(
            "embargo-policy",
            json!({
                "scope": "resource",
                "rules": [{"effect": "Deny", "resource_types": ["order"]}],
            }),
        );
        let policies = vec![embargo, subject_rbac_policy()];

        let result = RuleSetEvaluator::new().evaluate(&req, &policies).await.unwrap();
        assert_eq!(result.decision, Decision::Deny);
    }

    #[tokio::test]
    async fn missing_permission_bundle_means_no_grant() {
        let req = read_order_request("u1", json!(["admin"]), "u2");
        let policies = vec![subject_rbac_policy()];

        let result = RuleSetEvaluator::new().evaluate(&req, &policies).await.unwrap();
        assert_eq!(result.decision, Decision::NotApplicable);
    }

    #[tokio::test]
    async fn empty_policy_list_is_invalid() {
        let req = read_order_request("u1", json!(["admin"]), "u2");
        let err = RuleSetEvaluator::new().evaluate(&req, &[]).await.unwrap_err();
        assert!(matches!(err, EvaluateError::NoPolicies));
    }

    #[tokio::test]
    async fn nil_request_id_is_invalid() {
        let mut req = read_order_request("u1", json!(["admin"]), "u2");
        req.request_id = Uuid::nil();
        let err = RuleSetEvaluator::new().evaluate(&req, &[subject_rbac_policy()]).await.unwrap_err();
        assert!(matches!(err, EvaluateError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let req = read_order_request("u1", json!(["admin"]), "u2");
        let broken = Policy { id: "p".into(), version: "v1".into(), content: b"not json".to_vec() };
        let err = RuleSetEvaluator::new().evaluate(&req, &[broken]).await.unwrap_err();
        assert!(matches!(err, EvaluateError::MalformedPolicy { ref id, .. } if id == "p"));
    }

    #[tokio::test]
    async fn unsupported_operator_is_an_error() {
        let req = with_role_permissions(
            read_order_request("u1", json!(["admin"]), "u2"),
            json!({"admin": [{
                "action": "read",
                "resource": "order",
                "conditions": [{"attribute_key": "owner", "operator": "matches", "attribute_value": "u2"}],
            }]}),
        );
        let err = RuleSetEvaluator::new().evaluate(&req, &[subject_rbac_policy()]).await.unwrap_err();
        assert!(matches!(err, EvaluateError::Evaluation { ref reason } if reason.contains("matches")));
    }

    #[tokio::test]
    async fn not_equals_condition() {
        let permissions = json!({
            "reviewer": [{
                "action": "read",
                "resource": "order",
                "conditions": [{
                    "attribute_key": "owner",
                    "operator": "not_equals",
                    "attribute_value": "${subject.id}",
                }],
            }],
        });
        let req = with_role_permissions(read_order_request("u1", json!(["reviewer"]), "u2"), permissions);
        let result = RuleSetEvaluator::new().evaluate(&req, &[subject_rbac_policy()]).await.unwrap();
        assert_eq!(result.decision, Decision::Permit);
    }

    #[test]
    fn combiner_table() {
        use Decision::{Deny, NotApplicable, Permit};

        assert_eq!(combine(Some(Permit), Some(Permit)), Permit);
        assert_eq!(combine(Some(Permit), Some(Deny)), Deny);
        assert_eq!(combine(Some(Permit), Some(NotApplicable)), NotApplicable);
        assert_eq!(combine(Some(Deny), Some(Permit)), Deny);
        assert_eq!(combine(Some(NotApplicable), Some(Permit)), NotApplicable);
        assert_eq!(combine(Some(Permit), None), Permit);
        assert_eq!(combine(Some(Deny), None), Deny);
        assert_eq!(combine(None, Some(Permit)), Permit);
        assert_eq!(combine(None, None), NotApplicable);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_verdict() -> impl Strategy<Value = Option<Decision>> {
            prop_oneof![
                Just(None),
                Just(Some(Decision::Permit)),
                Just(Some(Decision::Deny)),
                Just(Some(Decision::NotApplicable)),
            ]
        }

        proptest! {
            // Permit requires every present scope to permit; a lone scope's
            // verdict always stands.
            #[test]
            fn permit_requires_unanimous_present_scopes(
                subject in arb_verdict(),
                resource in arb_verdict(),
            ) {
                let decision = combine(subject, resource);
                let both_permit = match (subject, resource) {
                    (Some(s), Some(r)) => s == Decision::Permit && r == Decision::Permit,
                    (Some(s), None) => s == Decision::Permit,
                    (None, Some(r)) => r == Decision::Permit,
                    (None, None) => false,
                };
                prop_assert_eq!(decision == Decision::Permit, both_permit);
            }

            #[test]
            fn absent_scopes_yield_not_applicable(resource in arb_verdict()) {
                prop_assert_eq!(combine(None, None), Decision::NotApplicable);
                prop_assert_eq!(combine(None, resource), resource.unwrap_or(Decision::NotApplicable));
            }
        }
    }
}
