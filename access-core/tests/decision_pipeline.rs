//! End-to-end decision pipeline tests: context handler, decision point,
//! file-backed retriever and the reference rule-set evaluator wired together
//! the way an embedding application would assemble them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use access_core::errors::{BoxError, InfoError};
use access_core::info::rbac::{Permission, PermissionCondition, RbacInfoProvider, RoleHierarchyStore};
use access_core::{
    AccessEvaluator, AccessRequest, Action, Attributes, ContextHandler, Decision, DecisionPoint,
    FileStore, GetInfoRequest, GetInfoResponse, InfoProvider, PolicyIdReference, Resource,
    RoleAnalyser, RoleResolver, RoutingInfoProvider, RuleSetEvaluator, StaticResolver, StatusCode,
    Subject,
};

struct StaticBundleProvider(Attributes);

#[async_trait]
impl InfoProvider for StaticBundleProvider {
    async fn get_info(&self, _req: &GetInfoRequest) -> Result<GetInfoResponse, InfoError> {
        Ok(GetInfoResponse { info: self.0.clone() })
    }
}

struct InMemoryRoleStore {
    permissions: HashMap<String, Vec<Permission>>,
}

#[async_trait]
impl RoleHierarchyStore for InMemoryRoleStore {
    async fn role_descendants(&self, roots: &[String]) -> Result<Vec<String>, BoxError> {
        // Flat hierarchy: every known root is its own descendant set.
        Ok(roots.iter().filter(|r| self.permissions.contains_key(*r)).cloned().collect())
    }

    async fn permissions_by_roles(&self, roles: &[String]) -> Result<HashMap<String, Vec<Permission>>, BoxError> {
        Ok(roles
            .iter()
            .filter_map(|role| self.permissions.get(role).map(|p| (role.clone(), p.clone())))
            .collect())
    }
}

fn write_policies(dir: &tempfile::TempDir) {
    let v1 = dir.path().join("v1");
    std::fs::create_dir_all(&v1).unwrap();
    std::fs::write(
        v1.join("default-policy"),
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
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        v1.join("rbac-policy"),
        json!({
            "scope": "subject",
            "rules": [{"effect": "Permit", "use_role_permissions": true}],
        })
        .to_string(),
    )
    .unwrap();
}

fn handler_for(
    dir: &tempfile::TempDir,
    roles: serde_json::Value,
    owner: &str,
    role_permissions: HashMap<String, Vec<Permission>>,
) -> ContextHandler {
    let mut subject_attrs = Attributes::new();
    subject_attrs.insert("roles".into(), roles);
    let mut resource_attrs = Attributes::new();
    resource_attrs.insert("owner".into(), json!(owner));

    let info_provider = Arc::new(
        RoutingInfoProvider::new()
            .with_provider("user", Arc::new(StaticBundleProvider(subject_attrs)))
            .with_provider("order", Arc::new(StaticBundleProvider(resource_attrs)))
            .with_provider(
                "rbac",
                Arc::new(RbacInfoProvider::new(Arc::new(InMemoryRoleStore { permissions: role_permissions }))),
            ),
    );

    let decision_point = Arc::new(
        DecisionPoint::new(Arc::new(FileStore::new(dir.path())), Arc::new(RuleSetEvaluator::new()))
            .with_resolver(Arc::new(StaticResolver::new(PolicyIdReference::new("default-policy", "v1"))))
            .with_resolver(Arc::new(RoleResolver::new(PolicyIdReference::new("rbac-policy", "v1")))),
    );

    ContextHandler::new(info_provider, decision_point).with_analyser(Arc::new(RoleAnalyser::new("rbac")))
}

fn read_order_request() -> AccessRequest {
    AccessRequest {
        subject: Subject::new("u1", "user"),
        action: Action::new("read"),
        resource: Resource::new("o1", "order"),
    }
}

#[tokio::test]
async fn admin_read_is_permitted_with_audit_and_cache_hint() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(&dir);

    let mut permissions = HashMap::new();
    permissions.insert(
        "admin".to_string(),
        vec![Permission { action: "read".into(), resource: "order".into(), conditions: vec![] }],
    );
    let handler = handler_for(&dir, json!(["admin"]), "u2", permissions);

    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();

    assert_eq!(resp.decision, Decision::Permit);
    assert_eq!(resp.status.code, StatusCode::Ok);

    let audit = resp.obligations.iter().find(|o| o.id == "audit_logging").unwrap();
    assert_eq!(
        audit.attributes["message"],
        json!("permit: subject=user/u1 action=read resource=order/o1"),
    );
    let hint = resp.advices.iter().find(|a| a.id == "cache_hint").unwrap();
    assert_eq!(hint.attributes["ttl_seconds"], json!(30));

    let mut refs: Vec<(String, String)> =
        resp.policy_id_references.into_iter().map(|r| (r.id, r.version)).collect();
    refs.sort();
    assert_eq!(
        refs,
        vec![
            ("default-policy".to_string(), "v1".to_string()),
            ("rbac-policy".to_string(), "v1".to_string()),
        ],
    );
}

#[tokio::test]
async fn ownership_condition_denies_foreign_order() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(&dir);

    let mut permissions = HashMap::new();
    permissions.insert(
        "customer".to_string(),
        vec![Permission {
            action: "read".into(),
            resource: "order".into(),
            conditions: vec![PermissionCondition {
                attribute_key: "owner".into(),
                operator: "equals".into(),
                attribute_value: json!("${subject.id}"),
            }],
        }],
    );

    // Resource owned by someone else: no applicable permission.
    let handler = handler_for(&dir, json!(["customer"]), "u2", permissions.clone());
    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();
    assert_eq!(resp.decision, Decision::NotApplicable);

    // Owned by the requester: permitted.
    let handler = handler_for(&dir, json!(["customer"]), "u1", permissions);
    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();
    assert_eq!(resp.decision, Decision::Permit);
}

#[tokio::test]
async fn subject_without_roles_hits_only_the_default_policy() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(&dir);

    // No `roles` attribute: the role resolver and analyser stay silent, so
    // only the resource-scope default policy applies and it permits.
    let mut subject_attrs = Attributes::new();
    subject_attrs.insert("department".into(), json!("sales"));
    let info_provider = Arc::new(
        RoutingInfoProvider::new()
            .with_provider("user", Arc::new(StaticBundleProvider(subject_attrs)))
            .with_provider("order", Arc::new(StaticBundleProvider(Attributes::new()))),
    );
    let decision_point = Arc::new(
        DecisionPoint::new(Arc::new(FileStore::new(dir.path())), Arc::new(RuleSetEvaluator::new()))
            .with_resolver(Arc::new(StaticResolver::new(PolicyIdReference::new("default-policy", "v1"))))
            .with_resolver(Arc::new(RoleResolver::new(PolicyIdReference::new("rbac-policy", "v1")))),
    );
    let handler = ContextHandler::new(info_provider, decision_point).with_analyser(Arc::new(RoleAnalyser::new("rbac")));

    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();
    assert_eq!(resp.decision, Decision::Permit);
    assert_eq!(resp.policy_id_references, vec![PolicyIdReference::new("default-policy", "v1")]);
}

#[tokio::test]
async fn conflicting_resolver_versions_are_indeterminate() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(&dir);

    let info_provider = Arc::new(
        RoutingInfoProvider::new()
            .with_provider("user", Arc::new(StaticBundleProvider(Attributes::new())))
            .with_provider("order", Arc::new(StaticBundleProvider(Attributes::new()))),
    );
    let decision_point = Arc::new(
        DecisionPoint::new(Arc::new(FileStore::new(dir.path())), Arc::new(RuleSetEvaluator::new()))
            .with_resolver(Arc::new(StaticResolver::new(PolicyIdReference::new("p", "v1"))))
            .with_resolver(Arc::new(StaticResolver::new(PolicyIdReference::new("p", "v2")))),
    );
    let handler = ContextHandler::new(info_provider, decision_point);

    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();
    assert_eq!(resp.decision, Decision::Indeterminate);
    assert_eq!(resp.status.code, StatusCode::ProcessingError);
    assert!(resp.status.message.contains("duplicate policy ID 'p'"));
}

#[tokio::test]
async fn missing_policy_file_is_indeterminate_with_references() {
    let dir = tempfile::tempdir().unwrap();
    // No policies written at all.

    let info_provider = Arc::new(
        RoutingInfoProvider::new()
            .with_provider("user", Arc::new(StaticBundleProvider(Attributes::new())))
            .with_provider("order", Arc::new(StaticBundleProvider(Attributes::new()))),
    );
    let decision_point = Arc::new(
        DecisionPoint::new(Arc::new(FileStore::new(dir.path())), Arc::new(RuleSetEvaluator::new()))
            .with_resolver(Arc::new(StaticResolver::new(PolicyIdReference::new("default-policy", "v1")))),
    );
    let handler = ContextHandler::new(info_provider, decision_point);

    let resp = handler.evaluate_access(&read_order_request()).await.unwrap();
    assert_eq!(resp.decision, Decision::Indeterminate);
    assert_eq!(resp.status.code, StatusCode::ProcessingError);
    assert_eq!(resp.policy_id_references, vec![PolicyIdReference::new("default-policy", "v1")]);
}
