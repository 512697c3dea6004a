//! Context handler: enriches an access request with attributes, discovers
//! and fetches additional information, and drives the decision point.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::decision::DecisionMaker;
use crate::errors::{AccessError, BoxError};
use crate::info::InfoProvider;
use crate::model::{
    AccessRequest, AccessResponse, Attributes, DecisionRequest, EnrichedAccessRequest,
    GetInfoRequest, InfoParams, ROLES_ATTRIBUTE,
};

/// Evaluates access requests on behalf of an enforcement point.
#[async_trait]
pub trait AccessEvaluator: Send + Sync {
    async fn evaluate_access(&self, req: &AccessRequest) -> Result<AccessResponse, AccessError>;
}

/// Inspects an enriched request and names the additional information the
/// decision will need. Returning an empty list means nothing further is
/// required.
#[async_trait]
pub trait InfoAnalyser: Send + Sync {
    async fn analyse(&self, req: &EnrichedAccessRequest) -> Result<Vec<GetInfoRequest>, BoxError>;
}

/// The built-in context handler.
///
/// Analysers run in registration order so the emitted info-request sequence
/// is deterministic; the fetches they trigger run in parallel.
pub struct ContextHandler {
    analysers: Vec<Arc<dyn InfoAnalyser>>,
    info_provider: Arc<dyn InfoProvider>,
    decision_maker: Arc<dyn DecisionMaker>,
}

impl ContextHandler {
    pub fn new(info_provider: Arc<dyn InfoProvider>, decision_maker: Arc<dyn DecisionMaker>) -> Self {
        Self { analysers: Vec::new(), info_provider, decision_maker }
    }

    /// Registers an info analyser. Registration order is preserved.
    #[must_use]
    pub fn with_analyser(mut self, analyser: Arc<dyn InfoAnalyser>) -> Self {
        self.analysers.push(analyser);
        self
    }

    /// Fetches subject and resource attribute bundles in parallel. The first
    /// failure cancels the sibling fetch.
    async fn enrich(&self, req: &AccessRequest) -> Result<EnrichedAccessRequest, AccessError> {
        let subject_info = async {
            self.info_provider
                .get_info(&GetInfoRequest::new(req.subject.subject_type.clone(), req.subject.id.clone()))
                .await
        };
        let resource_info = async {
            self.info_provider
                .get_info(&GetInfoRequest::new(req.resource.resource_type.clone(), req.resource.id.clone()))
                .await
        };

        let (subject_info, resource_info) = tokio::try_join!(subject_info, resource_info)
            .map_err(|source| AccessError::Enrichment { source })?;

        let mut enriched = EnrichedAccessRequest {
            subject: req.subject.clone(),
            action: req.action.clone(),
            resource: req.resource.clone(),
        };
        enriched.subject.attributes = subject_info.info;
        enriched.resource.attributes = resource_info.info;
        Ok(enriched)
    }

    /// Collects additional info requirements from every analyser, preserving
    /// registration order.
    async fn analyse(&self, req: &EnrichedAccessRequest) -> Result<Vec<GetInfoRequest>, AccessError> {
        let mut requests = Vec::new();
        for analyser in &self.analysers {
            let more = analyser.analyse(req).await.map_err(|source| AccessError::Analysis { source })?;
            requests.extend(more);
        }
        Ok(requests)
    }

    /// Fetches all secondary info requests in parallel and merges the bundles
    /// into one mapping. A key served by two responses fails the whole step.
    async fn additional_info(&self, requests: Vec<GetInfoRequest>) -> Result<Attributes, AccessError> {
        if requests.is_empty() {
            return Ok(Attributes::new());
        }

        let merged: Mutex<Attributes> = Mutex::new(Attributes::new());

        try_join_all(requests.iter().map(|request| {
            let merged = &merged;
            async move {
                let resp = self
                    .info_provider
                    .get_info(request)
                    .await
                    .map_err(|source| AccessError::AdditionalInfo { source })?;

                let mut merged = merged.lock().unwrap();
                for (key, value) in resp.info {
                    if merged.contains_key(&key) {
                        return Err(AccessError::DuplicateInfo { key });
                    }
                    merged.insert(key, value);
                }
                Ok(())
            }
        }))
        .await?;

        Ok(merged.into_inner().unwrap())
    }
}

fn decision_request(req: EnrichedAccessRequest, environment: Attributes) -> DecisionRequest {
    DecisionRequest {
        request_id: Uuid::new_v4(),
        subject: req.subject,
        action: req.action,
        resource: req.resource,
        environment,
    }
}

#[async_trait]
impl AccessEvaluator for ContextHandler {
    async fn evaluate_access(&self, req: &AccessRequest) -> Result<AccessResponse, AccessError> {
        let enriched = self.enrich(req).await?;
        let info_requests = self.analyse(&enriched).await?;
        let environment = self.additional_info(info_requests).await?;

        let decision_req = decision_request(enriched, environment);
        let response = self
            .decision_maker
            .decide(&decision_req)
            .await
            .map_err(|source| AccessError::Decision { source })?;

        Ok(response.into())
    }
}

/// Emits an RBAC info request when the enriched subject carries a sequence
/// of role names.
pub struct RoleAnalyser {
    info_type: String,
}

impl RoleAnalyser {
    /// `info_type` names the information provider that serves the role
    /// hierarchy bundle.
    pub fn new(info_type: impl Into<String>) -> Self {
        Self { info_type: info_type.into() }
    }
}

#[async_trait]
impl InfoAnalyser for RoleAnalyser {
    async fn analyse(&self, req: &EnrichedAccessRequest) -> Result<Vec<GetInfoRequest>, BoxError> {
        match req.subject.attributes.get(ROLES_ATTRIBUTE) {
            Some(serde_json::Value::Array(roles)) => Ok(vec![GetInfoRequest {
                info_type: self.info_type.clone(),
                params: InfoParams::Values(roles.clone()),
                context: None,
            }]),
            _ => Ok(Vec::new()),
        }
    }
}
