//! Deployment pipeline trigger.
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, header};
use serde::Serialize;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DOMAIN_UPDATE_EVENT: &str = "domain-update";

#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    /// Ask the pipeline to reconcile against the full active-domain snapshot.
    /// Re-triggering with the same snapshot must be harmless.
    async fn trigger(&self, active_domains: &[String]) -> WorkerResult<()>;
}

#[derive(Debug, Serialize)]
struct DispatchBody<'a> {
    event_type: &'a str,
    client_payload: DispatchPayload<'a>,
}

#[derive(Debug, Serialize)]
struct DispatchPayload<'a> {
    environment: &'a str,
    active_domains: usize,
    domains: Vec<&'a str>,
    timestamp: i64,
}

/// Fires a GitHub `repository_dispatch` event carrying the full, sorted
/// active-domain snapshot so the workflow can reconcile against it.
#[derive(Clone)]
pub struct GitHubDispatchTrigger {
    http: Client,
    api_base: String,
    repo: String, // "owner/name"
    token: String,
    environment: String,
}

impl GitHubDispatchTrigger {
    pub fn new(
        repo: impl Into<String>,
        token: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_base: DEFAULT_GITHUB_API.to_string(),
            repo: repo.into(),
            token: token.into(),
            environment: environment.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn dispatch_url(&self) -> String {
        format!("{}/repos/{}/dispatches", self.api_base, self.repo)
    }
}

#[async_trait]
impl DeploymentTrigger for GitHubDispatchTrigger {
    async fn trigger(&self, active_domains: &[String]) -> WorkerResult<()> {
        let mut domains: Vec<&str> = active_domains.iter().map(String::as_str).collect();
        domains.sort_unstable();
        domains.dedup();

        let body = DispatchBody {
            event_type: DOMAIN_UPDATE_EVENT,
            client_payload: DispatchPayload {
                environment: &self.environment,
                active_domains: domains.len(),
                domains,
                timestamp: Utc::now().timestamp(),
            },
        };

        let res = self
            .http
            .post(self.dispatch_url())
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, concat!("zoneshift/", env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()
            .await
            .map_err(WorkerError::deploy)?;

        if !res.status().is_success() {
            return Err(WorkerError::deploy(anyhow::anyhow!(
                "repository_dispatch failed with {}",
                res.status()
            )));
        }

        info!(
            environment = %self.environment,
            active_domains = active_domains.len(),
            "triggered deployment workflow"
        );
        Ok(())
    }
}
