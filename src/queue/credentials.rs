//! Where signing keys come from: fixed keys, or the ECS/Fargate container
//! credentials endpoint, whose keys expire and are refreshed on demand.
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::sigv4::AwsCredentials;

/// Link-local host serving task role credentials inside ECS and Fargate.
pub const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Refresh this many minutes before the advertised expiry.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Clone)]
pub enum CredentialSource {
    Static(AwsCredentials),
    Container(Arc<ContainerCredentials>),
}

impl CredentialSource {
    pub fn fixed(credentials: AwsCredentials) -> Self {
        CredentialSource::Static(credentials)
    }

    pub fn container(provider: ContainerCredentials) -> Self {
        CredentialSource::Container(Arc::new(provider))
    }

    /// Credentials valid for signing a request now.
    pub async fn current(&self) -> anyhow::Result<AwsCredentials> {
        match self {
            CredentialSource::Static(credentials) => Ok(credentials.clone()),
            CredentialSource::Container(provider) => provider.current().await,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentialsResponse {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    expiration: DateTime<Utc>,
}

struct Cached {
    credentials: AwsCredentials,
    expires_at: DateTime<Utc>,
}

pub struct ContainerCredentials {
    http: Client,
    endpoint: String,
    auth_token: Option<String>,
    cached: Mutex<Option<Cached>>,
}

impl ContainerCredentials {
    /// `endpoint` is the full URL; see [`Self::from_relative_uri`] for the
    /// usual `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` form.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            auth_token: None,
            cached: Mutex::new(None),
        }
    }

    pub fn from_relative_uri(uri: &str) -> Self {
        Self::new(format!("{CONTAINER_CREDENTIALS_HOST}{uri}"))
    }

    /// Sent as `Authorization` (`AWS_CONTAINER_AUTHORIZATION_TOKEN`).
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub async fn current(&self) -> anyhow::Result<AwsCredentials> {
        let mut cached = self.cached.lock().await;
        let refresh_after = Utc::now() + TimeDelta::minutes(REFRESH_MARGIN_MINUTES);
        if let Some(entry) = cached.as_ref().filter(|e| e.expires_at > refresh_after) {
            return Ok(entry.credentials.clone());
        }

        let fresh = self.fetch().await?;
        info!(expires_at = %fresh.expires_at, "refreshed container credentials");
        let credentials = fresh.credentials.clone();
        *cached = Some(fresh);
        Ok(credentials)
    }

    async fn fetch(&self) -> anyhow::Result<Cached> {
        let mut req = self.http.get(&self.endpoint);
        if let Some(token) = &self.auth_token {
            req = req.header("authorization", token);
        }
        let res = req.send().await?;
        debug!(status = %res.status(), "container credentials response");
        if !res.status().is_success() {
            anyhow::bail!("container credentials request failed with {}", res.status());
        }
        let body: ContainerCredentialsResponse = res.json().await?;
        Ok(Cached {
            credentials: AwsCredentials {
                access_key_id: body.access_key_id,
                secret_access_key: body.secret_access_key,
                session_token: body.token,
            },
            expires_at: body.expiration,
        })
    }
}
