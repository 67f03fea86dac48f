//! Amazon SQS client speaking the AWS JSON 1.0 protocol.
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::CredentialSource;
use super::sigv4::{self, SignableRequest};
use super::{QueueClient, QueueMessage};
use crate::error::{WorkerError, WorkerResult};

const SERVICE: &str = "sqs";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: u8,
    wait_time_seconds: u8,
    message_attribute_names: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    message_id: String,
    receipt_handle: String,
    #[serde(default)]
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

#[derive(Debug, Deserialize)]
struct SqsErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(default, alias = "Message")]
    message: String,
}

#[derive(Clone)]
pub struct SqsClient {
    http: Client,
    endpoint: Url,
    queue_url: String,
    region: String,
    credentials: CredentialSource,
}

impl SqsClient {
    pub fn new(
        queue_url: impl Into<String>,
        region: impl Into<String>,
        credentials: CredentialSource,
    ) -> anyhow::Result<Self> {
        let region = region.into();
        let endpoint = Url::parse(&format!("https://sqs.{region}.amazonaws.com/"))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            queue_url: queue_url.into(),
            region,
            credentials,
        })
    }

    /// Point the client at a different endpoint (local emulators, VPC
    /// endpoints).
    pub fn with_endpoint(mut self, endpoint: &str) -> anyhow::Result<Self> {
        self.endpoint = Url::parse(endpoint)?;
        Ok(self)
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    async fn call<B, T>(&self, action: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Default,
    {
        let credentials = self.credentials.current().await?;
        let payload = serde_json::to_vec(body)?;
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let target = format!("AmazonSQS.{action}");

        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host_header()),
            ("x-amz-date".to_string(), amz_date.clone()),
            ("x-amz-target".to_string(), target.clone()),
        ];
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let signable = SignableRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers: &headers,
            payload: &payload,
        };
        let authorization =
            sigv4::authorization(&credentials, &self.region, SERVICE, &amz_date, &signable)?;

        let mut req = self
            .http
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-date", &amz_date)
            .header("x-amz-target", &target)
            .header("authorization", authorization);
        if let Some(token) = &credentials.session_token {
            req = req.header("x-amz-security-token", token);
        }

        debug!(%action, "sqs request");
        let res = req.body(payload).send().await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<SqsErrorBody>(&text)
                .map(|e| format!("{} - {}", e.error_type, e.message))
                .unwrap_or(text);
            anyhow::bail!("SQS {action} failed with {status}: {detail}");
        }

        // DeleteMessage answers with an empty body
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl QueueClient for SqsClient {
    async fn receive(
        &self,
        max_messages: u8,
        wait_time_seconds: u8,
    ) -> WorkerResult<Vec<QueueMessage>> {
        let request = ReceiveMessageRequest {
            queue_url: &self.queue_url,
            max_number_of_messages: max_messages,
            wait_time_seconds,
            message_attribute_names: ["All"],
        };
        let response: ReceiveMessageResponse = self
            .call("ReceiveMessage", &request)
            .await
            .map_err(WorkerError::queue)?;

        Ok(response
            .messages
            .into_iter()
            .map(|m| QueueMessage {
                message_id: m.message_id,
                receipt_handle: m.receipt_handle,
                body: m.body,
            })
            .collect())
    }

    async fn delete(&self, receipt_handle: &str) -> WorkerResult<()> {
        let request = DeleteMessageRequest {
            queue_url: &self.queue_url,
            receipt_handle,
        };
        let _: serde_json::Value = self
            .call("DeleteMessage", &request)
            .await
            .map_err(WorkerError::queue)?;
        Ok(())
    }
}
