use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one request/response cycle with the reply endpoint. Network
/// failures, non-success statuses, and unparseable bodies all collapse into
/// `Failed`; callers cannot and need not distinguish those causes. A
/// well-formed response that simply carries no `output` field is `NoReply`:
/// the endpoint answered but produced nothing to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeResult {
    Reply(String),
    NoReply,
    Failed,
}

/// The reply-generation seam. Implementations send one user message plus the
/// session identifier and produce the reply text, if any.
#[async_trait::async_trait]
pub trait ReplyService: Send + Sync {
    async fn send(&self, body: &str, session_id: &str) -> ExchangeResult;
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    #[serde(rename = "chatInput")]
    chat_input: &'a str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    output: Option<String>,
}

/// Reply client for webhook-style endpoints (n8n chat webhooks and
/// compatibles): a single JSON POST, no retries.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl ReplyService for WebhookClient {
    async fn send(&self, body: &str, session_id: &str) -> ExchangeResult {
        let request = WebhookRequest {
            chat_input: body,
            session_id,
        };

        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("webhook request failed: {}", e);
                return ExchangeResult::Failed;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("webhook returned error status: {}", e);
                return ExchangeResult::Failed;
            }
        };

        match response.json::<WebhookResponse>().await {
            Ok(WebhookResponse {
                output: Some(reply),
            }) => ExchangeResult::Reply(reply),
            Ok(WebhookResponse { output: None }) => {
                tracing::debug!("webhook response carried no output field");
                ExchangeResult::NoReply
            }
            Err(e) => {
                tracing::warn!("webhook response was not valid JSON: {}", e);
                ExchangeResult::Failed
            }
        }
    }
}
