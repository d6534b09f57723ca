use super::{AnswerService, ChatRequest, ChatResponse, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[derive(Clone)]
pub struct AnswerClient {
    client: Client,
    base_url: String,
}

impl AnswerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl AnswerService for AnswerClient {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError> {
        let response = self
            .client
            .post(self.chat_url())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }
}
