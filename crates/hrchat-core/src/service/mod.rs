//! The remote answer service: wire types, the trait the orchestrator talks to,
//! and the HTTP client that implements it.

pub mod client;

pub use client::AnswerClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result-count hint sent with every query
pub const DEFAULT_TOP_K: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub candidates: Option<Vec<Value>>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to answer service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("answer service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode answer service response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, request: &ChatRequest) -> Result<ChatResponse, ServiceError>;
}
