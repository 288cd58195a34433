use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UpstreamError;
use crate::output::ProviderValue;

/// A hosted image model runner: one model id and input in, one output value back.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn run(&self, model_id: &str, input: &Value) -> Result<ProviderValue, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// A chat-completion endpoint. `Ok(None)` means the provider answered without content.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, UpstreamError>;
}
