use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, error};

use crate::config::Config;
use crate::error::UpstreamError;
use crate::providers::{ChatMessage, ChatProvider};

const APP_TITLE: &str = "StyleMix AI - Outfit Generator";

/// OpenAI-compatible chat completions served by OpenRouter.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    site_url: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: String, config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: config.openrouter_api_base.trim_end_matches('/').to_string(),
            model: config.optimizer_model.clone(),
            site_url: config.site_url.clone(),
        }
    }
}

fn first_content(resp: ChatCompletionResponse) -> Option<String> {
    resp.choices.into_iter().next()?.message?.content
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: 500,
            temperature: 0.7,
        };

        info!("🔄 Calling {} on OpenRouter", self.model);
        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", APP_TITLE)
            .json(&payload)
            .send()
            .await
            .map_err(|e| UpstreamError::new(e.to_string()))?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| UpstreamError::new(e.to_string()))?;

        if !status.is_success() {
            error!("❌ OpenRouter chat completion failed with status {}: {}", status, response_text);
            return Err(UpstreamError::new(format!("{} {}", status, response_text)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| UpstreamError::new(format!("Failed to parse response: {}", e)))?;
        Ok(first_content(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_comes_from_the_first_choice() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  studio shot  "}},{"message":{"content":"ignored"}}]}"#,
        ).unwrap();
        assert_eq!(first_content(parsed).as_deref(), Some("  studio shot  "));
    }

    #[test]
    fn missing_choices_or_content_yield_none() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_content(parsed), None);
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(first_content(parsed), None);
    }
}
