use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, error, warn};

use crate::config::Config;
use crate::error::UpstreamError;
use crate::output::{ProviderObject, ProviderValue};
use crate::providers::ImageProvider;

// Shorten long string leaves (data URLs, base64 blobs) so logged payloads stay readable
pub fn truncate_long_strings(value: &mut Value, max: usize) {
    match value {
        Value::String(s) if s.chars().count() > max => {
            let head: String = s.chars().take(max).collect();
            *s = format!("{}...[{} chars]", head, s.chars().count());
        }
        Value::Object(map) => {
            for val in map.values_mut() {
                truncate_long_strings(val, max);
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_long_strings(val, max);
            }
        }
        _ => {}
    }
}

/// How long the provider holds a `Prefer: wait` request open before answering
/// with an unfinished prediction.
pub const SYNC_WAIT_LIMIT: &str = "60s";

pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
    file_output: bool,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
}

impl ReplicateClient {
    pub fn new(api_token: String, config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url: config.replicate_api_base.trim_end_matches('/').to_string(),
            file_output: config.replicate_file_output,
        }
    }

    /// `owner/name` runs the model's latest version; `owner/name:version` pins one.
    fn prediction_request(&self, model_id: &str, input: &Value) -> (String, Value) {
        match model_id.split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/predictions", self.base_url, model_id),
                json!({ "input": input }),
            ),
        }
    }

    async fn perform_api_call(&self, model_id: &str, input: &Value) -> Result<Prediction, UpstreamError> {
        let (url, request_body) = self.prediction_request(model_id, input);
        info!("🔗 Making request to: {}", url);

        let mut logged = request_body.clone();
        truncate_long_strings(&mut logged, 120);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| UpstreamError::new(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| UpstreamError::new(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(UpstreamError::new(format!(
                "Request to {} failed with status {}: {}",
                url, status, response_text
            )));
        }

        let prediction: Prediction = serde_json::from_str(&response_text)
            .map_err(|e| UpstreamError::new(format!("parse error: {}: {}", e, response_text)))?;
        info!(
            "📥 Prediction {} finished with status {}",
            prediction.id.as_deref().unwrap_or("?"),
            prediction.status.as_deref().unwrap_or("?")
        );
        Ok(prediction)
    }

    fn output_value(&self, output: Value) -> ProviderValue {
        if self.file_output {
            wrap_file_outputs(output)
        } else {
            output.into()
        }
    }
}

/// Turn every URL string into the stream-like file object the SDK returns in
/// file-output mode.
pub fn wrap_file_outputs(value: Value) -> ProviderValue {
    match value {
        Value::String(s) if s.starts_with("http") => ProviderValue::Object(ProviderObject::file_output(&s)),
        Value::Array(items) => ProviderValue::Array(items.into_iter().map(wrap_file_outputs).collect()),
        other => other.into(),
    }
}

// Not a model failure: the prediction outlived the `Prefer: wait` window and is
// not polled, so this call gives up while it keeps running upstream.
fn unfinished_prediction(id: &str, status: &str) -> UpstreamError {
    warn!("⚠️ Prediction {} still {} after the synchronous wait window", id, status);
    UpstreamError::new(format!(
        "Prediction {} exceeded the synchronous wait limit ({}) and is still {}; results are not polled",
        id, SYNC_WAIT_LIMIT, status
    ))
}

fn prediction_error_text(error: Option<Value>) -> String {
    match error {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => "unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl ImageProvider for ReplicateClient {
    async fn run(&self, model_id: &str, input: &Value) -> Result<ProviderValue, UpstreamError> {
        let started = Instant::now();
        let result = self.perform_api_call(model_id, input).await;
        info!("⏱️ Replicate call for {} took {:?}", model_id, started.elapsed());

        let prediction = result?;
        let id = prediction.id.clone().unwrap_or_default();
        match prediction.status.as_deref() {
            Some("succeeded") | None => Ok(self.output_value(prediction.output)),
            Some(status @ ("failed" | "canceled")) => {
                let message = prediction_error_text(prediction.error);
                error!("❌ Prediction {} {}: {}", id, status, message);
                Err(UpstreamError::new(format!("Prediction {} {}: {}", id, status, message)))
            }
            Some(status) => Err(unfinished_prediction(&id, status)),
        }
    }
}
