use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;

/// Body of `POST /generate-image` exactly as the frontend sends it.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawGenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub input_image: Option<String>,
    #[serde(default)]
    pub input_image1: Option<String>,
    #[serde(default)]
    pub input_image2: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub active_mode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Image,
}

/// A validated generation request. Image URLs are only kept when usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub mode: Mode,
    pub clothing_image: Option<String>,
    pub model_image: Option<String>,
    pub model_type: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub model_id: String,
    pub model_params: serde_json::Value,
    pub output_type: String,
    /// Set when the image URL is a best-effort fallback, not a real image.
    pub degraded: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub image_url: Option<String>,
    pub message: Option<String>,
    pub is_binary_response: Option<bool>,
    pub prompt: Option<String>,
    pub debug_info: Option<DebugInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    #[serde(default)]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub success: bool,
    pub original_prompt: String,
    pub optimized_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub status: String,
    pub message: String,
    /// Snake case on the wire; existing clients read `token_prefix`.
    #[serde(rename = "token_prefix")]
    pub token_prefix: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub details: Option<String>,
}
