use axum::{Json, Router, extract::State, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post}};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use tracing::{info, error, Instrument};
use uuid::Uuid;

use crate::{
    config::{mask_secret, Config},
    dispatch::generate,
    error::{AppError, ValidationError},
    models::{CredentialStatus, GenerationResult, OptimizeRequest, OptimizeResponse},
    normalize::parse_generate_body,
    optimizer::optimize_prompt,
    providers::{ChatProvider, ImageProvider},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when no image provider credential is configured.
    pub images: Option<Arc<dyn ImageProvider>>,
    /// `None` when no chat provider credential is configured.
    pub chat: Option<Arc<dyn ChatProvider>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-image", post(generate_image))
        .route("/optimize-prompt", post(optimize))
        .route("/test-provider-credentials", get(test_credentials))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn preview(s: &str) -> String {
    if s.chars().count() > 50 {
        format!("{}...[{} chars]", s.chars().take(50).collect::<String>(), s.chars().count())
    } else {
        s.to_string()
    }
}

pub async fn generate_image(State(state): State<AppState>, body: Bytes) -> Result<Json<GenerationResult>, AppError> {
    let request_id = Uuid::new_v4();
    run_generation(state, body)
        .instrument(tracing::info_span!("generate_image", %request_id))
        .await
}

async fn run_generation(state: AppState, body: Bytes) -> Result<Json<GenerationResult>, AppError> {
    let provider = state
        .images
        .clone()
        .ok_or(AppError::Configuration("API token not configured. Please set REPLICATE_API_TOKEN."))?;

    let req = parse_generate_body(&body)?;
    info!(
        "🚀 Generation request: mode={:?} model_type={} prompt={} clothing={} model={}",
        req.mode,
        req.model_type,
        preview(&req.prompt),
        req.clothing_image.as_deref().map(preview).unwrap_or_else(|| "none".into()),
        req.model_image.as_deref().map(preview).unwrap_or_else(|| "none".into()),
    );

    let result = generate(provider.as_ref(), &state.config, &req).await?;
    info!(
        "✅ Generation finished: image_url={} binary={}",
        result.image_url.as_deref().map(preview).unwrap_or_else(|| "none".into()),
        result.is_binary_response.unwrap_or(false)
    );
    Ok(Json(result))
}

pub async fn optimize(State(state): State<AppState>, body: Bytes) -> Result<Json<OptimizeResponse>, AppError> {
    let chat = state
        .chat
        .clone()
        .ok_or(AppError::Configuration("OpenRouter API key not configured. Please set OPENROUTER_API_KEY."))?;

    let req: OptimizeRequest = serde_json::from_slice(&body).map_err(|_| ValidationError::InvalidFormat)?;
    let user_prompt = req
        .user_prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or(ValidationError::MissingField("userPrompt"))?;

    info!("🎯 Optimizing prompt: {}", preview(&user_prompt));
    let optimized_prompt = optimize_prompt(chat.as_ref(), &user_prompt).await?;

    Ok(Json(OptimizeResponse {
        success: true,
        original_prompt: user_prompt,
        optimized_prompt,
    }))
}

pub async fn test_credentials(State(state): State<AppState>) -> Response {
    match state.config.replicate_api_token.as_deref() {
        Some(token) => Json(CredentialStatus {
            status: "success".to_string(),
            message: "Replicate API token is configured".to_string(),
            token_prefix: mask_secret(token),
        })
        .into_response(),
        None => {
            error!("❌ REPLICATE_API_TOKEN is not configured");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "API token not configured", "status": "error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::output::ProviderValue;
    use crate::providers::ChatMessage;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct CountingImages {
        calls: AtomicUsize,
        reply: Result<ProviderValue, UpstreamError>,
    }

    #[async_trait]
    impl ImageProvider for CountingImages {
        async fn run(&self, _model_id: &str, _input: &Value) -> Result<ProviderValue, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct CountingChat {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatProvider for CountingChat {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<Option<String>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(" optimized prompt ".to_string()))
        }
    }

    fn images(reply: Result<ProviderValue, UpstreamError>) -> Arc<CountingImages> {
        Arc::new(CountingImages { calls: AtomicUsize::new(0), reply })
    }

    fn state(images: Option<Arc<CountingImages>>, chat: Option<Arc<CountingChat>>) -> AppState {
        AppState {
            config: Arc::new(Config {
                replicate_api_token: Some("r8_abcdefghijklmnop".to_string()),
                ..Config::default()
            }),
            images: images.map(|i| i as Arc<dyn ImageProvider>),
            chat: chat.map(|c| c as Arc<dyn ChatProvider>),
        }
    }

    async fn send(state: AppState, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(if method == "GET" { Body::empty() } else { Body::from(body.to_string()) })
            .unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn text_generation_returns_image_url() {
        let imgs = images(Ok(ProviderValue::String("https://cdn.example/a.png".to_string())));
        let (status, body) = send(
            state(Some(imgs.clone()), None),
            "POST",
            "/generate-image",
            json!({"prompt": "black leather jacket", "activeMode": "text"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["imageUrl"], json!("https://cdn.example/a.png"));
        assert_eq!(body["debugInfo"]["modelId"], json!("google/imagen-4"));
        assert!(body.get("isBinaryResponse").is_none());
        assert_eq!(imgs.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_image_is_rejected_before_any_call() {
        let imgs = images(Ok(ProviderValue::String("unused".to_string())));
        let (status, body) = send(
            state(Some(imgs.clone()), None),
            "POST",
            "/generate-image",
            json!({"prompt": "shirt", "activeMode": "image", "inputImage1": "https://img.example/shirt.png"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Missing required field: pairedImage"));
        assert_eq!(imgs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_images_route_to_fashion_template() {
        let imgs = images(Ok(ProviderValue::String("https://cdn.example/b.png".to_string())));
        let (status, body) = send(
            state(Some(imgs), None),
            "POST",
            "/generate-image",
            json!({"prompt": "pleated skirt", "activeMode": "image", "inputImage1": "", "inputImage2": ""}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["debugInfo"]["modelParams"]["prompt"],
            json!(crate::dispatch::fashion_prompt("pleated skirt"))
        );
    }

    #[tokio::test]
    async fn missing_credentials_and_bad_bodies() {
        let (status, body) = send(state(None, None), "POST", "/generate-image", json!({"prompt": "x"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("API token not configured"));

        let imgs = images(Ok(ProviderValue::Null));
        let (status, body) = send(state(Some(imgs), None), "POST", "/generate-image", json!({"activeMode": "text"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Missing required field: prompt"));
    }

    #[tokio::test]
    async fn upstream_failures_map_to_status_codes() {
        let cases = [
            ("Authentication credentials were not provided.", StatusCode::UNAUTHORIZED),
            ("You have insufficient credit", StatusCode::PAYMENT_REQUIRED),
            ("rate limit exceeded", StatusCode::TOO_MANY_REQUESTS),
            ("boom", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (message, expected) in cases {
            let imgs = images(Err(UpstreamError::new(message)));
            let (status, body) = send(
                state(Some(imgs), None),
                "POST",
                "/generate-image",
                json!({"prompt": "x", "activeMode": "text"}),
            )
            .await;
            assert_eq!(status, expected, "{message}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn unparseable_output_is_a_server_error() {
        let imgs = images(Ok(ProviderValue::Bool(true)));
        let (status, body) = send(
            state(Some(imgs), None),
            "POST",
            "/generate-image",
            json!({"prompt": "x", "activeMode": "text"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn optimize_rejects_blank_prompt_without_calling_upstream() {
        let chat = Arc::new(CountingChat { calls: AtomicUsize::new(0) });
        let (status, body) = send(
            state(None, Some(chat.clone())),
            "POST",
            "/optimize-prompt",
            json!({"userPrompt": "  "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Missing required field: userPrompt"));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn optimize_returns_original_and_optimized() {
        let chat = Arc::new(CountingChat { calls: AtomicUsize::new(0) });
        let (status, body) = send(
            state(None, Some(chat)),
            "POST",
            "/optimize-prompt",
            json!({"userPrompt": "red dress"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"success": true, "originalPrompt": "red dress", "optimizedPrompt": "optimized prompt"})
        );

        let (status, _) = send(
            state(None, None),
            "POST",
            "/optimize-prompt",
            json!({"userPrompt": "red dress"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn credential_check_masks_the_token() {
        let (status, body) = send(state(None, None), "GET", "/test-provider-credentials", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_prefix"], json!("r8_ab...mnop"));
        assert!(body.get("tokenPrefix").is_none());

        let mut unconfigured = state(None, None);
        unconfigured.config = Arc::new(Config::default());
        let (status, body) = send(unconfigured, "GET", "/test-provider-credentials", Value::Null).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], json!("error"));
    }
}
