use serde_json::{json, Value};
use tracing::{info, error, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{DebugInfo, GenerationRequest, GenerationResult, Mode};
use crate::output::{classify, resolve};
use crate::providers::ImageProvider;

pub const TRY_ON_INSTRUCTION: &str = "Make the person wear the clothing item. \
Keep the person's pose and expression natural. The result should look realistic. \
Professional fashion photography, modern aesthetic, high quality.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Text mode: prompt goes to the text-to-image model untouched.
    TextToImage,
    /// Image mode without usable images: prompt wrapped in the fashion template.
    FashionFallback,
    /// Image mode with both images: garment composited onto the model photo.
    TryOn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    pub route: Route,
    pub model_id: String,
    pub input: Value,
}

pub fn fashion_prompt(prompt: &str) -> String {
    format!(
        "Fashion photography: {prompt}. High-quality professional fashion shoot, \
         modern styling, clean background, good lighting."
    )
}

pub fn plan(config: &Config, req: &GenerationRequest) -> ProviderCall {
    match (req.mode, &req.clothing_image, &req.model_image) {
        (Mode::Text, _, _) => ProviderCall {
            route: Route::TextToImage,
            model_id: config.text_to_image_model.clone(),
            input: json!({
                "prompt": req.prompt,
                "aspect_ratio": "1:1",
                "safety_filter_level": "block_medium_and_above",
            }),
        },
        (Mode::Image, Some(clothing), Some(model)) => ProviderCall {
            route: Route::TryOn,
            model_id: config.try_on_model.clone(),
            input: json!({
                "prompt": TRY_ON_INSTRUCTION,
                "input_image_1": clothing,
                "input_image_2": model,
                "aspect_ratio": "1:1",
            }),
        },
        (Mode::Image, _, _) => ProviderCall {
            route: Route::FashionFallback,
            model_id: config.try_on_model.clone(),
            input: json!({
                "prompt": fashion_prompt(&req.prompt),
                "aspect_ratio": "1:1",
                "output_quality": 90,
                "safety_tolerance": 2,
            }),
        },
    }
}

/// Run one generation: a single provider call, then shape resolution. No retries.
pub async fn generate(
    provider: &dyn ImageProvider,
    config: &Config,
    req: &GenerationRequest,
) -> Result<GenerationResult, AppError> {
    let call = plan(config, req);
    info!("🔄 Route {:?} using model {}", call.route, call.model_id);

    let value = provider.run(&call.model_id, &call.input).await.map_err(|e| {
        error!("❌ Image provider call failed: {}", e);
        AppError::from_upstream(e)
    })?;

    let output_type = value.kind().to_string();
    info!("📥 Provider output kind: {}", output_type);

    let resolution = resolve(classify(value))?;
    if resolution.degraded {
        warn!("⚠️ Output exposed url() instead of a string; returning prediction page URL");
    }
    if resolution.is_binary {
        info!(
            "🔍 Provider returned stream data (image url present: {})",
            resolution.image_url.is_some()
        );
    }

    Ok(GenerationResult {
        success: true,
        image_url: resolution.image_url,
        message: resolution.message,
        is_binary_response: resolution.is_binary.then_some(true),
        prompt: Some(req.prompt.clone()),
        debug_info: Some(DebugInfo {
            model_id: call.model_id,
            model_params: call.input,
            output_type,
            degraded: resolution.degraded.then(|| "prediction-page-url".to_string()),
        }),
    })
}
