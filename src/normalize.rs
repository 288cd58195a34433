use crate::error::ValidationError;
use crate::models::{GenerationRequest, Mode, RawGenerateRequest};

/// Anything shorter than this is a placeholder the frontend left behind, not a URL.
pub const MIN_IMAGE_URL_LEN: usize = 10;

pub fn parse_generate_body(body: &[u8]) -> Result<GenerationRequest, ValidationError> {
    let raw: RawGenerateRequest =
        serde_json::from_slice(body).map_err(|_| ValidationError::InvalidFormat)?;
    normalize(raw)
}

pub fn normalize(raw: RawGenerateRequest) -> Result<GenerationRequest, ValidationError> {
    let prompt = raw
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or(ValidationError::MissingField("prompt"))?;

    let mode = match raw.active_mode.as_deref() {
        Some("text") => Mode::Text,
        _ => Mode::Image,
    };

    // inputImage1 is the newer name for the clothing slot; inputImage is kept for old clients.
    let clothing = raw.input_image1.filter(|s| !s.is_empty()).or(raw.input_image);
    let clothing_image = clothing.filter(|s| usable_image(s));
    let model_image = raw.input_image2.filter(|s| usable_image(s));

    let (clothing_image, model_image) = match mode {
        Mode::Text => (None, None),
        Mode::Image => match (clothing_image, model_image) {
            (Some(c), Some(m)) => (Some(c), Some(m)),
            (None, None) => (None, None),
            _ => return Err(ValidationError::MissingField("pairedImage")),
        },
    };

    Ok(GenerationRequest {
        prompt,
        mode,
        clothing_image,
        model_image,
        model_type: raw.model_type.unwrap_or_else(|| "custom".to_string()),
    })
}

fn usable_image(url: &str) -> bool {
    url.trim().chars().count() >= MIN_IMAGE_URL_LEN
}
