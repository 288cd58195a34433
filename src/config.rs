/// Process-wide configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub replicate_api_token: Option<String>,
    pub replicate_api_base: String,
    pub replicate_file_output: bool,
    pub text_to_image_model: String,
    pub try_on_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_api_base: String,
    pub optimizer_model: String,
    pub site_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            replicate_api_token: None,
            replicate_api_base: "https://api.replicate.com/v1".to_string(),
            replicate_file_output: false,
            text_to_image_model: "google/imagen-4".to_string(),
            try_on_model: "flux-kontext-apps/multi-image-kontext-max".to_string(),
            openrouter_api_key: None,
            openrouter_api_base: "https://openrouter.ai/api/v1".to_string(),
            optimizer_model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            replicate_api_token: non_empty_var("REPLICATE_API_TOKEN"),
            replicate_api_base: non_empty_var("REPLICATE_API_BASE")
                .unwrap_or(defaults.replicate_api_base),
            replicate_file_output: std::env::var("REPLICATE_FILE_OUTPUT")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.replicate_file_output),
            text_to_image_model: non_empty_var("TEXT_TO_IMAGE_MODEL")
                .unwrap_or(defaults.text_to_image_model),
            try_on_model: non_empty_var("TRY_ON_MODEL").unwrap_or(defaults.try_on_model),
            openrouter_api_key: non_empty_var("OPENROUTER_API_KEY"),
            openrouter_api_base: non_empty_var("OPENROUTER_API_BASE")
                .unwrap_or(defaults.openrouter_api_base),
            optimizer_model: non_empty_var("OPTIMIZER_MODEL").unwrap_or(defaults.optimizer_model),
            site_url: non_empty_var("SITE_URL").unwrap_or(defaults.site_url),
        }
    }
}

// An empty variable counts as unset, so `REPLICATE_API_TOKEN=` in a .env file
// still yields the "not configured" response.
fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Mask a credential for display: first five characters, `...`, last four.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 9 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn masks_long_tokens_keeping_prefix_and_suffix() {
        assert_eq!(mask_secret("r8_abcdefghijklmnop"), "r8_ab...mnop");
    }

    #[test]
    fn short_tokens_are_fully_hidden() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
