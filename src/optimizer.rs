use tracing::{info, error};

use crate::error::AppError;
use crate::providers::{ChatMessage, ChatProvider};

pub const SYSTEM_PROMPT: &str = "You are a prompt optimization assistant for clothing image generation. \
The user gives a short garment description; rewrite it as a detailed, professional prompt for a text-to-image model.

Every prompt must include:
1. Image specification: always begin with \"1024x1024 resolution, 1:1 aspect ratio, square format\"
2. Completeness: \"complete garment fully visible from top to bottom\", \"entire clothing item in frame\", \"no cropping of any part\"
3. Shot setup: \"professional product photography\", \"studio lighting\", and \"clean white background\" or \"neutral gray backdrop\"
4. Material detail: name concrete fabrics that suit the garment (silk, cotton, wool, denim, leather, ...)
5. Lighting: \"soft, even lighting\", \"subtle shadows\", \"fabric texture highlights\"
6. Composition: \"centered composition\", \"full garment visible\", \"sharp focus on fabric details\"
7. Quality: always end with \"hyperrealistic fabric textures, professional fashion photography\"

Adjust for the garment category:
* Formal wear / gowns: add \"elegant draping\", \"precise tailoring\", \"luxurious fabric sheen\"
* Casual wear: add \"comfortable fit\", \"natural fabric texture\", \"casual styling\"
* Sportswear: add \"athletic cut\", \"moisture-wicking fabric appearance\", \"dynamic styling\"
* Outerwear: add \"structural silhouette\", \"detailed stitching\", \"layered design elements\"

Reply with the optimized English prompt only, without explanations or extra text.";

/// Rewrite a free-text garment description into a detailed generation prompt.
pub async fn optimize_prompt(chat: &dyn ChatProvider, user_prompt: &str) -> Result<String, AppError> {
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt)];

    let content = chat.complete(&messages).await.map_err(|e| {
        error!("❌ Prompt optimization call failed: {}", e);
        AppError::OptimizationFailed(e.message)
    })?;

    let optimized = content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or(AppError::EmptyOptimizationResult)?;

    info!("✅ Optimized prompt ({} chars -> {} chars)", user_prompt.len(), optimized.len());
    Ok(optimized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct ScriptedChat {
        reply: Result<Option<String>, UpstreamError>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, UpstreamError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            self.reply.clone()
        }
    }

    fn chat(reply: Result<Option<String>, UpstreamError>) -> ScriptedChat {
        ScriptedChat { reply, seen: Mutex::new(Vec::new()) }
    }

    #[tokio::test]
    async fn returns_trimmed_first_completion() {
        let provider = chat(Ok(Some("\n 1024x1024 resolution, red silk gown \n".to_string())));
        let out = optimize_prompt(&provider, "red dress").await.unwrap();
        assert_eq!(out, "1024x1024 resolution, red silk gown");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, "system");
        assert_eq!(seen[1], ChatMessage::user("red dress"));
    }

    #[tokio::test]
    async fn blank_completion_is_an_empty_result() {
        let err = optimize_prompt(&chat(Ok(Some("   ".to_string()))), "x").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyOptimizationResult));
        let err = optimize_prompt(&chat(Ok(None)), "x").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyOptimizationResult));
    }

    #[tokio::test]
    async fn provider_errors_keep_their_message() {
        let err = optimize_prompt(&chat(Err(UpstreamError::new("402 Payment Required"))), "x")
            .await
            .unwrap_err();
        match err {
            AppError::OptimizationFailed(msg) => assert_eq!(msg, "402 Payment Required"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
