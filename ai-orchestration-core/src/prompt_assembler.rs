//! # PromptAssembler
//!
//! Turns an `AIRequest` into the provider-neutral `PromptPayload` every
//! `LLMProvider` consumes. Knows nothing about any particular
//! upstream wire format — that's each provider adapter's job.

use crate::model_registry::default_max_tokens;
use crate::models::{AIRequest, ConversationMessage, ConversationRole};
use crate::providers::{PromptPayload, SystemBlock};

/// System-prompt length above which a cache marker is worth attaching.
/// Conservative relative to any single provider's actual minimum (Google's
/// 32k-char proxy is higher still); each adapter decides locally whether the
/// marker actually clears its own threshold.
const CACHE_MARK_MIN_CHARS: usize = 500;

pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Builds the payload for step 7 of the pipeline. `request.max_tokens`
    /// overrides the category default; caching is only marked when both the
    /// request enables it and the assembled system prompt is long enough to
    /// be worth it.
    pub fn assemble(&self, request: &AIRequest) -> PromptPayload {
        let max_tokens = request
            .max_tokens
            .unwrap_or_else(|| default_max_tokens(request.category));

        let mut system = Vec::new();
        if let Some(text) = request.system_prompt.as_ref().filter(|s| !s.is_empty()) {
            system.push(SystemBlock {
                cache_marked: request.enable_caching && text.len() >= CACHE_MARK_MIN_CHARS,
                text: text.clone(),
            });
        }

        let mut messages: Vec<ConversationMessage> = request.messages.clone();
        messages.push(ConversationMessage {
            role: ConversationRole::User,
            content: request.content.clone(),
        });

        PromptPayload {
            system,
            messages,
            max_tokens,
        }
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn default_max_tokens_follows_category_table() {
        let assembler = PromptAssembler::new();
        let req = AIRequest::new("hi", Category::Chat, "agent");
        assert_eq!(assembler.assemble(&req).max_tokens, 800);

        let req = AIRequest::new("review this diff", Category::CodeReview, "agent");
        assert_eq!(assembler.assemble(&req).max_tokens, 1500);
    }

    #[test]
    fn explicit_max_tokens_overrides_default() {
        let assembler = PromptAssembler::new();
        let mut req = AIRequest::new("hi", Category::Chat, "agent");
        req.max_tokens = Some(42);
        assert_eq!(assembler.assemble(&req).max_tokens, 42);
    }

    #[test]
    fn short_system_prompt_is_not_cache_marked() {
        let assembler = PromptAssembler::new();
        let mut req = AIRequest::new("hi", Category::Chat, "agent");
        req.system_prompt = Some("be nice".to_string());
        let payload = assembler.assemble(&req);
        assert!(!payload.system[0].cache_marked);
    }

    #[test]
    fn long_system_prompt_with_caching_enabled_is_marked() {
        let assembler = PromptAssembler::new();
        let mut req = AIRequest::new("hi", Category::Chat, "agent");
        req.system_prompt = Some("x".repeat(CACHE_MARK_MIN_CHARS));
        let payload = assembler.assemble(&req);
        assert!(payload.system[0].cache_marked);

        req.enable_caching = false;
        let payload = assembler.assemble(&req);
        assert!(!payload.system[0].cache_marked);
    }

    #[test]
    fn current_user_content_is_appended_as_final_message() {
        let assembler = PromptAssembler::new();
        let req = AIRequest::new("what's next", Category::Query, "agent");
        let payload = assembler.assemble(&req);
        assert_eq!(payload.messages.last().unwrap().content, "what's next");
        assert_eq!(payload.messages.last().unwrap().role, ConversationRole::User);
    }
}
