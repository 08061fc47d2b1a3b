//! xAI adapter. OpenAI-compatible envelope: the wire
//! format and streaming shape are identical to `openai.rs`; only the base
//! URL, auth header, and tier roster differ, mirroring the way this corpus
//! already models OpenAI-compatible third parties (Groq, OpenRouter) as
//! thin variations on the same request/response shapes rather than
//! duplicating the whole client.

use super::http_client::{map_error_response, AuthStrategy, HttpProviderClient};
use super::{
    map_finish_reason, CompletionRequest, CompletionResponse, ConnectionTestResult, HealthTracker,
    LLMProvider, ProviderConfig, ProviderHealth, StreamEvent, StreamResult,
};
use crate::error::ProviderError;
use crate::model_registry::{ModelRegistry, ModelTier, ProviderId};
use crate::models::ConversationRole;
use async_stream::stream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const TIERS: &[ModelTier] = &[ModelTier::Grok4Fast, ModelTier::Grok4];

pub struct XaiProvider {
    http: HttpProviderClient,
    config: ProviderConfig,
    health: HealthTracker,
    registry: ModelRegistry,
}

#[derive(Debug, Serialize)]
struct XaiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct XaiRequest {
    model: String,
    messages: Vec<XaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct XaiResponse {
    model: String,
    choices: Vec<ChoiceOut>,
    usage: UsageOut,
}

#[derive(Debug, Deserialize)]
struct ChoiceOut {
    message: MessageOut,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageOut {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct UsageOut {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize, Default)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

impl XaiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            "https://api.x.ai/v1",
            &config.headers,
            AuthStrategy::Bearer {
                token: config.api_key.clone(),
            },
        )?;

        Ok(Self {
            http,
            config,
            health: HealthTracker::new(),
            registry: ModelRegistry::new(),
        })
    }

    fn upstream_id(&self, tier: ModelTier) -> String {
        self.registry.spec(tier).upstream_id.to_string()
    }

    fn build_request(&self, req: &CompletionRequest, stream: bool) -> XaiRequest {
        let mut messages: Vec<XaiMessage> = req
            .payload
            .system
            .iter()
            .map(|b| XaiMessage {
                role: "system".to_string(),
                content: b.text.clone(),
            })
            .collect();

        messages.extend(req.payload.messages.iter().map(|m| XaiMessage {
            role: match m.role {
                ConversationRole::User => "user".to_string(),
                ConversationRole::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }));

        XaiRequest {
            model: self.upstream_id(req.tier),
            messages,
            max_tokens: req.payload.max_tokens,
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl LLMProvider for XaiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Xai
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        let body = self.build_request(&req, false);
        let result: Result<XaiResponse, ProviderError> =
            self.http.post_json("/chat/completions", &body).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => {
                self.health.record_success(duration_ms);
                let choice = resp.choices.into_iter().next();
                let content = choice.as_ref().map(|c| c.message.content.clone()).unwrap_or_default();
                let finish_reason = choice
                    .and_then(|c| c.finish_reason)
                    .as_deref()
                    .map(map_finish_reason)
                    .unwrap_or(crate::models::FinishReason::Stop);
                let cached = resp
                    .usage
                    .prompt_tokens_details
                    .map(|d| d.cached_tokens)
                    .unwrap_or(0);

                Ok(CompletionResponse {
                    content,
                    model: resp.model,
                    input_tokens: resp.usage.prompt_tokens.saturating_sub(cached),
                    output_tokens: resp.usage.completion_tokens,
                    cached_input_tokens: cached,
                    cache_write_tokens: 0,
                    duration_ms,
                    finish_reason,
                })
            }
            Err(e) => {
                self.health.record_failure();
                Err(e)
            }
        }
    }

    async fn stream(&self, req: CompletionRequest) -> Result<StreamResult, ProviderError> {
        let body = self.build_request(&req, true);
        let response = self.http.post_json_raw("/chat/completions", &body).await?;
        if !response.status().is_success() {
            self.health.record_failure();
            return Err(map_error_response(response).await);
        }

        let stream = Box::pin(stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = futures::StreamExt::next(&mut bytes_stream).await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(line_end) = buffer.find('\n') {
                            let line = buffer[..line_end].trim().to_string();
                            buffer = buffer[line_end + 1..].to_string();
                            let Some(json_str) = line.strip_prefix("data: ") else { continue };
                            if json_str == "[DONE]" {
                                yield Ok(StreamEvent::Done);
                                return;
                            }
                            match serde_json::from_str::<serde_json::Value>(json_str) {
                                Ok(v) => {
                                    if let Some(text) = v
                                        .get("choices")
                                        .and_then(|c| c.get(0))
                                        .and_then(|c| c.get("delta"))
                                        .and_then(|d| d.get("content"))
                                        .and_then(|t| t.as_str())
                                    {
                                        yield Ok(StreamEvent::TextDelta(text.to_string()));
                                    }
                                }
                                Err(e) => yield Err(ProviderError::Serialization(e)),
                            }
                        }
                    }
                    Err(e) => yield Err(ProviderError::Http(e)),
                }
            }
        });

        Ok(stream)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let start = Instant::now();
        let body = XaiRequest {
            model: self.upstream_id(ModelTier::Grok4Fast),
            messages: vec![XaiMessage {
                role: "user".to_string(),
                content: "Hi".to_string(),
            }],
            max_tokens: 1,
            stream: Some(false),
        };
        let result: Result<XaiResponse, ProviderError> =
            self.http.post_json("/chat/completions", &body).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(_) => ConnectionTestResult {
                connected: true,
                latency_ms,
                error: None,
            },
            Err(e) => ConnectionTestResult {
                connected: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }

    fn list_models(&self) -> Vec<ModelTier> {
        TIERS.to_vec()
    }

    fn supports_caching(&self) -> bool {
        true
    }

    fn get_health_status(&self) -> ProviderHealth {
        self.health.status()
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
