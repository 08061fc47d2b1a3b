//! Anthropic adapter. Caching semantics: system-prompt
//! blocks get an ephemeral `cache_control` marker when caching is requested;
//! cache reads bill at the cached-input price, cache writes at the
//! cache-write price.

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

const TIERS: &[ModelTier] = &[
    ModelTier::ClaudeHaiku45,
    ModelTier::ClaudeSonnet45,
    ModelTier::ClaudeOpus45,
    ModelTier::ClaudeOpus46,
];

pub struct AnthropicProvider {
    http: HttpProviderClient,
    config: ProviderConfig,
    health: HealthTracker,
    registry: ModelRegistry,
}

#[derive(Debug, Serialize)]
struct SystemBlockWire {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlockWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = config.headers.clone();
        headers.insert("anthropic-version".to_string(), "2023-06-01".to_string());
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            "https://api.anthropic.com",
            &headers,
            AuthStrategy::Header {
                name: "x-api-key".to_string(),
                value: config.api_key.clone(),
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

    fn build_request(&self, req: &CompletionRequest, stream: bool) -> AnthropicRequest {
        let messages = req
            .payload
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    ConversationRole::User => "user".to_string(),
                    ConversationRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let system = req
            .payload
            .system
            .iter()
            .map(|block| SystemBlockWire {
                block_type: "text",
                text: block.text.clone(),
                cache_control: (block.cache_marked && req.caching_enabled)
                    .then_some(CacheControl {
                        control_type: "ephemeral",
                    }),
            })
            .collect();

        AnthropicRequest {
            model: self.upstream_id(req.tier),
            max_tokens: req.payload.max_tokens,
            messages,
            system,
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn priority(&self) -> u32 {
        self.config.priority
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        let body = self.build_request(&req, false);
        let result: Result<AnthropicResponse, ProviderError> =
            self.http.post_json("/v1/messages", &body).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(resp) => {
                self.health.record_success(duration_ms);
                let content = resp.content.into_iter().map(|c| c.text).collect::<String>();
                Ok(CompletionResponse {
                    content,
                    model: resp.model,
                    input_tokens: resp.usage.input_tokens,
                    output_tokens: resp.usage.output_tokens,
                    cached_input_tokens: resp.usage.cache_read_input_tokens,
                    cache_write_tokens: resp.usage.cache_creation_input_tokens,
                    duration_ms,
                    finish_reason: resp
                        .stop_reason
                        .as_deref()
                        .map(map_finish_reason)
                        .unwrap_or(crate::models::FinishReason::Stop),
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
        let response = self.http.post_json_raw("/v1/messages", &body).await?;
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
                                    if let Some(text) = v.get("delta").and_then(|d| d.get("text")).and_then(|t| t.as_str()) {
                                        yield Ok(StreamEvent::TextDelta(text.to_string()));
                                    }
                                    if v.get("type").and_then(|t| t.as_str()) == Some("message_stop") {
                                        yield Ok(StreamEvent::Done);
                                        return;
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
        let body = AnthropicRequest {
            model: self.upstream_id(ModelTier::ClaudeHaiku45),
            max_tokens: 1,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "Hi".to_string(),
            }],
            system: vec![],
            stream: Some(false),
        };
        let result: Result<AnthropicResponse, ProviderError> =
            self.http.post_json("/v1/messages", &body).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationMessage;
    use crate::providers::{PromptPayload, SystemBlock};

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(ProviderConfig::new("test-key")).unwrap()
    }

    fn sample_request(caching_enabled: bool) -> CompletionRequest {
        CompletionRequest {
            tier: ModelTier::ClaudeHaiku45,
            payload: PromptPayload {
                system: vec![SystemBlock {
                    text: "you are a helpful assistant".into(),
                    cache_marked: true,
                }],
                messages: vec![ConversationMessage {
                    role: ConversationRole::User,
                    content: "hi".into(),
                }],
                max_tokens: 100,
            },
            caching_enabled,
        }
    }

    #[test]
    fn cache_marker_only_applied_when_caching_enabled_and_block_marked() {
        let p = provider();
        let wire = p.build_request(&sample_request(true), false);
        assert!(wire.system[0].cache_control.is_some());

        let wire2 = p.build_request(&sample_request(false), false);
        assert!(wire2.system[0].cache_control.is_none());
    }

    #[test]
    fn supports_only_claude_tiers() {
        let p = provider();
        assert!(p.supports_model(ModelTier::ClaudeOpus46));
        assert!(!p.supports_model(ModelTier::Gpt41));
    }
}
