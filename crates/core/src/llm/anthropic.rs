use crate::config::Settings;
use crate::llm::{ScoreClient, ScoreRequest};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Hosted inference client. One fixed model identifier per deployment,
/// overridable through the environment.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(&self, req: CreateMessageRequest) -> anyhow::Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            anyhow::bail!("Anthropic HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<CreateMessageResponse>(&text)
            .with_context(|| format!("failed to decode Anthropic response: {text}"))?;
        Self::response_text(&parsed)
    }

    fn system_prompt() -> String {
        [
            "You are a stock chart performance analyst.",
            "Reply with ONLY a single JSON object. No markdown, no prose, no extra keys.",
            "Output schema:",
            "{\"performance_metric\": <number between 0 and 10>}",
        ]
        .join("\n")
    }

    fn response_text(res: &CreateMessageResponse) -> anyhow::Result<String> {
        let mut out = String::new();
        for block in &res.content {
            match block {
                ContentBlock::Text { text } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
                ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {
                    // Ignore.
                }
                ContentBlock::Unknown => {
                    // Ignore unknown blocks.
                }
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ScoreClient for AnthropicClient {
    async fn score_chart(&self, request: &ScoreRequest) -> anyhow::Result<String> {
        let req = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: request.prompt(),
            }],
        };

        self.create_message(req)
            .await
            .with_context(|| format!("model call failed for {}", request.symbol))
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: String,
    },

    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default)]
        data: String,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_text_blocks_and_skips_thinking() {
        let res = CreateMessageResponse {
            content: vec![
                ContentBlock::Thinking {
                    thinking: "working it out".to_string(),
                    signature: String::new(),
                },
                ContentBlock::Text {
                    text: "{\"performance_metric\":".to_string(),
                },
                ContentBlock::Text {
                    text: "7}".to_string(),
                },
            ],
        };
        let text = AnthropicClient::response_text(&res).unwrap();
        assert_eq!(text, "{\"performance_metric\":\n7}");
    }

    #[test]
    fn decodes_message_response_with_unknown_blocks() {
        let raw = r#"{"content":[{"type":"text","text":"{\"performance_metric\": 8}"},{"type":"web_search_result","data":{}}]}"#;
        let res: CreateMessageResponse = serde_json::from_str(raw).unwrap();
        let text = AnthropicClient::response_text(&res).unwrap();
        assert_eq!(text, "{\"performance_metric\": 8}");
    }
}
