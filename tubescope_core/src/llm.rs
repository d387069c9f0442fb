// src/llm.rs

use crate::error::PipelineError;
use crate::usage::TokenUsage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";

// Published per-million-token prices for the default model tier. Used for
// run-level cost attribution only; the ledger marks these as estimates.
const INPUT_COST_PER_MTOK: f64 = 3.0;
const OUTPUT_COST_PER_MTOK: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: String,
    /// Attribution tag recorded against the run's spend.
    pub feature_tag: String,
    pub max_output_tokens: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub cost_usd: Option<f64>,
}

/// External LLM collaborator. Timeout/retry policy lives behind this seam;
/// the pipeline treats a call as "succeeds with text" or "fails".
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, PipelineError>;
}

#[derive(Debug)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent("tubescope/0.1.0")
            .build()
            .map_err(|e| PipelineError::Other(e.to_string()))?;

        let api_key = api_key
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                PipelineError::Authentication(
                    "Anthropic api_key not set (pass one or set ANTHROPIC_API_KEY)".into(),
                )
            })?;
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_headers(&self) -> Result<HeaderMap, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| PipelineError::Other(e.to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        Ok(headers)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, PipelineError> {
        let headers = self.build_headers()?;
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_output_tokens,
            "system": request.system_prompt,
            "messages": [ { "role": "user", "content": request.prompt } ],
            "metadata": { "user_id": request.feature_tag },
        });

        let resp = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::HttpRequest)?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm(format!(
                "Anthropic API error: {} - {}",
                status, detail
            )));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(PipelineError::HttpRequest)?;
        let text = parsed
            .content
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        let usage = parsed.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        let cost_usd = usage.map(|u| {
            (u.input_tokens as f64 * INPUT_COST_PER_MTOK
                + u.output_tokens as f64 * OUTPUT_COST_PER_MTOK)
                / 1_000_000.0
        });

        Ok(CompletionReply {
            text,
            usage,
            cost_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_an_auth_error() {
        // Shield the assertion from an ambient key in the environment.
        let had_key = std::env::var("ANTHROPIC_API_KEY").is_ok();
        if had_key {
            return;
        }
        let err = AnthropicClient::new(None, None).unwrap_err();
        assert_eq!(err.code_str(), "auth_failed");
    }

    #[test]
    fn cost_uses_both_token_directions() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
        };
        let cost = (usage.input_tokens as f64 * INPUT_COST_PER_MTOK
            + usage.output_tokens as f64 * OUTPUT_COST_PER_MTOK)
            / 1_000_000.0;
        assert!((cost - 18.0).abs() < f64::EPSILON);
    }
}
