//! OpenAI-compatible Chat Completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use transfit_shared::{OpenAiConfig, Result, TransfitError};
use url::Url;

use crate::prompt::{SYSTEM_PROMPT, render_prompt};
use crate::{TipGenerator, TipRequest};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("transfit/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body echoed into logs.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Connection settings for [`OpenAiGenerator`].
#[derive(Debug, Clone)]
pub struct OpenAiOptions {
    /// API root, e.g. `https://api.openai.com`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiOptions {
    /// Options from the `[openai]` config section and a resolved API key.
    pub fn from_config(config: &OpenAiConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Generates tips through `POST {base_url}/v1/chat/completions`.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    /// Build a client. Fails on an unparseable base URL.
    pub fn new(opts: OpenAiOptions) -> Result<Self> {
        let base = Url::parse(opts.base_url.trim_end_matches('/')).map_err(|e| {
            TransfitError::config(format!("invalid base_url '{}': {e}", opts.base_url))
        })?;
        let endpoint = Url::parse(&format!(
            "{}/v1/chat/completions",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|e| TransfitError::config(format!("invalid endpoint: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| TransfitError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: opts.api_key,
            model: opts.model,
        })
    }
}

#[async_trait]
impl TipGenerator for OpenAiGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(exercise = %request.profile.name, model = %self.model))]
    async fn generate(&self, request: &TipRequest) -> Result<serde_json::Value> {
        // Nothing to ground on; never ask the model to improvise.
        if request.research_context.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }

        let prompt = render_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.0,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransfitError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(TransfitError::Generation(format!(
                "HTTP {status}: {snippet}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransfitError::Generation(format!("invalid completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TransfitError::Generation("completion has no content".into()))?;

        debug!(bytes = content.len(), "completion received");

        serde_json::from_str(&content).map_err(|e| {
            let snippet: String = content.chars().take(MAX_ERROR_BODY).collect();
            TransfitError::Generation(format!("content is not JSON: {e} (got: {snippet})"))
        })
    }
}
