//! Summary generation: provider abstraction + concrete providers.
//!
//! The orchestrator treats generation as an opaque, slow, fallible call. This
//! module supplies the production OpenAI provider, a deterministic mock for
//! tests/local runs, and a disabled provider that always fails.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::summarizer::SummarizerConfig;

/// Input for one summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub item_id: String,
    pub title: String,
    pub body: Option<String>,
}

impl SummaryRequest {
    /// Text handed to the model: title, blank line, body (or a placeholder).
    pub fn content(&self) -> String {
        let body = self
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or("No content available");
        format!("{}\n\n{}", self.title, body)
    }
}

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, request: &SummaryRequest) -> Result<String>;
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn SummaryGenerator>;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes Reddit posts. Provide concise, informative summaries that capture the main points and key insights. Keep summaries under 150 words and maintain a neutral tone.";
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI provider (Chat Completions API).
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("feed-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building OpenAI http client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SummaryGenerator for OpenAiGenerator {
    async fn generate(&self, request: &SummaryRequest) -> Result<String> {
        if self.api_key.trim().is_empty() {
            bail!("OpenAI API key not configured");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            max_tokens: u32,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let user = format!("Please summarize this Reddit post:\n\n{}", request.content());
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            max_tokens: 200,
            temperature: 0.3,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("openai returned {status}"));
        }
        let body: Resp = resp.json().await.context("decoding openai response")?;
        let summary = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if summary.is_empty() {
            bail!("no summary generated");
        }
        Ok(summary)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic provider for tests/local runs.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

#[async_trait]
impl SummaryGenerator for MockGenerator {
    async fn generate(&self, request: &SummaryRequest) -> Result<String> {
        Ok(format!("Summary of \"{}\" (mock)", request.title))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails; used when summarization is disabled.
#[derive(Debug, Clone, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl SummaryGenerator for DisabledGenerator {
    async fn generate(&self, _request: &SummaryRequest) -> Result<String> {
        bail!("summarization is disabled")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory: build a generator according to config and environment.
///
/// * `SUMMARY_TEST_MODE=mock` → `MockGenerator`.
/// * `enabled == false` or an unknown provider → `DisabledGenerator`.
/// * `provider == "openai"` → `OpenAiGenerator` with the resolved key.
pub fn build_generator(cfg: &SummarizerConfig) -> Result<DynGenerator> {
    if std::env::var("SUMMARY_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockGenerator));
    }
    if !cfg.enabled {
        return Ok(Arc::new(DisabledGenerator));
    }
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGenerator::new(
            cfg.api_key.clone(),
            cfg.model.clone(),
        )?)),
        "mock" => Ok(Arc::new(MockGenerator)),
        other => {
            tracing::warn!(provider = other, "unknown summary provider, disabling");
            Ok(Arc::new(DisabledGenerator))
        }
    }
}
