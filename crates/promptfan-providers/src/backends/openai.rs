use super::{post_json, text_at, trim_endpoint};
use crate::provider::Provider;
use async_trait::async_trait;
use promptfan_core::{Credentials, ProviderConfig, PromptfanResult};

/// Registry name.
pub const NAME: &str = "openai";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI chat completions backend.
///
/// Any OpenAI-compatible server works by pointing `endpoint` at its `/v1` root.
pub struct OpenAiProvider {
    models: Vec<String>,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    /// Needs `OPENAI_API_KEY`.
    pub fn new(section: &ProviderConfig, credentials: &Credentials) -> PromptfanResult<Self> {
        let api_key = Credentials::require(&credentials.openai_api_key, "OPENAI_API_KEY")?;
        Ok(Self {
            models: section.models.clone(),
            endpoint: trim_endpoint(section.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, prompt: &str, model: &str) -> PromptfanResult<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self.http.post(&url).bearer_auth(&self.api_key);
        let resp = post_json(request, &body, "OpenAI").await?;
        parse_openai_response(&resp)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(body: &serde_json::Value) -> PromptfanResult<String> {
    text_at(body, "/choices/0/message/content")
}
