use super::{post_json, text_at, trim_endpoint};
use crate::provider::Provider;
use async_trait::async_trait;
use promptfan_core::{Credentials, PromptfanError, ProviderConfig, PromptfanResult};

/// Registry name.
pub const NAME: &str = "aws_bedrock";

/// AWS Bedrock runtime backend for Anthropic messages models.
///
/// Authenticates with a Bedrock API key (`AWS_BEARER_TOKEN_BEDROCK`) as a
/// bearer token against `{endpoint}/model/{model}/invoke`.
pub struct BedrockProvider {
    models: Vec<String>,
    endpoint: String,
    bearer_token: String,
    anthropic_version: Option<String>,
    http: reqwest::Client,
}

impl BedrockProvider {
    /// Needs `AWS_BEARER_TOKEN_BEDROCK`, and `AWS_REGION` unless an endpoint is set.
    pub fn new(section: &ProviderConfig, credentials: &Credentials) -> PromptfanResult<Self> {
        let bearer_token =
            Credentials::require(&credentials.aws_bearer_token, "AWS_BEARER_TOKEN_BEDROCK")?;
        let endpoint = match (&section.endpoint, &credentials.aws_region) {
            (Some(endpoint), _) => trim_endpoint(endpoint),
            (None, Some(region)) => format!("https://bedrock-runtime.{region}.amazonaws.com"),
            (None, None) => {
                return Err(PromptfanError::Config(
                    "AWS_REGION is not set and [providers.aws_bedrock] has no endpoint".into(),
                ))
            }
        };
        Ok(Self {
            models: section.models.clone(),
            endpoint,
            bearer_token: bearer_token.to_string(),
            anthropic_version: credentials.aws_anthropic_version.clone(),
            http: reqwest::Client::new(),
        })
    }

    fn build_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 300,
            "temperature": 0.7,
            "top_p": 0.9,
        });
        if let Some(version) = &self.anthropic_version {
            body["anthropic_version"] = serde_json::json!(version);
        }
        body
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, prompt: &str, model: &str) -> PromptfanResult<String> {
        let url = format!("{}/model/{model}/invoke", self.endpoint);
        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json");
        let resp = post_json(request, &self.build_body(prompt), "Bedrock").await?;
        parse_bedrock_response(&resp)
    }
}

/// Extract the first content block's text from an Anthropic messages reply.
pub fn parse_bedrock_response(body: &serde_json::Value) -> PromptfanResult<String> {
    text_at(body, "/content/0/text")
}
