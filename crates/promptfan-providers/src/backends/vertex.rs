use super::{post_json, text_at, trim_endpoint};
use crate::provider::Provider;
use async_trait::async_trait;
use promptfan_core::{Credentials, ProviderConfig, PromptfanResult};

/// Registry name.
pub const NAME: &str = "vertexai_gemini";

/// Vertex AI Gemini `generateContent` backend.
pub struct VertexGeminiProvider {
    models: Vec<String>,
    endpoint: String,
    project_id: String,
    location: String,
    access_token: String,
    http: reqwest::Client,
}

impl VertexGeminiProvider {
    /// Needs `GCP_PROJECT_ID`, `VERTEX_AI_LOCATION` and `GCP_ACCESS_TOKEN`.
    pub fn new(section: &ProviderConfig, credentials: &Credentials) -> PromptfanResult<Self> {
        let project_id = Credentials::require(&credentials.gcp_project_id, "GCP_PROJECT_ID")?;
        let location = Credentials::require(&credentials.vertex_location, "VERTEX_AI_LOCATION")?;
        let access_token = Credentials::require(&credentials.gcp_access_token, "GCP_ACCESS_TOKEN")?;
        let endpoint = match &section.endpoint {
            Some(endpoint) => trim_endpoint(endpoint),
            None => format!("https://{location}-aiplatform.googleapis.com"),
        };
        Ok(Self {
            models: section.models.clone(),
            endpoint,
            project_id: project_id.to_string(),
            location: location.to_string(),
            access_token: access_token.to_string(),
            http: reqwest::Client::new(),
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{model}:generateContent",
            self.endpoint, self.project_id, self.location
        )
    }
}

#[async_trait]
impl Provider for VertexGeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, prompt: &str, model: &str) -> PromptfanResult<String> {
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": 0.2,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 1024,
            },
        });
        let request = self
            .http
            .post(self.model_url(model))
            .bearer_auth(&self.access_token);
        let resp = post_json(request, &body, "Vertex AI").await?;
        parse_gemini_response(&resp)
    }
}

/// Extract the first candidate's first text part.
pub fn parse_gemini_response(body: &serde_json::Value) -> PromptfanResult<String> {
    text_at(body, "/candidates/0/content/parts/0/text")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            gcp_project_id: Some("proj".into()),
            vertex_location: Some("asia-northeast1".into()),
            gcp_access_token: Some("ya29.token".into()),
            ..Default::default()
        }
    }

    #[test]
    fn url_uses_regional_endpoint() {
        let section = ProviderConfig {
            models: vec!["gemini-1.5-pro".into()],
            prompt: "p".into(),
            endpoint: None,
        };
        let p = VertexGeminiProvider::new(&section, &creds()).unwrap();
        assert_eq!(
            p.model_url("gemini-1.5-pro"),
            "https://asia-northeast1-aiplatform.googleapis.com/v1/projects/proj/locations/asia-northeast1/publishers/google/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn missing_location_fails() {
        let mut c = creds();
        c.vertex_location = None;
        let err = VertexGeminiProvider::new(&ProviderConfig::default(), &c)
            .err()
            .unwrap();
        assert!(err.to_string().contains("VERTEX_AI_LOCATION"));
    }

    #[test]
    fn parses_candidate_text() {
        let body = serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "gokou no surikire"}]}}]
        });
        assert_eq!(parse_gemini_response(&body).unwrap(), "gokou no surikire");
    }

    #[test]
    fn candidate_without_parts_is_no_content() {
        let body = serde_json::json!({"candidates": [{"content": {"parts": []}}]});
        let err = parse_gemini_response(&body).unwrap_err();
        assert_eq!(err.to_string(), "no content generated");
    }
}
