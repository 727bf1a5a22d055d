//! Built-in HTTP backends and the request helpers they share.

pub mod bedrock;
pub mod openai;
pub mod vertex;

use promptfan_core::{PromptfanError, PromptfanResult};

/// Send `body` as JSON and decode a JSON reply, mapping transport failures and
/// non-success statuses to [`PromptfanError::Http`].
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    api: &str,
) -> PromptfanResult<serde_json::Value> {
    let resp = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| PromptfanError::Http(format!("{api} API call failed: {e}")))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| PromptfanError::Http(e.to_string()))?;

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(PromptfanError::Http(format!(
            "{api} API error {status}: credentials rejected or expired: {text}"
        )));
    }
    if !status.is_success() {
        return Err(PromptfanError::Http(format!(
            "{api} API error {status}: {text}"
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| PromptfanError::Http(format!("{api} returned invalid JSON: {e}")))
}

/// Pull a non-empty string out of `body` at the JSON `pointer`.
pub(crate) fn text_at(body: &serde_json::Value, pointer: &str) -> PromptfanResult<String> {
    match body.pointer(pointer).and_then(serde_json::Value::as_str) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(PromptfanError::Generation("no content generated".into())),
    }
}

pub(crate) fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}
