use async_trait::async_trait;
use promptfan_core::PromptfanResult;

/// A backend that turns a prompt into text for one of its models.
///
/// Each implementation owns its authenticated HTTP client, built once when the
/// provider is resolved and reused for every attempt. `generate` performs exactly
/// one round trip and never retries; it returns non-empty text or an error, and
/// an empty answer is reported as `no content generated`.
///
/// To add a new provider:
/// 1. Create a module in `backends/` and implement `Provider` for your struct
/// 2. Register a factory for it in `ProviderRegistry::with_builtins()`
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name, e.g. `openai`.
    fn name(&self) -> &str;

    /// Configured model identifiers, in configuration order.
    fn models(&self) -> &[String];

    /// One generation call against `model`.
    async fn generate(&self, prompt: &str, model: &str) -> PromptfanResult<String>;
}
