use crate::backends::{bedrock, openai, vertex};
use crate::provider::Provider;
use promptfan_core::{Credentials, GatewayConfig, PromptfanError, ProviderConfig, PromptfanResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a provider from its configuration section and the process credentials.
pub type ProviderFactory = Arc<
    dyn Fn(&ProviderConfig, &Credentials) -> PromptfanResult<Arc<dyn Provider>> + Send + Sync,
>;

/// Maps provider names to factories.
///
/// Resolution validates the shared parts of a provider section (model list and
/// prompt) before handing it to the factory, which checks its own credentials.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// An empty registry, for tests that only want doubles.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `openai`, `aws_bedrock` and `vertexai_gemini`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(openai::NAME, |section, creds| {
            Ok(Arc::new(openai::OpenAiProvider::new(section, creds)?) as Arc<dyn Provider>)
        });
        registry.register(bedrock::NAME, |section, creds| {
            Ok(Arc::new(bedrock::BedrockProvider::new(section, creds)?) as Arc<dyn Provider>)
        });
        registry.register(vertex::NAME, |section, creds| {
            Ok(Arc::new(vertex::VertexGeminiProvider::new(section, creds)?) as Arc<dyn Provider>)
        });
        registry
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderConfig, &Credentials) -> PromptfanResult<Arc<dyn Provider>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the provider called `name` from `config`.
    pub fn resolve(&self, name: &str, config: &GatewayConfig) -> PromptfanResult<Arc<dyn Provider>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PromptfanError::UnknownProvider(name.to_string()))?;

        let section = config.provider(name)?;
        if section.models.is_empty() {
            return Err(PromptfanError::Config(format!(
                "provider '{name}' has no models configured"
            )));
        }
        if section.prompt.trim().is_empty() {
            return Err(PromptfanError::Config(format!(
                "provider '{name}' has no prompt configured"
            )));
        }

        let provider = factory(section, &config.credentials)?;
        debug!(provider = %name, models = section.models.len(), "Provider resolved");
        Ok(provider)
    }
}
