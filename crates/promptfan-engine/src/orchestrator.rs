//! Batch assembly across one or several providers.

use crate::executor::AttemptTarget;
use crate::policy::{ExecutionEngine, ExecutionPolicy};
use parking_lot::Mutex;
use promptfan_core::{
    BatchResponse, GatewayConfig, GenerationRequest, PromptfanResult, ProviderMode,
    ProviderResults,
};
use promptfan_providers::ProviderRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Turns one [`GenerationRequest`] into a [`BatchResponse`].
///
/// Resolves the active providers, runs every configured model of each through
/// the [`ExecutionEngine`], and assembles the response. Failures stay at the
/// smallest scope: an attempt failure is an entry, a provider resolution
/// failure drops only that provider in multi-provider mode.
#[derive(Clone)]
pub struct BatchOrchestrator {
    config: Arc<GatewayConfig>,
    registry: Arc<ProviderRegistry>,
    engine: ExecutionEngine,
}

impl BatchOrchestrator {
    /// Orchestrator over `config`, resolving providers through `registry`.
    pub fn new(
        config: Arc<GatewayConfig>,
        registry: Arc<ProviderRegistry>,
        engine: ExecutionEngine,
    ) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    /// Run the whole batch for `request`.
    ///
    /// Errors only when nothing could be scheduled: no default provider is
    /// configured, or the single default provider fails to resolve.
    pub async fn run(&self, request: GenerationRequest) -> PromptfanResult<BatchResponse> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id, parallel = request.parallel);
        self.run_batch(request).instrument(span).await
    }

    async fn run_batch(&self, request: GenerationRequest) -> PromptfanResult<BatchResponse> {
        let start = Instant::now();
        let policy = ExecutionPolicy::from(&request);

        let response = match self.config.default.mode()? {
            ProviderMode::Single(name) => {
                let models = self.run_provider(&name, policy).await.map_err(|e| {
                    error!(provider = %name, error = %e, "Failed to resolve provider");
                    e
                })?;
                BatchResponse::Single(models)
            }
            ProviderMode::Multi(names) => {
                BatchResponse::Multi(self.fan_out(names, policy).await)
            }
        };

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            entries = response.entry_count(),
            "Batch complete"
        );
        Ok(response)
    }

    /// Run several providers concurrently and merge whatever resolves.
    async fn fan_out(
        &self,
        names: Vec<String>,
        policy: ExecutionPolicy,
    ) -> BTreeMap<String, ProviderResults> {
        let merged: Arc<Mutex<BTreeMap<String, ProviderResults>>> = Arc::default();
        let mut tasks = JoinSet::new();

        for name in names {
            let this = self.clone();
            let merged = merged.clone();
            tasks.spawn(
                async move {
                    match this.run_provider(&name, policy).await {
                        Ok(models) => {
                            merged.lock().insert(name, models);
                        }
                        Err(e) => {
                            error!(provider = %name, error = %e, "Provider skipped");
                        }
                    }
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Provider task failed");
            }
        }

        let results = std::mem::take(&mut *merged.lock());
        results
    }

    /// Resolve `name` and run each of its models in configured order.
    async fn run_provider(
        &self,
        name: &str,
        policy: ExecutionPolicy,
    ) -> PromptfanResult<ProviderResults> {
        let provider = self.registry.resolve(name, &self.config)?;
        let prompt: Arc<str> = Arc::from(self.config.provider(name)?.prompt.as_str());

        info!(
            provider = %name,
            models = provider.models().len(),
            attempts = self.engine.attempts(),
            policy = ?policy,
            "Running provider"
        );

        let mut results = ProviderResults::new();
        for model in provider.models() {
            let target = AttemptTarget::new(provider.clone(), model.clone(), prompt.clone());
            let entries = self.engine.run(policy, &target).await;
            results.insert(model.clone(), entries);
        }
        Ok(results)
    }
}
