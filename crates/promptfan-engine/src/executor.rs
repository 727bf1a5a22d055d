//! Single-attempt execution: call, time, log.

use chrono::Utc;
use futures_util::FutureExt;
use promptfan_core::{AttemptOutcome, AttemptResult, LogRecord, PromptfanError};
use promptfan_providers::Provider;
use promptfan_sink::LogSink;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The (provider, model, prompt) triple an attempt runs against.
#[derive(Clone)]
pub struct AttemptTarget {
    /// Backend that serves the call.
    pub provider: Arc<dyn Provider>,
    /// Model identifier passed to [`Provider::generate`].
    pub model: String,
    /// Prompt shared by every attempt of the batch.
    pub prompt: Arc<str>,
}

impl AttemptTarget {
    /// Bundle a provider, one of its models and the prompt.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, prompt: impl Into<Arc<str>>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// Runs one generation attempt, times it and writes its log record.
#[derive(Clone)]
pub struct AttemptExecutor {
    sink: Arc<dyn LogSink>,
    timeout: Option<Duration>,
}

impl AttemptExecutor {
    /// `timeout` bounds each provider call; `None` waits indefinitely.
    pub fn new(sink: Arc<dyn LogSink>, timeout: Option<Duration>) -> Self {
        Self { sink, timeout }
    }

    /// Execute attempt number `attempt` (zero-based) against `target`.
    ///
    /// Never fails: a provider error, a provider panic, an empty answer or an
    /// expired deadline becomes a [`AttemptOutcome::Failed`]. The sink write
    /// happens before returning, and a sink error is only logged.
    pub async fn execute(&self, target: &AttemptTarget, attempt: usize) -> AttemptResult {
        let provider_name = target.provider.name().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        // A panicking backend is one failed attempt, not a failed batch.
        let call = AssertUnwindSafe(target.provider.generate(&target.prompt, &target.model))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|payload| {
                    Err(PromptfanError::Generation(format!(
                        "provider panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                })
            });

        let generated = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(PromptfanError::Generation(format!(
                    "attempt timed out after {}s",
                    limit.as_secs()
                )))
            }),
            None => call.await,
        };
        let elapsed = start.elapsed();

        let outcome = match generated {
            Ok(text) if !text.is_empty() => AttemptOutcome::Text(text),
            Ok(_) => AttemptOutcome::Failed("no content generated".into()),
            Err(e) => {
                warn!(
                    provider = %provider_name,
                    model = %target.model,
                    attempt = attempt + 1,
                    error = %e,
                    "Generation failed"
                );
                AttemptOutcome::Failed(e.to_string())
            }
        };

        let result = AttemptResult {
            provider: provider_name,
            model: target.model.clone(),
            attempt,
            started_at,
            duration_seconds: elapsed.as_secs_f64(),
            outcome,
        };

        let record = LogRecord::from_attempt(&result, &target.prompt);
        if let Err(e) = self.sink.insert(&record).await {
            warn!(
                sink = %self.sink.name(),
                provider = %result.provider,
                model = %result.model,
                attempt = attempt + 1,
                error = %e,
                "Failed to write log record"
            );
        }

        info!(
            provider = %result.provider,
            model = %result.model,
            attempt = attempt + 1,
            duration_ms = elapsed.as_millis() as u64,
            ok = result.is_success(),
            "Attempt finished"
        );

        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
