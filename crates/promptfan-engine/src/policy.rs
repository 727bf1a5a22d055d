//! Parallel and sequential scheduling of a model's attempts.

use crate::executor::{AttemptExecutor, AttemptTarget};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use promptfan_core::{
    DelayConfig, ExecutionConfig, GenerationRequest, ModelResults, PromptfanError,
};
use promptfan_sink::LogSink;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, Instrument};

/// Injectable sleep used between sequential attempts.
pub type SleepFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// How a model's K attempts are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// All attempts at once; entries arrive in completion order.
    Parallel,
    /// One attempt at a time in index order, with a delay in between.
    Sequential,
}

impl From<&GenerationRequest> for ExecutionPolicy {
    fn from(request: &GenerationRequest) -> Self {
        if request.parallel {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }
}

/// Pause after each sequential attempt except the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    /// Uniform in `[min, max)`; exactly `min` when the window is empty.
    Jitter { min: Duration, max: Duration },
    /// `base + step * n` after the n-th completed attempt.
    Linear { base: Duration, step: Duration },
    /// No pause.
    None,
}

impl From<DelayConfig> for DelayPolicy {
    fn from(config: DelayConfig) -> Self {
        match config {
            DelayConfig::Jitter { min_ms, max_ms } => Self::Jitter {
                min: Duration::from_millis(min_ms),
                max: Duration::from_millis(max_ms),
            },
            DelayConfig::Linear { base_ms, step_ms } => Self::Linear {
                base: Duration::from_millis(base_ms),
                step: Duration::from_millis(step_ms),
            },
            DelayConfig::None => Self::None,
        }
    }
}

impl DelayPolicy {
    /// Delay to wait after zero-based attempt `attempt` has finished.
    pub fn delay_after<R: Rng + ?Sized>(&self, attempt: usize, rng: &mut R) -> Duration {
        match *self {
            Self::Jitter { min, max } => {
                let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
                if lo >= hi {
                    min
                } else {
                    Duration::from_millis(rng.gen_range(lo..hi))
                }
            }
            Self::Linear { base, step } => {
                let n = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
                base.saturating_add(step.saturating_mul(n))
            }
            Self::None => Duration::ZERO,
        }
    }
}

/// Repeats attempts for one model under an [`ExecutionPolicy`].
///
/// Both policies run exactly `attempts` executor calls to completion before
/// returning, and the returned list always has exactly `attempts` entries.
#[derive(Clone)]
pub struct ExecutionEngine {
    attempts: usize,
    delay: DelayPolicy,
    seed: Option<u64>,
    executor: AttemptExecutor,
    sleep: SleepFn,
}

impl ExecutionEngine {
    /// Engine for `config`, writing one record per attempt to `sink`.
    ///
    /// Sleeps with `tokio::time::sleep` until replaced by [`ExecutionEngine::with_sleep`].
    pub fn new(config: &ExecutionConfig, sink: Arc<dyn LogSink>) -> Self {
        let timeout = config.attempt_timeout_secs.map(Duration::from_secs);
        Self {
            attempts: config.attempts.max(1),
            delay: config.delay.into(),
            seed: config.seed,
            executor: AttemptExecutor::new(sink, timeout),
            sleep: Arc::new(|d: Duration| tokio::time::sleep(d).boxed()),
        }
    }

    /// Replace the sleep between sequential attempts.
    pub fn with_sleep<F>(mut self, sleep: F) -> Self
    where
        F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.sleep = Arc::new(sleep);
        self
    }

    /// Attempts per model (K).
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Pause applied between sequential attempts.
    pub fn delay(&self) -> DelayPolicy {
        self.delay
    }

    /// Run all K attempts for `target` and return exactly K entries.
    pub async fn run(&self, policy: ExecutionPolicy, target: &AttemptTarget) -> ModelResults {
        match policy {
            ExecutionPolicy::Parallel => self.run_parallel(target).await,
            ExecutionPolicy::Sequential => self.run_sequential(target).await,
        }
    }

    /// Spawn every attempt and collect entries as they complete.
    ///
    /// Each task owns its own result; the join loop below is the only place
    /// entries are appended.
    async fn run_parallel(&self, target: &AttemptTarget) -> ModelResults {
        let mut tasks = JoinSet::new();
        for attempt in 0..self.attempts {
            let executor = self.executor.clone();
            let target = target.clone();
            tasks.spawn(
                async move { executor.execute(&target, attempt).await.entry() }
                    .in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(self.attempts);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => {
                    error!(model = %target.model, error = %e, "Attempt task failed");
                    results.push(
                        PromptfanError::Generation(format!("attempt task failed: {e}")).as_entry(),
                    );
                }
            }
        }
        results
    }

    async fn run_sequential(&self, target: &AttemptTarget) -> ModelResults {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut results = Vec::with_capacity(self.attempts);
        for attempt in 0..self.attempts {
            results.push(self.executor.execute(target, attempt).await.entry());

            if attempt + 1 < self.attempts {
                let delay = self.delay.delay_after(attempt, &mut rng);
                if !delay.is_zero() {
                    debug!(
                        model = %target.model,
                        delay_ms = delay.as_millis() as u64,
                        "Sleeping before next attempt"
                    );
                    (self.sleep)(delay).await;
                }
            }
        }
        results
    }
}
