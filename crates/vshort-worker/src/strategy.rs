//! Ordered fallback chains.
//!
//! A chain is a list of named strategies, each with its own time budget.
//! The runner tries them in order and returns the first success.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

type StrategyFn<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, WorkerResult<T>> + Send + 'a>;

/// One named way of producing a `T`.
pub struct Strategy<'a, T> {
    pub name: &'static str,
    pub timeout: Duration,
    run: StrategyFn<'a, T>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new<F>(name: &'static str, timeout: Duration, run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, WorkerResult<T>> + Send + 'a,
    {
        Self {
            name,
            timeout,
            run: Box::new(run),
        }
    }
}

/// The winning strategy plus what failed before it.
#[derive(Debug)]
pub struct StrategyOutcome<T> {
    pub name: &'static str,
    pub value: T,
    /// `"<name>: <error>"` for every strategy tried before the winner
    pub failures: Vec<String>,
}

impl<T> StrategyOutcome<T> {
    /// Whether an earlier strategy had to be abandoned.
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Evaluates strategies in order.
#[derive(Debug, Clone)]
pub struct StrategyRunner {
    chain: &'static str,
}

impl StrategyRunner {
    pub fn new(chain: &'static str) -> Self {
        Self { chain }
    }

    /// Run strategies in order until one succeeds.
    ///
    /// A strategy that exceeds its timeout is dropped and counts as failed.
    pub async fn run<'a, T>(
        &self,
        strategies: Vec<Strategy<'a, T>>,
    ) -> WorkerResult<StrategyOutcome<T>> {
        let mut failures = Vec::new();

        for strategy in strategies {
            let name = strategy.name;
            let secs = strategy.timeout.as_secs();
            info!(chain = self.chain, strategy = name, timeout_secs = secs, "Trying strategy");

            let result = match tokio::time::timeout(strategy.timeout, (strategy.run)()).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::timeout(format!("{} {}", self.chain, name), secs)),
            };

            match result {
                Ok(value) => {
                    if !failures.is_empty() {
                        info!(chain = self.chain, strategy = name, "Fallback strategy succeeded");
                    }
                    return Ok(StrategyOutcome {
                        name,
                        value,
                        failures,
                    });
                }
                Err(e) => {
                    warn!(chain = self.chain, strategy = name, "Strategy failed: {}", e);
                    metrics::record_fallback(self.chain, name);
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        Err(WorkerError::AllStrategiesFailed { failures })
    }
}
