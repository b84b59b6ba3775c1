// src/callbacks.rs

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AutoscalerError, AutoscalerResult};
use crate::types::{InstanceId, InstanceSample, ScaleEvent, WorkloadSelector};

/// Trait for discovering instances and reading their resource counters
///
/// Implement this to plug the autoscaler into a container runtime.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// List the instances currently belonging to the workload
    ///
    /// # Returns
    /// * `Ok(ids)` - Running instances (possibly empty)
    /// * `Err(error)` - The runtime could not be queried
    async fn list_instances(&self, selector: &WorkloadSelector) -> AutoscalerResult<Vec<InstanceId>>;

    /// Take a one-shot sample of an instance's cumulative counters
    ///
    /// A failure here only excludes this instance from the current tick.
    async fn sample_instance(&self, instance: &InstanceId) -> AutoscalerResult<InstanceSample>;
}

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout followed by captured stderr
    pub combined_output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status(&self) -> String {
        match self.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }

    /// Turn a non-zero exit into `AutoscalerError::CommandFailed`
    pub fn into_result(self, command: &str) -> AutoscalerResult<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(AutoscalerError::command_failed(
                command,
                self.status(),
                self.combined_output,
            ))
        }
    }
}

/// Trait for running the orchestration tool
///
/// Injected into the scale executor so tests can substitute a double.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and capture its output
    ///
    /// `Err` means the process could not be started at all; a started process
    /// that exits non-zero is reported through `CommandOutput::exit_code`.
    async fn run(&self, program: &str, args: &[String]) -> AutoscalerResult<CommandOutput>;
}

/// Trait for receiving scaling events
///
/// Useful for alerting or custom bookkeeping. Errors returned from observers
/// are logged and otherwise ignored.
#[async_trait]
pub trait ScalingObserver: Send + Sync {
    /// Called after a scale command succeeded, or was logged in dry-run mode
    async fn on_scaling_executed(&self, _event: &ScaleEvent) -> AutoscalerResult<()> {
        Ok(())
    }

    /// Called when a scale-up was wanted but the replica ceiling was reached
    async fn on_scaling_skipped(&self, _event: &ScaleEvent, _reason: &str) -> AutoscalerResult<()> {
        Ok(())
    }

    /// Called when the scale command failed
    async fn on_scaling_error(
        &self,
        _event: &ScaleEvent,
        _error: &AutoscalerError,
    ) -> AutoscalerResult<()> {
        Ok(())
    }
}

/// Combine all callbacks into a single struct for easier management
#[derive(Clone)]
pub struct AutoscalerCallbacks {
    pub metrics_source: Arc<dyn MetricsSource>,
    pub command_executor: Arc<dyn CommandExecutor>,
    pub observers: Vec<Arc<dyn ScalingObserver>>,
}

impl AutoscalerCallbacks {
    pub fn new(
        metrics_source: Arc<dyn MetricsSource>,
        command_executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            metrics_source,
            command_executor,
            observers: Vec::new(),
        }
    }

    /// Add an observer to receive scaling events
    pub fn add_observer(mut self, observer: Arc<dyn ScalingObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}
