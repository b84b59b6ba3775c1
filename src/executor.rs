// src/executor.rs

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{error, info};

use crate::callbacks::CommandExecutor;
use crate::compose::ComposeCommand;
use crate::error::AutoscalerResult;
use crate::state::ControllerState;
use crate::types::{Config, ScaleDirection, TickOutcome};

/// Replica count to request when scaling up, never above the ceiling
pub fn scale_up_target(config: &Config, current: usize) -> usize {
    current.saturating_add(config.scale_up_step).min(config.max_replicas)
}

/// Replica count to request when scaling down: always one fewer
///
/// Not clamped to `max_replicas`. A service scaled above the ceiling by hand
/// is walked back down one instance per qualifying cycle.
pub fn scale_down_target(current: usize) -> usize {
    current.saturating_sub(1)
}

/// Applies scale decisions through the compose command
pub struct ScaleExecutor {
    compose: ComposeCommand,
    executor: Arc<dyn CommandExecutor>,
}

impl ScaleExecutor {
    pub fn new(compose: ComposeCommand, executor: Arc<dyn CommandExecutor>) -> Self {
        Self { compose, executor }
    }

    /// Move the workload to `target` replicas
    ///
    /// Dry-run only logs. A successful live run starts the cooldown for
    /// `direction`; a failed one leaves `state` untouched so the next tick
    /// retries.
    pub async fn scale(
        &self,
        config: &Config,
        state: &mut ControllerState,
        direction: ScaleDirection,
        current: usize,
        target: usize,
    ) -> AutoscalerResult<TickOutcome> {
        if config.dry_run {
            info!(
                "[DRY RUN] Would scale [{}] {} {} to {} replicas.",
                config.project_name, config.service_name, direction, target
            );
            return Ok(TickOutcome::DryRun {
                direction,
                from: current,
                to: target,
            });
        }

        info!(
            "Scaling [{}] {} {} to {} replicas...",
            config.project_name, config.service_name, direction, target
        );

        if let Err(e) = self.run_scale(config, target).await {
            error!(
                "Error: Failed to scale [{}] {}. {}",
                config.project_name, config.service_name, e
            );
            return Err(e);
        }

        info!(
            "Successfully scaled [{}] {} {} to {} replicas.",
            config.project_name, config.service_name, direction, target
        );
        state.record_scale_action(direction, Instant::now());
        Ok(TickOutcome::Scaled {
            direction,
            from: current,
            to: target,
        })
    }

    async fn run_scale(&self, config: &Config, target: usize) -> AutoscalerResult<()> {
        let args = self
            .compose
            .scale_args(&config.project_name, &config.service_name, target);
        self.executor
            .run(self.compose.program(), &args)
            .await?
            .into_result(&self.compose.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{CommandOutput, MockCommandExecutor};
    use crate::error::AutoscalerError;

    fn config() -> Config {
        Config::builder()
            .project("test-project")
            .service("webapp")
            .replicas(1, 5)
            .scale_up_step(2)
            .build()
    }

    #[test]
    fn targets_are_clamped() {
        let cfg = config();
        assert_eq!(scale_up_target(&cfg, 1), 3);
        assert_eq!(scale_up_target(&cfg, 4), 5);
        assert_eq!(scale_up_target(&cfg, 5), 5);
        assert_eq!(scale_down_target(3), 2);
        // Above the ceiling after a manual scale: still one at a time
        assert_eq!(scale_down_target(8), 7);
    }

    #[tokio::test]
    async fn dry_run_never_invokes_the_command() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_run().never();

        let cfg = Config {
            dry_run: true,
            ..config()
        };
        let mut state = ControllerState::new(&cfg);
        let executor = ScaleExecutor::new(ComposeCommand::plugin(), Arc::new(mock));

        let outcome = executor
            .scale(&cfg, &mut state, ScaleDirection::Up, 1, 3)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TickOutcome::DryRun {
                direction: ScaleDirection::Up,
                from: 1,
                to: 3
            }
        );
        assert!(state.last_scale_event.is_none());
        assert!(state.last_scale_direction.is_none());
    }

    #[tokio::test]
    async fn failed_command_leaves_state_untouched() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_run().times(1).returning(|_, _| {
            Ok(CommandOutput {
                exit_code: Some(1),
                combined_output: "no such service: webapp".to_string(),
            })
        });

        let cfg = config();
        let mut state = ControllerState::new(&cfg);
        let executor = ScaleExecutor::new(ComposeCommand::plugin(), Arc::new(mock));

        let result = executor
            .scale(&cfg, &mut state, ScaleDirection::Down, 3, 2)
            .await;

        match result {
            Err(AutoscalerError::CommandFailed { output, .. }) => {
                assert_eq!(output, "no such service: webapp")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(state.last_scale_event.is_none());
    }

    #[tokio::test]
    async fn successful_command_starts_cooldown() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_run()
            .withf(|program: &str, args: &[String]| {
                program == "docker" && args.iter().any(|arg| arg == "webapp=3")
            })
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    exit_code: Some(0),
                    combined_output: String::new(),
                })
            });

        let cfg = config();
        let mut state = ControllerState::new(&cfg);
        let executor = ScaleExecutor::new(ComposeCommand::plugin(), Arc::new(mock));

        let outcome = executor
            .scale(&cfg, &mut state, ScaleDirection::Up, 1, 3)
            .await
            .unwrap();

        assert!(matches!(outcome, TickOutcome::Scaled { to: 3, .. }));
        assert_eq!(state.last_scale_direction, Some(ScaleDirection::Up));
        assert!(state.last_scale_event.is_some());
    }
}
