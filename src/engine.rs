// src/engine.rs

use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::callbacks::{AutoscalerCallbacks, ScalingObserver};
use crate::compose::ComposeCommand;
use crate::error::{AutoscalerError, AutoscalerResult};
use crate::executor::{scale_down_target, scale_up_target, ScaleExecutor};
use crate::policies;
use crate::sampler::{Sampling, StatsSampler, UtilizationAggregator};
use crate::state::{ControllerState, COOLDOWN_LOG_THROTTLE};
use crate::types::{Config, ScaleDirection, ScaleEvent, TickOutcome, Utilization};
use crate::utils::{format_remaining, heartbeat_line};

/// Commands that can be sent to the autoscaler engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Get current engine status
    GetStatus {
        response: tokio::sync::oneshot::Sender<EngineStatus>,
    },
    /// Stop after the current tick
    Shutdown,
}

/// Status information about the autoscaler engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub is_running: bool,
    pub ticks_evaluated: u64,
    pub scale_events: u64,
    pub last_scale_direction: Option<ScaleDirection>,
    pub consecutive_scale_down_checks: u32,
    pub last_observed_replicas: Option<usize>,
}

/// One tick of the control loop: gate, sample, decide, act
///
/// Owns the controller state outright; nothing else reads or writes it.
pub struct Controller {
    config: Config,
    state: ControllerState,
    sampler: StatsSampler,
    aggregator: UtilizationAggregator,
    executor: ScaleExecutor,
    observers: Vec<Arc<dyn ScalingObserver>>,
    ticks_evaluated: u64,
    scale_events: u64,
    last_observed_replicas: Option<usize>,
}

impl Controller {
    pub fn new(config: Config, compose: ComposeCommand, callbacks: AutoscalerCallbacks) -> Self {
        let state = ControllerState::new(&config);
        let sampler = StatsSampler::new(callbacks.metrics_source, config.selector());
        let executor = ScaleExecutor::new(compose, callbacks.command_executor);

        Self {
            config,
            state,
            sampler,
            aggregator: UtilizationAggregator::new(),
            executor,
            observers: callbacks.observers,
            ticks_evaluated: 0,
            scale_events: 0,
            last_observed_replicas: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn status(&self, is_running: bool) -> EngineStatus {
        EngineStatus {
            is_running,
            ticks_evaluated: self.ticks_evaluated,
            scale_events: self.scale_events,
            last_scale_direction: self.state.last_scale_direction,
            consecutive_scale_down_checks: self.state.scale_down_checks.count(),
            last_observed_replicas: self.last_observed_replicas,
        }
    }

    /// Run one full tick
    pub async fn evaluate_and_scale(&mut self) -> TickOutcome {
        let now = Instant::now();

        if let Some(remaining) = self.state.cooldown_remaining(&self.config, now) {
            if self.state.log_due(now, COOLDOWN_LOG_THROTTLE) {
                if let Some(direction) = self.state.last_scale_direction {
                    info!(
                        "[{}] Scale-{} cooldown active ({} left). Waiting...",
                        self.config.project_name,
                        direction,
                        format_remaining(remaining)
                    );
                }
                self.state.last_log = Some(now);
            }
            return TickOutcome::CoolingDown;
        }

        self.ticks_evaluated += 1;

        let sampling = match self.sampler.sample().await {
            Ok(sampling) => sampling,
            Err(e) => {
                error!(
                    "[{}] Error getting containers for service '{}': {}",
                    self.config.project_name, self.config.service_name, e
                );
                return TickOutcome::Skipped;
            }
        };

        let current = sampling.replicas();
        self.last_observed_replicas = Some(current);

        let utilization = match &sampling {
            Sampling::NoInstances => {
                self.aggregator.reset();
                Utilization::zero()
            }
            Sampling::Instances { listed, samples } => {
                match self.aggregator.aggregate(listed, samples) {
                    Ok(utilization) => utilization,
                    Err(e) => {
                        warn!(
                            "Warning: Failed to get stats for service [{}] '{}'. Assuming 0% usage. Error: {}",
                            self.config.project_name, self.config.service_name, e
                        );
                        Utilization::zero()
                    }
                }
            }
        };

        self.log_heartbeat(current, &utilization, now);

        let decision = policies::evaluate(&self.config, &utilization);

        if decision.should_scale_up {
            self.state.scale_down_checks.reset();
            let target = scale_up_target(&self.config, current);
            if target > current {
                info!(
                    "[{}] Scale up triggered by: {}. Scaling up.",
                    self.config.project_name, decision.reason
                );
                self.apply(ScaleDirection::Up, current, target, decision.reason)
                    .await
            } else {
                info!(
                    "[{}] Scale up triggered by: {}. Cannot scale further, already at max replicas ({}).",
                    self.config.project_name, decision.reason, self.config.max_replicas
                );
                let event = self.event(ScaleDirection::Up, current, current, decision.reason);
                for observer in &self.observers {
                    if let Err(e) = observer.on_scaling_skipped(&event, "already at max replicas").await {
                        warn!("Observer error on scaling skipped: {}", e);
                    }
                }
                TickOutcome::AtCeiling
            }
        } else if decision.should_scale_down && current > self.config.min_replicas {
            let reached = self.state.scale_down_checks.record();
            let checks = self.state.scale_down_checks.count();
            let required = self.state.scale_down_checks.required();
            info!(
                "[{}] Scale down condition met ({}/{}).",
                self.config.project_name, checks, required
            );

            if reached {
                info!(
                    "[{}] Scaling down: threshold met for {} consecutive checks.",
                    self.config.project_name, checks
                );
                let reason = format!("below lower thresholds for {} consecutive checks", checks);
                let outcome = self
                    .apply(ScaleDirection::Down, current, scale_down_target(current), reason)
                    .await;
                self.state.scale_down_checks.reset();
                outcome
            } else {
                TickOutcome::ScaleDownPending { checks, required }
            }
        } else {
            self.state.scale_down_checks.reset();
            TickOutcome::Steady
        }
    }

    async fn apply(
        &mut self,
        direction: ScaleDirection,
        current: usize,
        target: usize,
        reason: String,
    ) -> TickOutcome {
        let result = self
            .executor
            .scale(&self.config, &mut self.state, direction, current, target)
            .await;
        let event = self.event(direction, current, target, reason);

        match result {
            Ok(outcome) => {
                if matches!(outcome, TickOutcome::Scaled { .. }) {
                    self.scale_events += 1;
                }
                for observer in &self.observers {
                    if let Err(e) = observer.on_scaling_executed(&event).await {
                        warn!("Observer error on scaling executed: {}", e);
                    }
                }
                outcome
            }
            Err(error) => {
                for observer in &self.observers {
                    if let Err(e) = observer.on_scaling_error(&event, &error).await {
                        warn!("Observer error on scaling error: {}", e);
                    }
                }
                TickOutcome::ScaleFailed {
                    direction,
                    from: current,
                    to: target,
                }
            }
        }
    }

    fn event(&self, direction: ScaleDirection, from: usize, to: usize, reason: String) -> ScaleEvent {
        ScaleEvent {
            workload: self.config.workload(),
            direction,
            from_replicas: from,
            to_replicas: to,
            reason,
            dry_run: self.config.dry_run,
        }
    }

    fn log_heartbeat(&mut self, replicas: usize, utilization: &Utilization, now: Instant) {
        let changed = self
            .state
            .heartbeat_changed(replicas, utilization.cpu, utilization.mem);
        if changed || self.state.log_due(now, self.config.log_heartbeat_interval) {
            info!("{}", heartbeat_line(&self.config, replicas, utilization));
            self.state
                .record_heartbeat(replicas, utilization.cpu, utilization.mem, now);
        }
    }
}

/// The autoscaler control loop
pub struct AutoscalerEngine {
    controller: Controller,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    command_rx: Option<mpsc::UnboundedReceiver<EngineCommand>>,
}

impl AutoscalerEngine {
    /// Create a new autoscaler engine
    pub fn new(config: Config, compose: ComposeCommand, callbacks: AutoscalerCallbacks) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Self {
            controller: Controller::new(config, compose, callbacks),
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Get a handle to send commands to the engine
    pub fn handle(&self) -> AutoscalerHandle {
        AutoscalerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Run the control loop until shutdown is requested (consumes self)
    ///
    /// Commands are only handled between ticks, so a tick that has started,
    /// including any scale command it dispatched, always completes.
    pub async fn start(mut self) -> AutoscalerResult<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| AutoscalerError::engine_not_running("Engine already started"))?;

        let config = self.controller.config().clone();
        config.validate()?;

        info!("Starting auto-scaler for service: '{}'", config.service_name);
        if config.dry_run {
            info!("--- DRY RUN MODE ENABLED --- No actual scaling will be performed.");
        }
        info!(
            "[{}] Configuration: Metric={} Min={} Max={} Up-Step={} Poll={:?}",
            config.project_name,
            config.scale_metric,
            config.min_replicas,
            config.max_replicas,
            config.scale_up_step,
            config.poll_interval
        );

        if !config.initial_grace_period.is_zero() {
            info!(
                "[{}] Initial grace period active. Waiting for {:?} before starting monitoring...",
                config.project_name, config.initial_grace_period
            );
            let grace = tokio::time::sleep(config.initial_grace_period);
            tokio::pin!(grace);

            loop {
                tokio::select! {
                    _ = &mut grace => break,
                    command = command_rx.recv() => {
                        if self.handle_command(command).is_break() {
                            info!("Auto-scaler stopped during initial grace period");
                            return Ok(());
                        }
                    }
                }
            }
        }

        let mut ticker = interval_at(Instant::now() + config.poll_interval, config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let outcome = self.controller.evaluate_and_scale().await;
                    debug!("[{}] Tick finished: {:?}", config.project_name, outcome);
                }
            }
        }

        info!("Shutdown signal received. Exiting auto-scaler.");
        Ok(())
    }

    /// Handle incoming commands
    fn handle_command(&self, command: Option<EngineCommand>) -> ControlFlow<()> {
        match command {
            Some(EngineCommand::GetStatus { response }) => {
                let _ = response.send(self.controller.status(true)); // Ignore send errors
                ControlFlow::Continue(())
            }
            Some(EngineCommand::Shutdown) => ControlFlow::Break(()),
            None => {
                info!("Command channel closed, shutting down engine");
                ControlFlow::Break(())
            }
        }
    }
}

/// Handle for interacting with a running autoscaler engine
#[derive(Clone)]
pub struct AutoscalerHandle {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl AutoscalerHandle {
    /// Get current engine status
    pub async fn get_status(&self) -> AutoscalerResult<EngineStatus> {
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        self.command_tx.send(EngineCommand::GetStatus {
            response: response_tx,
        })?;
        Ok(response_rx.await?)
    }

    /// Ask the engine to stop once the current tick, if any, has finished
    pub async fn shutdown(&self) -> AutoscalerResult<()> {
        self.command_tx.send(EngineCommand::Shutdown)?;
        Ok(())
    }
}
