//! # compose-autoscaler
//!
//! A closed-loop autoscaler for one service of a Docker Compose project. On a
//! fixed poll interval it samples the CPU and memory utilization of the
//! service's containers, decides whether the service should grow or shrink,
//! and, subject to cooldowns and hysteresis, runs
//! `docker compose -p <project> up -d --scale <service>=<n> --no-recreate <service>`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      AutoscalerEngine                         │
//! │  tick ─► CooldownGate ─► StatsSampler ─► UtilizationAggregator│
//! │                              │                                │
//! │          ScaleExecutor ◄─ HysteresisCounter ◄─ DecisionEngine │
//! └──────────────┬───────────────────────────┬────────────────────┘
//!                │                           │
//!       ┌────────▼────────┐         ┌────────▼────────┐
//!       │ CommandExecutor │         │  MetricsSource  │
//!       │ (docker compose)│         │ (Docker engine) │
//!       └─────────────────┘         └─────────────────┘
//! ```
//!
//! Scale-up acts on the first qualifying tick and adds `scale_up_step`
//! instances; scale-down needs `scale_down_checks` consecutive qualifying ticks
//! and removes exactly one. In `any` mode either metric can trigger a scale-up
//! but both must be low for a scale-down.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use compose_autoscaler::{
//!     AutoscalerCallbacks, AutoscalerEngine, AutoscalerResult, ComposeCommand, Config,
//!     InstanceId, InstanceSample, MetricsSource, ProcessCommandExecutor, ScaleMetric,
//!     WorkloadSelector,
//! };
//! use std::sync::Arc;
//!
//! struct MyMetricsSource;
//! #[async_trait::async_trait]
//! impl MetricsSource for MyMetricsSource {
//!     async fn list_instances(&self, _selector: &WorkloadSelector) -> AutoscalerResult<Vec<InstanceId>> {
//!         Ok(vec![])
//!     }
//!     async fn sample_instance(&self, _instance: &InstanceId) -> AutoscalerResult<InstanceSample> {
//!         Ok(InstanceSample::default())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> AutoscalerResult<()> {
//!     let config = Config::builder()
//!         .project("shop")
//!         .service("web")
//!         .replicas(1, 5)
//!         .metric(ScaleMetric::Any)
//!         .build();
//!
//!     let callbacks = AutoscalerCallbacks::new(
//!         Arc::new(MyMetricsSource),
//!         Arc::new(ProcessCommandExecutor),
//!     );
//!     let engine = AutoscalerEngine::new(config, ComposeCommand::plugin(), callbacks);
//!     let handle = engine.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         let _ = handle.shutdown().await;
//!     });
//!
//!     engine.start().await
//! }
//! ```

pub mod error;
pub mod utils;
pub mod types;
pub mod state;
pub mod engine;
pub mod policies;
pub mod sampler;
pub mod executor;
pub mod compose;
pub mod callbacks;
#[cfg(feature = "docker")]
pub mod docker;


// Re-export common types for convenience
pub use types::{
    Config, ConfigBuilder, Decision, InstanceId, InstanceSample, Percent, ScaleDirection,
    ScaleEvent, ScaleMetric, TickOutcome, Utilization, WorkloadSelector,
};

pub use error::{AutoscalerError, AutoscalerResult};

pub use callbacks::{
    AutoscalerCallbacks, CommandExecutor, CommandOutput, MetricsSource, ScalingObserver,
};

pub use compose::{ComposeCommand, ProcessCommandExecutor};

pub use engine::{AutoscalerEngine, AutoscalerHandle, Controller, EngineStatus};

pub use sampler::{Sampling, StatsSampler, UtilizationAggregator};

pub use state::{ControllerState, HysteresisCounter};

pub use executor::ScaleExecutor;

#[cfg(feature = "docker")]
pub use docker::DockerMetricsSource;
