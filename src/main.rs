//! compose-autoscaler: scales one Docker Compose service on container
//! CPU/memory utilization.
//!
//! # Usage
//!
//! ```text
//! compose-autoscaler --project-name shop --service web --min 1 --max 6 --metric any
//! compose-autoscaler --config autoscaler.toml --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use humantime_serde::re::humantime::parse_duration;
use tracing::{error, info};

use compose_autoscaler::{
    AutoscalerCallbacks, AutoscalerEngine, AutoscalerHandle, AutoscalerResult, ComposeCommand,
    Config, DockerMetricsSource, ProcessCommandExecutor, ScaleMetric,
};

#[derive(Parser, Debug)]
#[command(
    name = "compose-autoscaler",
    version,
    about = "Autoscale a Docker Compose service on CPU and memory utilization"
)]
struct Cli {
    /// TOML configuration file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Docker Compose project name to operate on
    #[arg(long)]
    project_name: Option<String>,

    /// Name of the service in docker-compose.yml to scale
    #[arg(long)]
    service: Option<String>,

    /// Minimum number of replicas
    #[arg(long)]
    min: Option<usize>,

    /// Maximum number of replicas
    #[arg(long)]
    max: Option<usize>,

    /// Metric to scale on
    #[arg(long, value_enum)]
    metric: Option<ScaleMetric>,

    /// CPU percentage threshold to scale up
    #[arg(long)]
    cpu_up: Option<f64>,

    /// CPU percentage threshold to scale down
    #[arg(long)]
    cpu_down: Option<f64>,

    /// Memory percentage threshold to scale up
    #[arg(long)]
    mem_up: Option<f64>,

    /// Memory percentage threshold to scale down
    #[arg(long)]
    mem_down: Option<f64>,

    /// Cooldown after scaling up, e.g. "20s"
    #[arg(long, value_parser = parse_duration)]
    cooldown_up: Option<Duration>,

    /// Cooldown after scaling down
    #[arg(long, value_parser = parse_duration)]
    cooldown_down: Option<Duration>,

    /// Number of instances to add on scale-up
    #[arg(long)]
    scale_up_step: Option<usize>,

    /// Consecutive checks required before scaling down
    #[arg(long)]
    scale_down_checks: Option<u32>,

    /// Interval between metric checks
    #[arg(long, value_parser = parse_duration)]
    poll: Option<Duration>,

    /// Interval between heartbeat status lines
    #[arg(long, value_parser = parse_duration)]
    heartbeat: Option<Duration>,

    /// Wait this long on startup before the first check
    #[arg(long, value_parser = parse_duration)]
    initial_grace_period: Option<Duration>,

    /// Log scaling actions without executing them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Layer the command-line flags over the file (or default) configuration
    fn into_config(self) -> AutoscalerResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(project) = self.project_name {
            config.project_name = project;
        }
        if let Some(service) = self.service {
            config.service_name = service;
        }
        if let Some(min) = self.min {
            config.min_replicas = min;
        }
        if let Some(max) = self.max {
            config.max_replicas = max;
        }
        if let Some(metric) = self.metric {
            config.scale_metric = metric;
        }
        if let Some(v) = self.cpu_up {
            config.cpu_upper_threshold = v;
        }
        if let Some(v) = self.cpu_down {
            config.cpu_lower_threshold = v;
        }
        if let Some(v) = self.mem_up {
            config.mem_upper_threshold = v;
        }
        if let Some(v) = self.mem_down {
            config.mem_lower_threshold = v;
        }
        if let Some(d) = self.cooldown_up {
            config.scale_up_cooldown = d;
        }
        if let Some(d) = self.cooldown_down {
            config.scale_down_cooldown = d;
        }
        if let Some(step) = self.scale_up_step {
            config.scale_up_step = step;
        }
        if let Some(checks) = self.scale_down_checks {
            config.scale_down_checks = checks;
        }
        if let Some(d) = self.poll {
            config.poll_interval = d;
        }
        if let Some(d) = self.heartbeat {
            config.log_heartbeat_interval = d;
        }
        if let Some(d) = self.initial_grace_period {
            config.initial_grace_period = d;
        }
        if self.dry_run {
            config.dry_run = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AutoscalerResult<()> {
    let config = cli.into_config()?;

    let process = ProcessCommandExecutor;
    let compose = ComposeCommand::discover(&process).await?;
    info!("Using compose command: {}", compose);

    compose
        .validate_service(&process, &config.project_name, &config.service_name)
        .await?;

    let metrics = DockerMetricsSource::connect()?;
    let callbacks = AutoscalerCallbacks::new(Arc::new(metrics), Arc::new(ProcessCommandExecutor));
    let engine = AutoscalerEngine::new(config, compose, callbacks);

    tokio::spawn(forward_shutdown(engine.handle()));

    engine.start().await
}

/// Ask the engine to stop on Ctrl-C or SIGTERM
async fn forward_shutdown(handle: AutoscalerHandle) {
    wait_for_signal().await;
    if let Err(e) = handle.shutdown().await {
        error!("Failed to request shutdown: {}", e);
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
