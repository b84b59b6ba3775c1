// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutoscalerError, AutoscalerResult};

/// A percentage in the range 0.0..=100.0 (CPU may exceed 100 on multi-core hosts)
pub type Percent = f64;

/// Identity of one running instance (a container id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines, like `docker ps` prints it
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Selects the instances belonging to one compose service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSelector {
    pub project: String,
    pub service: String,
}

/// Raw cumulative counters for one instance at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceSample {
    /// Cumulative CPU time consumed by the instance
    pub cpu_total_usage: u64,
    /// Cumulative CPU time of the host
    pub system_cpu_usage: u64,
    /// Number of CPUs available to the instance
    pub online_cpus: u32,
    /// Current memory usage in bytes
    pub memory_usage: u64,
    /// Memory limit in bytes
    pub memory_limit: u64,
}

/// Averaged utilization across the workload's instances
///
/// A metric is `None` when no instance produced a usable reading for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    pub cpu: Option<Percent>,
    pub mem: Option<Percent>,
}

impl Utilization {
    pub fn new(cpu: Percent, mem: Percent) -> Self {
        Self {
            cpu: Some(cpu),
            mem: Some(mem),
        }
    }

    /// The fail-soft reading used when sampling produced nothing at all
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Which utilization signal(s) drive scaling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ScaleMetric {
    #[default]
    Cpu,
    Mem,
    Any,
}

impl ScaleMetric {
    pub fn uses_cpu(self) -> bool {
        matches!(self, ScaleMetric::Cpu | ScaleMetric::Any)
    }

    pub fn uses_mem(self) -> bool {
        matches!(self, ScaleMetric::Mem | ScaleMetric::Any)
    }
}

impl fmt::Display for ScaleMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScaleMetric::Cpu => "cpu",
            ScaleMetric::Mem => "mem",
            ScaleMetric::Any => "any",
        };
        f.write_str(name)
    }
}

impl FromStr for ScaleMetric {
    type Err = AutoscalerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(ScaleMetric::Cpu),
            "mem" => Ok(ScaleMetric::Mem),
            "any" => Ok(ScaleMetric::Any),
            other => Err(AutoscalerError::config(format!(
                "invalid metric '{}': must be 'cpu', 'mem', or 'any'",
                other
            ))),
        }
    }
}

/// Direction to scale a workload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    /// Scale up (add instances)
    Up,
    /// Scale down (remove instances)
    Down,
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleDirection::Up => f.write_str("up"),
            ScaleDirection::Down => f.write_str("down"),
        }
    }
}

/// Verdict of the decision engine for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub should_scale_up: bool,
    pub should_scale_down: bool,
    /// Human-readable justification for a scale-up
    pub reason: String,
}

/// A scale action that was executed, dry-run, or attempted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleEvent {
    /// `project/service`
    pub workload: String,
    pub direction: ScaleDirection,
    pub from_replicas: usize,
    pub to_replicas: usize,
    pub reason: String,
    pub dry_run: bool,
}

/// What a single control loop tick ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Suppressed by the cooldown gate, nothing was sampled
    CoolingDown,
    /// Instances could not be listed, the tick was abandoned
    Skipped,
    /// Evaluated, no scaling condition held
    Steady,
    /// Scale-down condition held but the streak is not long enough yet
    ScaleDownPending { checks: u32, required: u32 },
    /// Scale-up condition held but the workload is already at its ceiling
    AtCeiling,
    /// The scale command succeeded
    Scaled {
        direction: ScaleDirection,
        from: usize,
        to: usize,
    },
    /// Dry-run: the scale command was only logged
    DryRun {
        direction: ScaleDirection,
        from: usize,
        to: usize,
    },
    /// The scale command failed, state was left untouched
    ScaleFailed {
        direction: ScaleDirection,
        from: usize,
        to: usize,
    },
}

/// Autoscaler configuration, built once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compose project to operate on
    pub project_name: String,
    /// Service within the project to scale
    pub service_name: String,
    pub min_replicas: usize,
    pub max_replicas: usize,
    pub scale_metric: ScaleMetric,
    pub cpu_upper_threshold: Percent,
    pub cpu_lower_threshold: Percent,
    pub mem_upper_threshold: Percent,
    pub mem_lower_threshold: Percent,
    #[serde(with = "humantime_serde")]
    pub scale_up_cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub scale_down_cooldown: Duration,
    /// Instances added per scale-up
    pub scale_up_step: usize,
    /// Consecutive qualifying ticks required before a scale-down
    pub scale_down_checks: u32,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub log_heartbeat_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub initial_grace_period: Duration,
    /// Log scaling actions without executing them
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            service_name: String::new(),
            min_replicas: 1,
            max_replicas: 5,
            scale_metric: ScaleMetric::Cpu,
            cpu_upper_threshold: 70.0,
            cpu_lower_threshold: 20.0,
            mem_upper_threshold: 80.0,
            mem_lower_threshold: 30.0,
            scale_up_cooldown: Duration::from_secs(20),
            scale_down_cooldown: Duration::from_secs(20),
            scale_up_step: 2,
            scale_down_checks: 2,
            poll_interval: Duration::from_secs(15),
            log_heartbeat_interval: Duration::from_secs(30),
            initial_grace_period: Duration::ZERO,
            dry_run: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn selector(&self) -> WorkloadSelector {
        WorkloadSelector {
            project: self.project_name.clone(),
            service: self.service_name.clone(),
        }
    }

    pub fn workload(&self) -> String {
        format!("{}/{}", self.project_name, self.service_name)
    }

    /// Cooldown that applies after a successful scale in `direction`
    pub fn cooldown_for(&self, direction: Option<ScaleDirection>) -> Duration {
        match direction {
            Some(ScaleDirection::Up) => self.scale_up_cooldown,
            Some(ScaleDirection::Down) => self.scale_down_cooldown,
            None => Duration::ZERO,
        }
    }

    /// Check the invariants the control loop relies on
    pub fn validate(&self) -> AutoscalerResult<()> {
        if self.project_name.trim().is_empty() {
            return Err(AutoscalerError::config("project name is required"));
        }
        if self.service_name.trim().is_empty() {
            return Err(AutoscalerError::config("service name is required"));
        }
        if self.min_replicas > self.max_replicas {
            return Err(AutoscalerError::config(format!(
                "min replicas ({}) must not exceed max replicas ({})",
                self.min_replicas, self.max_replicas
            )));
        }
        if self.scale_up_step == 0 {
            return Err(AutoscalerError::config("scale-up step must be at least 1"));
        }
        if self.scale_down_checks == 0 {
            return Err(AutoscalerError::config("scale-down checks must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(AutoscalerError::config("poll interval must be greater than zero"));
        }
        if self.cpu_lower_threshold > self.cpu_upper_threshold {
            return Err(AutoscalerError::config(format!(
                "cpu lower threshold ({}) must not exceed cpu upper threshold ({})",
                self.cpu_lower_threshold, self.cpu_upper_threshold
            )));
        }
        if self.mem_lower_threshold > self.mem_upper_threshold {
            return Err(AutoscalerError::config(format!(
                "memory lower threshold ({}) must not exceed memory upper threshold ({})",
                self.mem_lower_threshold, self.mem_upper_threshold
            )));
        }
        Ok(())
    }

    /// Parse a configuration from TOML text
    #[cfg(feature = "config-toml")]
    pub fn from_toml_str(content: &str) -> AutoscalerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration from a TOML file
    #[cfg(feature = "config-toml")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> AutoscalerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Builder for creating autoscaler configurations easily
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, name: &str) -> Self {
        self.config.project_name = name.to_string();
        self
    }

    pub fn service(mut self, name: &str) -> Self {
        self.config.service_name = name.to_string();
        self
    }

    pub fn replicas(mut self, min: usize, max: usize) -> Self {
        self.config.min_replicas = min;
        self.config.max_replicas = max;
        self
    }

    pub fn metric(mut self, metric: ScaleMetric) -> Self {
        self.config.scale_metric = metric;
        self
    }

    pub fn cpu_thresholds(mut self, upper: Percent, lower: Percent) -> Self {
        self.config.cpu_upper_threshold = upper;
        self.config.cpu_lower_threshold = lower;
        self
    }

    pub fn mem_thresholds(mut self, upper: Percent, lower: Percent) -> Self {
        self.config.mem_upper_threshold = upper;
        self.config.mem_lower_threshold = lower;
        self
    }

    pub fn cooldowns(mut self, up: Duration, down: Duration) -> Self {
        self.config.scale_up_cooldown = up;
        self.config.scale_down_cooldown = down;
        self
    }

    pub fn scale_up_step(mut self, step: usize) -> Self {
        self.config.scale_up_step = step;
        self
    }

    pub fn scale_down_checks(mut self, checks: u32) -> Self {
        self.config.scale_down_checks = checks;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.log_heartbeat_interval = interval;
        self
    }

    pub fn initial_grace_period(mut self, period: Duration) -> Self {
        self.config.initial_grace_period = period;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.config.dry_run = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
