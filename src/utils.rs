//! Utility functions for log formatting

use std::time::Duration;

use crate::types::{Config, Percent, ScaleMetric, Utilization};

/// Format an averaged reading with two decimals, or `n/a` when unavailable
pub fn format_percent(value: Option<Percent>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "n/a".to_string(),
    }
}

/// Format a remaining duration rounded to whole seconds
pub fn format_remaining(remaining: Duration) -> String {
    format!("{:.0}s", remaining.as_secs_f64().round())
}

/// Build the periodic status line for the workload
pub fn heartbeat_line(config: &Config, replicas: usize, utilization: &Utilization) -> String {
    let cpu = format!(
        "AvgCPU={} (Up>{:.0}%,Down<{:.0}%)",
        format_percent(utilization.cpu),
        config.cpu_upper_threshold,
        config.cpu_lower_threshold
    );
    let mem = format!(
        "AvgMem={} (Up>{:.0}%,Down<{:.0}%)",
        format_percent(utilization.mem),
        config.mem_upper_threshold,
        config.mem_lower_threshold
    );
    let readings = match config.scale_metric {
        ScaleMetric::Any => format!("{}, {}", cpu, mem),
        ScaleMetric::Cpu => cpu,
        ScaleMetric::Mem => mem,
    };

    format!(
        "[{}] {}: Replicas={}, {}",
        config.project_name, config.service_name, replicas, readings
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_line_per_metric_mode() {
        let cfg = Config::builder()
            .project("shop")
            .service("web")
            .metric(ScaleMetric::Any)
            .build();
        let util = Utilization {
            cpu: Some(12.346),
            mem: None,
        };
        assert_eq!(
            heartbeat_line(&cfg, 2, &util),
            "[shop] web: Replicas=2, AvgCPU=12.35% (Up>70%,Down<20%), AvgMem=n/a (Up>80%,Down<30%)"
        );

        let cpu_only = Config {
            scale_metric: ScaleMetric::Cpu,
            ..cfg
        };
        assert_eq!(
            heartbeat_line(&cpu_only, 2, &util),
            "[shop] web: Replicas=2, AvgCPU=12.35% (Up>70%,Down<20%)"
        );
    }

    #[test]
    fn remaining_is_rounded() {
        assert_eq!(format_remaining(Duration::from_millis(12_600)), "13s");
        assert_eq!(format_remaining(Duration::ZERO), "0s");
    }
}
