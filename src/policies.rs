//! Threshold checks that turn averaged utilization into a scaling verdict.
//!
//! Mode `any` is deliberately asymmetric: a scale-up fires when *either*
//! metric is above its upper threshold, while a scale-down needs *both*
//! metrics below their lower thresholds.

use crate::types::{Config, Decision, Utilization};

/// Check whether the workload should grow, and why
pub fn check_scale_up(config: &Config, utilization: &Utilization) -> (bool, String) {
    let mut reasons = Vec::new();

    if config.scale_metric.uses_cpu() {
        if let Some(cpu) = utilization.cpu.filter(|cpu| *cpu > config.cpu_upper_threshold) {
            reasons.push(format!(
                "CPU ({:.2}% > {:.0}%)",
                cpu, config.cpu_upper_threshold
            ));
        }
    }
    if config.scale_metric.uses_mem() {
        if let Some(mem) = utilization.mem.filter(|mem| *mem > config.mem_upper_threshold) {
            reasons.push(format!(
                "Memory ({:.2}% > {:.0}%)",
                mem, config.mem_upper_threshold
            ));
        }
    }

    if reasons.is_empty() {
        (false, String::new())
    } else {
        (true, reasons.join(" and "))
    }
}

/// Check whether the workload is idle enough to shrink
pub fn check_scale_down(config: &Config, utilization: &Utilization) -> bool {
    let cpu_low = utilization
        .cpu
        .is_some_and(|cpu| cpu < config.cpu_lower_threshold);
    let mem_low = utilization
        .mem
        .is_some_and(|mem| mem < config.mem_lower_threshold);

    match (config.scale_metric.uses_cpu(), config.scale_metric.uses_mem()) {
        (true, true) => cpu_low && mem_low,
        (true, false) => cpu_low,
        (false, true) => mem_low,
        (false, false) => false,
    }
}

/// Evaluate both checks for one tick
///
/// Scale-up wins: when it fires, `should_scale_down` is always false.
pub fn evaluate(config: &Config, utilization: &Utilization) -> Decision {
    let (should_scale_up, reason) = check_scale_up(config, utilization);
    let should_scale_down = !should_scale_up && check_scale_down(config, utilization);

    Decision {
        should_scale_up,
        should_scale_down,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScaleMetric;

    fn config(metric: ScaleMetric) -> Config {
        Config::builder()
            .project("test-project")
            .service("webapp")
            .metric(metric)
            .cpu_thresholds(50.0, 20.0)
            .mem_thresholds(80.0, 30.0)
            .build()
    }

    #[test]
    fn cpu_above_threshold_scales_up() {
        let (up, reason) = check_scale_up(&config(ScaleMetric::Cpu), &Utilization::new(60.0, 10.0));
        assert!(up);
        assert_eq!(reason, "CPU (60.00% > 50%)");
    }

    #[test]
    fn cpu_below_threshold_does_not_scale_up() {
        let (up, reason) = check_scale_up(&config(ScaleMetric::Cpu), &Utilization::new(40.0, 10.0));
        assert!(!up);
        assert!(reason.is_empty());
    }

    #[test]
    fn memory_mode_ignores_cpu() {
        let cfg = config(ScaleMetric::Mem);
        let (up, reason) = check_scale_up(&cfg, &Utilization::new(99.0, 90.0));
        assert!(up);
        assert_eq!(reason, "Memory (90.00% > 80%)");

        let (up, _) = check_scale_up(&cfg, &Utilization::new(99.0, 50.0));
        assert!(!up);
    }

    #[test]
    fn any_mode_reports_only_the_metric_that_fired() {
        let (up, reason) = check_scale_up(&config(ScaleMetric::Any), &Utilization::new(60.0, 70.0));
        assert!(up);
        assert_eq!(reason, "CPU (60.00% > 50%)");
    }

    #[test]
    fn any_mode_joins_both_reasons() {
        let (up, reason) = check_scale_up(&config(ScaleMetric::Any), &Utilization::new(60.0, 90.0));
        assert!(up);
        assert_eq!(reason, "CPU (60.00% > 50%) and Memory (90.00% > 80%)");
    }

    #[test]
    fn scale_down_single_metric_modes() {
        assert!(check_scale_down(&config(ScaleMetric::Cpu), &Utilization::new(10.0, 50.0)));
        assert!(!check_scale_down(&config(ScaleMetric::Cpu), &Utilization::new(30.0, 50.0)));
        assert!(check_scale_down(&config(ScaleMetric::Mem), &Utilization::new(90.0, 20.0)));
    }

    #[test]
    fn any_mode_scale_down_needs_both_metrics_low() {
        let cfg = config(ScaleMetric::Any);
        assert!(check_scale_down(&cfg, &Utilization::new(10.0, 20.0)));
        assert!(!check_scale_down(&cfg, &Utilization::new(10.0, 40.0)));
    }

    #[test]
    fn missing_metric_satisfies_neither_check() {
        let cfg = config(ScaleMetric::Cpu);
        let no_cpu = Utilization {
            cpu: None,
            mem: Some(10.0),
        };
        let decision = evaluate(&cfg, &no_cpu);
        assert!(!decision.should_scale_up);
        assert!(!decision.should_scale_down);

        let any = config(ScaleMetric::Any);
        assert!(!check_scale_down(&any, &no_cpu));
    }

    #[test]
    fn verdicts_are_never_both_true() {
        // Contradictory thresholds: everything is both above upper and below lower.
        let cfg = Config::builder()
            .metric(ScaleMetric::Cpu)
            .cpu_thresholds(10.0, 90.0)
            .build();
        let decision = evaluate(&cfg, &Utilization::new(50.0, 50.0));
        assert!(decision.should_scale_up);
        assert!(!decision.should_scale_down);
    }
}
