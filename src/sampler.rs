// src/sampler.rs

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::callbacks::MetricsSource;
use crate::error::{AutoscalerError, AutoscalerResult};
use crate::types::{InstanceId, InstanceSample, Percent, Utilization, WorkloadSelector};

/// Result of sampling the workload once
#[derive(Debug, Clone, PartialEq)]
pub enum Sampling {
    /// The workload currently has no instances at all
    NoInstances,
    /// Instances were listed; `samples` holds the ones that answered
    Instances {
        listed: Vec<InstanceId>,
        samples: Vec<(InstanceId, InstanceSample)>,
    },
}

impl Sampling {
    /// Replica count as seen by the orchestrator, including unreachable instances
    pub fn replicas(&self) -> usize {
        match self {
            Sampling::NoInstances => 0,
            Sampling::Instances { listed, .. } => listed.len(),
        }
    }
}

/// Lists the workload's instances and samples each of them
pub struct StatsSampler {
    source: Arc<dyn MetricsSource>,
    selector: WorkloadSelector,
}

impl StatsSampler {
    pub fn new(source: Arc<dyn MetricsSource>, selector: WorkloadSelector) -> Self {
        Self { source, selector }
    }

    /// Sample every instance concurrently
    ///
    /// Only a failure to list instances is an error. Instances that cannot be
    /// sampled are logged and left out of `samples`.
    pub async fn sample(&self) -> AutoscalerResult<Sampling> {
        let listed = self.source.list_instances(&self.selector).await?;
        if listed.is_empty() {
            return Ok(Sampling::NoInstances);
        }

        let results = join_all(listed.iter().map(|id| self.source.sample_instance(id))).await;

        let mut samples = Vec::with_capacity(listed.len());
        for (id, result) in listed.iter().zip(results) {
            match result {
                Ok(sample) => samples.push((id.clone(), sample)),
                Err(e) => warn!(
                    "Warning: could not get stats for container [{}] {}: {}",
                    self.selector.project,
                    id.short(),
                    e
                ),
            }
        }

        Ok(Sampling::Instances { listed, samples })
    }
}

/// CPU usage of one instance between two samples, as a percentage of one CPU
/// times the number of CPUs available to it
pub fn cpu_percent(current: &InstanceSample, previous: &InstanceSample) -> Percent {
    let cpu_delta = current.cpu_total_usage.saturating_sub(previous.cpu_total_usage) as f64;
    let system_delta = current.system_cpu_usage.saturating_sub(previous.system_cpu_usage) as f64;

    if system_delta > 0.0 && cpu_delta > 0.0 {
        (cpu_delta / system_delta) * current.online_cpus as f64 * 100.0
    } else {
        0.0
    }
}

/// Memory usage of one instance as a percentage of its limit
pub fn mem_percent(sample: &InstanceSample) -> Percent {
    if sample.memory_limit == 0 {
        return 0.0;
    }
    (sample.memory_usage as f64 / sample.memory_limit as f64) * 100.0
}

/// Turns per-instance counters into workload-wide averages
///
/// Keeps the previous sample of every live instance so CPU can be derived
/// from counter deltas.
#[derive(Debug, Default)]
pub struct UtilizationAggregator {
    previous: HashMap<InstanceId, InstanceSample>,
}

impl UtilizationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all baselines, e.g. when the workload has no instances left
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Number of instances with a retained baseline sample
    pub fn tracked_instances(&self) -> usize {
        self.previous.len()
    }

    /// Average the readings of one tick and remember them for the next
    ///
    /// # Returns
    /// * `Ok(utilization)` - At least one instance produced a valid reading
    /// * `Err(NoValidReadings)` - Nothing usable was sampled this tick
    pub fn aggregate(
        &mut self,
        listed: &[InstanceId],
        samples: &[(InstanceId, InstanceSample)],
    ) -> AutoscalerResult<Utilization> {
        let mut cpu_total = 0.0;
        let mut cpu_count = 0usize;
        let mut with_baseline = 0usize;
        let mut mem_total = 0.0;
        let mut mem_count = 0usize;

        for (id, sample) in samples {
            if let Some(previous) = self.previous.get(id) {
                with_baseline += 1;
                let cpu = cpu_percent(sample, previous);
                if cpu > 0.0 {
                    cpu_total += cpu;
                    cpu_count += 1;
                }
            } else {
                debug!("No previous sample for {}, CPU unavailable this cycle", id.short());
            }

            let mem = mem_percent(sample);
            if mem > 0.0 {
                mem_total += mem;
                mem_count += 1;
            }
        }

        self.previous.retain(|id, _| listed.contains(id));
        for (id, sample) in samples {
            self.previous.insert(id.clone(), *sample);
        }

        if cpu_count == 0 && mem_count == 0 {
            return Err(AutoscalerError::no_valid_readings(samples.len()));
        }

        let cpu = match (cpu_count, with_baseline) {
            (0, 0) => None,
            (0, _) => Some(0.0),
            (n, _) => Some(cpu_total / n as f64),
        };
        let mem = (mem_count > 0).then(|| mem_total / mem_count as f64);

        Ok(Utilization { cpu, mem })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: u64, system: u64, mem: u64, limit: u64) -> InstanceSample {
        InstanceSample {
            cpu_total_usage: cpu,
            system_cpu_usage: system,
            online_cpus: 1,
            memory_usage: mem,
            memory_limit: limit,
        }
    }

    #[test]
    fn cpu_percent_from_counter_deltas() {
        let previous = sample(0, 0, 0, 0);
        let current = sample(6000, 10000, 0, 0);
        assert!((cpu_percent(&current, &previous) - 60.0).abs() < 1e-9);

        let multi = InstanceSample {
            online_cpus: 4,
            ..current
        };
        assert!((cpu_percent(&multi, &previous) - 240.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_percent_is_zero_without_progress() {
        let previous = sample(5000, 10000, 0, 0);
        assert_eq!(cpu_percent(&sample(5000, 20000, 0, 0), &previous), 0.0);
        assert_eq!(cpu_percent(&sample(6000, 10000, 0, 0), &previous), 0.0);
        // Counters reset after a restart
        assert_eq!(cpu_percent(&sample(10, 20, 0, 0), &previous), 0.0);
    }

    #[test]
    fn mem_percent_handles_missing_limit() {
        assert_eq!(mem_percent(&sample(0, 0, 512, 1024)), 50.0);
        assert_eq!(mem_percent(&sample(0, 0, 512, 0)), 0.0);
    }

    #[test]
    fn first_sample_has_no_cpu_but_counts_memory() {
        let mut aggregator = UtilizationAggregator::new();
        let a = InstanceId::from("a");
        let util = aggregator
            .aggregate(&[a.clone()], &[(a, sample(100, 1000, 256, 1024))])
            .unwrap();
        assert_eq!(util.cpu, None);
        assert_eq!(util.mem, Some(25.0));
    }

    #[test]
    fn averages_only_over_valid_readings() {
        let mut aggregator = UtilizationAggregator::new();
        let (a, b, c) = (InstanceId::from("a"), InstanceId::from("b"), InstanceId::from("c"));
        let listed = vec![a.clone(), b.clone(), c.clone()];

        aggregator
            .aggregate(
                &listed,
                &[
                    (a.clone(), sample(0, 0, 100, 1000)),
                    (b.clone(), sample(0, 0, 300, 1000)),
                ],
            )
            .unwrap();

        // a: 40%, b: idle, c: first sighting
        let util = aggregator
            .aggregate(
                &listed,
                &[
                    (a.clone(), sample(4000, 10000, 100, 1000)),
                    (b.clone(), sample(0, 10000, 300, 1000)),
                    (c.clone(), sample(9000, 10000, 600, 1000)),
                ],
            )
            .unwrap();

        assert!((util.cpu.unwrap() - 40.0).abs() < 1e-9);
        assert!((util.mem.unwrap() - (10.0 + 30.0 + 60.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn idle_instances_with_baseline_report_zero_cpu() {
        let mut aggregator = UtilizationAggregator::new();
        let a = InstanceId::from("a");
        let listed = vec![a.clone()];
        aggregator
            .aggregate(&listed, &[(a.clone(), sample(500, 1000, 100, 1000))])
            .unwrap();
        let util = aggregator
            .aggregate(&listed, &[(a, sample(500, 2000, 100, 1000))])
            .unwrap();
        assert_eq!(util.cpu, Some(0.0));
    }

    #[test]
    fn no_valid_readings_is_an_error() {
        let mut aggregator = UtilizationAggregator::new();
        let a = InstanceId::from("a");
        let err = aggregator
            .aggregate(&[a.clone()], &[(a, sample(0, 0, 0, 0))])
            .unwrap_err();
        assert!(matches!(err, AutoscalerError::NoValidReadings { instances: 1 }));

        let err = aggregator.aggregate(&[], &[]).unwrap_err();
        assert!(matches!(err, AutoscalerError::NoValidReadings { instances: 0 }));
    }

    fn selector() -> WorkloadSelector {
        WorkloadSelector {
            project: "shop".to_string(),
            service: "web".to_string(),
        }
    }

    #[tokio::test]
    async fn sampler_drops_failed_instances_but_keeps_them_listed() {
        let mut source = crate::callbacks::MockMetricsSource::new();
        source
            .expect_list_instances()
            .times(1)
            .returning(|_| Ok(vec![InstanceId::from("a"), InstanceId::from("b")]));
        source.expect_sample_instance().times(2).returning(|id| {
            if id.as_str() == "a" {
                Ok(sample(1, 1, 1, 2))
            } else {
                Err(AutoscalerError::instance_sampling(id, "gone"))
            }
        });

        let sampler = StatsSampler::new(Arc::new(source), selector());
        let sampling = sampler.sample().await.unwrap();

        assert_eq!(sampling.replicas(), 2);
        match sampling {
            Sampling::Instances { samples, .. } => {
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[0].0, InstanceId::from("a"));
            }
            Sampling::NoInstances => panic!("expected instances"),
        }
    }

    #[tokio::test]
    async fn sampler_reports_empty_workload() {
        let mut source = crate::callbacks::MockMetricsSource::new();
        source.expect_list_instances().returning(|_| Ok(vec![]));
        source.expect_sample_instance().never();

        let sampler = StatsSampler::new(Arc::new(source), selector());
        assert_eq!(sampler.sample().await.unwrap(), Sampling::NoInstances);
    }

    #[tokio::test]
    async fn sampler_propagates_listing_errors() {
        let mut source = crate::callbacks::MockMetricsSource::new();
        source
            .expect_list_instances()
            .returning(|s| Err(AutoscalerError::sampling(s.service.clone(), "daemon down")));

        let sampler = StatsSampler::new(Arc::new(source), selector());
        assert!(matches!(
            sampler.sample().await,
            Err(AutoscalerError::Sampling { .. })
        ));
    }

    #[test]
    fn history_is_pruned_to_listed_instances() {
        let mut aggregator = UtilizationAggregator::new();
        let (a, b) = (InstanceId::from("a"), InstanceId::from("b"));
        aggregator
            .aggregate(
                &[a.clone(), b.clone()],
                &[(a.clone(), sample(1, 1, 1, 2)), (b.clone(), sample(1, 1, 1, 2))],
            )
            .unwrap();
        assert_eq!(aggregator.tracked_instances(), 2);

        // b is listed but unreachable: its baseline survives
        aggregator
            .aggregate(&[a.clone(), b.clone()], &[(a.clone(), sample(2, 2, 1, 2))])
            .unwrap();
        assert_eq!(aggregator.tracked_instances(), 2);

        // b is gone
        aggregator
            .aggregate(&[a.clone()], &[(a, sample(3, 3, 1, 2))])
            .unwrap();
        assert_eq!(aggregator.tracked_instances(), 1);
    }
}
