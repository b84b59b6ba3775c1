//! Docker Engine metrics source
//!
//! Lists a compose service's running containers by their compose labels and
//! reads one-shot stats for each of them through the Docker API.

use async_trait::async_trait;
use bollard::container::{ListContainersOptions, Stats, StatsOptions};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::info;

use crate::callbacks::MetricsSource;
use crate::error::{AutoscalerError, AutoscalerResult};
use crate::types::{InstanceId, InstanceSample, WorkloadSelector};

const PROJECT_LABEL: &str = "com.docker.compose.project";
const SERVICE_LABEL: &str = "com.docker.compose.service";

/// Metrics source backed by the local Docker daemon
#[derive(Debug, Clone)]
pub struct DockerMetricsSource {
    docker: Docker,
}

impl DockerMetricsSource {
    /// Connect using `DOCKER_HOST` or the platform's default socket
    pub fn connect() -> AutoscalerResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        info!("Docker metrics source initialized");
        Ok(Self { docker })
    }
}

/// Label filters selecting the containers of one compose service
fn label_filters(selector: &WorkloadSelector) -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::new();
    filters.insert(
        "label".to_string(),
        vec![
            format!("{}={}", PROJECT_LABEL, selector.project),
            format!("{}={}", SERVICE_LABEL, selector.service),
        ],
    );
    filters
}

fn to_sample(stats: &Stats) -> InstanceSample {
    InstanceSample {
        cpu_total_usage: stats.cpu_stats.cpu_usage.total_usage,
        system_cpu_usage: stats.cpu_stats.system_cpu_usage.unwrap_or_default(),
        online_cpus: stats
            .cpu_stats
            .online_cpus
            .map(|cpus| u32::try_from(cpus).unwrap_or(u32::MAX))
            .unwrap_or(1),
        memory_usage: stats.memory_stats.usage.unwrap_or_default(),
        memory_limit: stats.memory_stats.limit.unwrap_or_default(),
    }
}

#[async_trait]
impl MetricsSource for DockerMetricsSource {
    async fn list_instances(&self, selector: &WorkloadSelector) -> AutoscalerResult<Vec<InstanceId>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters: label_filters(selector),
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|container| container.id)
            .map(InstanceId)
            .collect())
    }

    async fn sample_instance(&self, instance: &InstanceId) -> AutoscalerResult<InstanceSample> {
        let stream = self.docker.stats(
            instance.as_str(),
            Some(StatsOptions {
                stream: false,
                one_shot: true,
            }),
        );
        futures::pin_mut!(stream);

        match stream.next().await {
            Some(stats) => Ok(to_sample(&stats?)),
            None => Err(AutoscalerError::instance_sampling(
                instance,
                "stats stream ended without a reading",
            )),
        }
    }
}
