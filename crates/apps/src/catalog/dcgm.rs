//! NVIDIA DCGM (Linux 전용)

use serde::Deserialize;
use serde_json::{Map, Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::PlatformFilter;
use opsconf_metrics::processors::{metrics_transform, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, Transform};

use super::{ProductMetrics, Registries, register_metrics, validate_endpoint, workload_prefix};

const TYPE: &str = "dcgm";
const DEFAULT_ENDPOINT: &str = "localhost:5555";

const BASIC_METRICS: [&str; 2] = ["dcgm.gpu.utilization", "dcgm.gpu.memory.bytes_used"];

const PROFILING_METRICS: [&str; 6] = [
    "dcgm.gpu.profiling.sm_utilization",
    "dcgm.gpu.profiling.sm_occupancy",
    "dcgm.gpu.profiling.pipe_utilization",
    "dcgm.gpu.profiling.dram_utilization",
    "dcgm.gpu.profiling.pcie_traffic_rate",
    "dcgm.gpu.profiling.nvlink_traffic_rate",
];

#[derive(Debug, Clone, Deserialize)]
struct Dcgm {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    profiling_metrics: bool,
}

impl Dcgm {
    fn enabled_metrics(&self) -> &'static [&'static str] {
        if self.profiling_metrics {
            &PROFILING_METRICS
        } else {
            &BASIC_METRICS
        }
    }
}

impl ProductMetrics for Dcgm {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::LinuxOnly;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["endpoint", "profiling_metrics"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())
    }
}

impl MetricsReceiver for Dcgm {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);

        let enabled = self.enabled_metrics();
        let metrics: Map<String, Value> = enabled
            .iter()
            .map(|name| ((*name).to_owned(), json!({ "enabled": true })))
            .collect();
        // dcgm.gpu.memory.bytes_used -> dcgm/gpu/memory/bytes_used
        let renames = enabled
            .iter()
            .map(|name| Transform::rename_metric(name, &name.replace('.', "/")))
            .collect();

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                    "metrics": Value::Object(metrics),
                }),
            ),
            vec![normalize_sums(), metrics_transform(renames), workload_prefix()],
        )])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Dcgm>(registries)
}
