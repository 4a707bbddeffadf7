//! NVIDIA NVML (Linux 전용)

use serde::Deserialize;
use serde_json::{Map, Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::PlatformFilter;
use opsconf_metrics::processors::{metrics_transform, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, Transform};

use super::{ProductMetrics, Registries, register_metrics, workload_prefix};

const TYPE: &str = "nvml";

/// (수신기 메트릭, 내보낼 이름)
const DEVICE_METRICS: [(&str, &str); 2] = [
    ("nvml.gpu.utilization", "gpu/utilization"),
    ("nvml.gpu.memory.bytes_used", "gpu/memory/bytes_used"),
];

const PROCESS_METRICS: [(&str, &str); 2] = [
    (
        "nvml.processes.lifetime_gpu_utilization",
        "processes/gpu/lifetime_utilization",
    ),
    (
        "nvml.processes.lifetime_gpu_max_bytes_used",
        "processes/gpu/lifetime_max_bytes_used",
    ),
];

#[derive(Debug, Clone, Deserialize)]
struct Nvml {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    process_metrics: bool,
}

impl ProductMetrics for Nvml {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::LinuxOnly;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["process_metrics"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()
    }
}

impl MetricsReceiver for Nvml {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let selected: &[(&str, &str)] = if self.process_metrics {
            &PROCESS_METRICS
        } else {
            &DEVICE_METRICS
        };
        let metrics: Map<String, Value> = selected
            .iter()
            .map(|(name, _)| ((*name).to_owned(), json!({ "enabled": true })))
            .collect();
        let renames = selected
            .iter()
            .map(|(old, new)| Transform::rename_metric(old, new))
            .collect();

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "metrics": Value::Object(metrics),
                }),
            ),
            vec![normalize_sums(), metrics_transform(renames), workload_prefix()],
        )])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Nvml>(registries)
}
