//! Microsoft SQL Server (Windows 전용, `sqlserver` 리시버)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::PlatformFilter;
use opsconf_metrics::processors::{cast_to_sum, metrics_transform, normalize_sums};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, Transform};

use super::{ProductMetrics, Registries, register_metrics};

const TYPE: &str = "sqlserver";

#[derive(Debug, Clone, Deserialize)]
struct SqlServer {
    #[serde(flatten)]
    shared: ReceiverShared,
}

impl ProductMetrics for SqlServer {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::WindowsOnly;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()
    }
}

impl MetricsReceiver for SqlServer {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({ "collection_interval": self.shared.collection_interval_string() }),
            ),
            vec![
                metrics_transform(vec![
                    Transform::rename_metric(
                        "sqlserver.transaction_log.usage",
                        "sqlserver.transaction_log.percent_used",
                    ),
                    Transform::add_prefix(WORKLOAD_PREFIX),
                ]),
                cast_to_sum(&[
                    "workload.googleapis.com/sqlserver.transaction_log.growth.count",
                    "workload.googleapis.com/sqlserver.transaction_log.shrink.count",
                ]),
                normalize_sums(),
            ],
        )])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<SqlServer>(registries)
}
