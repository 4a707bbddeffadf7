//! Memcached

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_metrics::processors::{
    metrics_filter, metrics_remove_service_attributes, normalize_sums,
};
use opsconf_metrics::{MatchType, MetricsError, MetricsReceiver, Polarity, ReceiverShared};

use super::{
    ProductMetrics, Registries, register_metrics, scope, validate_endpoint, workload_prefix,
};

const TYPE: &str = "memcached";
const DEFAULT_ENDPOINT: &str = "localhost:11211";

#[derive(Debug, Clone, Deserialize)]
struct Memcached {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
}

impl ProductMetrics for Memcached {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS, &["endpoint"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())
    }
}

impl MetricsReceiver for Memcached {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                    "transport": "tcp",
                }),
            ),
            vec![
                metrics_filter(
                    Polarity::Exclude,
                    MatchType::Strict,
                    ["memcached.operation_hit_ratio"],
                )?,
                normalize_sums(),
                workload_prefix(),
                scope(TYPE),
                metrics_remove_service_attributes(),
            ],
        )])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Memcached>(registries)
}
