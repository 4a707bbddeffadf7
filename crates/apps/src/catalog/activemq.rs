//! ActiveMQ (JMX)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedCollectJvm, SharedJvm};

use super::{ProductMetrics, Registries, register_metrics, scope, workload_prefix};

const TYPE: &str = "activemq";
const DEFAULT_ENDPOINT: &str = "localhost:1099";

#[derive(Debug, Clone, Deserialize)]
struct Activemq {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Activemq {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Activemq {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![normalize_sums(), workload_prefix(), scope(TYPE)],
                &ctx.jmx_jar,
            ))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Activemq>(registries)
}
