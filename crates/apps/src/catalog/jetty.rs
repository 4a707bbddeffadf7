//! Jetty (JMX, 접근 로그)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_logging::{AccessLog, LoggingError, ModifyFields};
use opsconf_metrics::processors::{modify_instrumentation_scope, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedCollectJvm, SharedJvm};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, workload_prefix,
};

const TYPE: &str = "jetty";
const DEFAULT_ENDPOINT: &str = "localhost:1099";

#[derive(Debug, Clone, Deserialize)]
struct Jetty {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Jetty {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Jetty {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![
                    normalize_sums(),
                    workload_prefix(),
                    modify_instrumentation_scope(TYPE, "1.0"),
                ],
                &ctx.jmx_jar,
            ))
    }
}

struct JettyAccess;

impl FilesProduct for JettyAccess {
    const TYPE: &'static str = "jetty_access";
    const DEFAULT_PATHS: &'static [&'static str] = &["/opt/logs/*.request.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        Ok(ProductProcessor::new(AccessLog::new()?)
            .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Jetty>(registries)?;
    register_files_product::<JettyAccess>(registries)
}
