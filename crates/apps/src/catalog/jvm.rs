//! 범용 JVM (JMX)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedJvm};

use super::{ProductMetrics, Registries, register_metrics, scope, workload_prefix};

const TYPE: &str = "jvm";
const DEFAULT_ENDPOINT: &str = "localhost:9999";

#[derive(Debug, Clone, Deserialize)]
struct Jvm {
    #[serde(flatten)]
    jvm: SharedJvm,
}

impl ProductMetrics for Jvm {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Jvm {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                TYPE,
                vec![normalize_sums(), workload_prefix(), scope(TYPE)],
                &ctx.jmx_jar,
            ))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Jvm>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_metrics::shared::parse_strict;

    #[test]
    fn jar_path_comes_from_context() {
        let r: Jvm = parse_strict(serde_yaml::Value::Null, Jvm::FIELDS).unwrap();
        let mut ctx = GenContext::default();
        ctx.jmx_jar = "/opt/jmx.jar".to_owned();
        let pipelines = r.pipelines(&ctx).unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["jar_path"], "/opt/jmx.jar");
        assert_eq!(config["target_system"], "jvm");
    }

    #[test]
    fn service_url_endpoint_kept() {
        let body = serde_yaml::from_str(
            "endpoint: 'service:jmx:rmi:///jndi/rmi://db:9010/jmxrmi'\nusername: u\npassword: p",
        )
        .unwrap();
        let r: Jvm = parse_strict(body, Jvm::FIELDS).unwrap();
        r.validate().unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["endpoint"], "service:jmx:rmi:///jndi/rmi://db:9010/jmxrmi");
        assert_eq!(config["username"], "u");
        assert_eq!(config["password"], "p");
    }

    #[test]
    fn unknown_field_rejected() {
        let body = serde_yaml::from_str("stub_status_url: x").unwrap();
        assert!(parse_strict::<Jvm>(body, Jvm::FIELDS).is_err());
    }
}
