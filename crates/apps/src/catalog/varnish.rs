//! Varnish Cache (varnishstat, varnishncsa 접근 로그)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_logging::{AccessLog, LoggingError, ModifyFields};
use opsconf_metrics::processors::{modify_instrumentation_scope, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, workload_prefix,
};

const TYPE: &str = "varnish";

#[derive(Debug, Clone, Deserialize)]
struct Varnish {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    cache_dir: String,
    #[serde(default)]
    exec_dir: String,
}

impl ProductMetrics for Varnish {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["cache_dir", "exec_dir"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()
    }
}

impl MetricsReceiver for Varnish {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "cache_dir": self.cache_dir,
                    "exec_dir": self.exec_dir,
                }),
            ),
            vec![
                normalize_sums(),
                workload_prefix(),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )])
    }
}

// 127.0.0.1 - - [02/Mar/2022:15:55:05 +0000] "GET http://localhost:8080/test HTTP/1.1" 404 273 "-" "curl/7.64.0"
struct VarnishLogs;

impl FilesProduct for VarnishLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/varnish/varnishncsa.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        Ok(ProductProcessor::new(AccessLog::new()?)
            .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Varnish>(registries)?;
    register_files_product::<VarnishLogs>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;

    #[test]
    fn directories_passed_through() {
        let body = serde_yaml::from_str("cache_dir: /var/lib/varnish\nexec_dir: /usr/bin").unwrap();
        let r: Varnish = parse_strict(body, Varnish::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["cache_dir"], "/var/lib/varnish");
        assert_eq!(config["exec_dir"], "/usr/bin");
    }

    #[test]
    fn ncsa_line_preview() {
        let p = VarnishLogs::processor().unwrap();
        let record = p
            .inspect()
            .preview(r#"127.0.0.1 - - [02/Mar/2022:15:55:05 +0000] "GET http://localhost:8080/test HTTP/1.1" 404 273 "-" "curl/7.64.0""#)
            .unwrap();
        assert_eq!(
            record.fields["http_request_requestUrl"],
            serde_json::Value::from("http://localhost:8080/test")
        );
    }
}
