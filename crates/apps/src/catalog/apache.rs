//! Apache HTTP Server (server-status, 접근/에러 로그)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::{AccessLog, LoggingError, ModifyFields, ParseRegex, ParserShared, SeverityTable};
use opsconf_metrics::processors::{
    agent_scope, flatten_resource_attribute, metrics_filter, normalize_sums,
    transformation_metrics,
};
use opsconf_metrics::{MatchType, MetricsError, MetricsReceiver, Polarity, ReceiverShared};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, severity_fields, validate_url, workload_prefix,
};

const TYPE: &str = "apache";
const DEFAULT_SERVER_STATUS_URL: &str = "http://127.0.0.1:80/server-status?auto";

#[derive(Debug, Clone, Deserialize)]
struct Apache {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    server_status_url: Option<String>,
}

impl ProductMetrics for Apache {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["server_status_url"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_url("server_status_url", self.server_status_url.as_deref())
    }
}

impl MetricsReceiver for Apache {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .server_status_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_SERVER_STATUS_URL);
        let [scope_name, scope_version] = agent_scope(TYPE);
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                }),
            ),
            vec![
                metrics_filter(Polarity::Exclude, MatchType::Strict, ["apache.uptime"])?,
                normalize_sums(),
                workload_prefix(),
                transformation_metrics([
                    flatten_resource_attribute("apache.server.name", "server_name"),
                    scope_name,
                    scope_version,
                ]),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

struct ApacheAccess;

impl FilesProduct for ApacheAccess {
    const TYPE: &'static str = "apache_access";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/apache2/access.log",
        "/var/log/apache2/access_log",
        "/var/log/httpd/access_log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        Ok(ProductProcessor::new(AccessLog::new()?)
            .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?))
    }
}

// 2.4: [Fri Sep 09 10:42:29.902022 2011] [core:error] [pid 35708:tid 4328636416] (13)Permission denied [client 72.15.99.187] File does not exist: /favicon.ico
// 2.2: [Fri Sep 09 10:42:29.902022 2011] [error] [pid 35708:tid 4328636416] [client 72.15.99.187] File does not exist: /favicon.ico
const ERROR_REGEX: &str = r"^\[(?<time>[^\]]+)\] \[(?:(?<module>\w+):)?(?<level>[\w\d]+)\](?: \[pid (?<pid>\d+)(?::tid (?<tid>[0-9]+))?\])?(?: (?<errorCode>[^\[:]*):?)?(?: \[client (?<client>[^\]]*)\])? (?<message>.*)$";

struct ApacheError;

impl FilesProduct for ApacheError {
    const TYPE: &'static str = "apache_error";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/apache2/error.log",
        "/var/log/apache2/error_log",
        "/var/log/httpd/error_log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            ERROR_REGEX,
            ParserShared::new("time", "%a %b %d %H:%M:%S.%L %Y")
                .with_type("pid", FieldType::Integer)
                .with_type("tid", FieldType::Integer),
        )?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("emerg", Severity::Emergency),
                ("alert", Severity::Alert),
                ("crit", Severity::Critical),
                ("error", Severity::Error),
                ("warn", Severity::Warning),
                ("notice", Severity::Notice),
                ("info", Severity::Info),
                ("debug", Severity::Debug),
                ("trace1", Severity::Debug),
                ("trace2", Severity::Debug),
                ("trace3", Severity::Debug),
                ("trace4", Severity::Debug),
                ("trace5", Severity::Debug),
                ("trace6", Severity::Debug),
                ("trace7", Severity::Debug),
                ("trace8", Severity::Debug),
            ],
            true,
        );
        Ok(ProductProcessor::new(parse).then(severity_fields(Self::TYPE, severity).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Apache>(registries)?;
    register_files_product::<ApacheAccess>(registries)?;
    register_files_product::<ApacheError>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn default_server_status_url() {
        let r: Apache = parse_strict(serde_yaml::Value::Null, Apache::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(
            pipelines[0].receiver.config["endpoint"],
            DEFAULT_SERVER_STATUS_URL
        );
        let processors = &pipelines[0].processors["metrics"];
        assert_eq!(
            processors[0].config["metrics"]["exclude"]["metric_names"][0],
            "apache.uptime"
        );
    }

    #[test]
    fn server_status_url_must_be_http() {
        let body = serde_yaml::from_str("server_status_url: localhost/status").unwrap();
        let r: Apache = parse_strict(body, Apache::FIELDS).unwrap();
        assert!(r.validate().is_err());
    }

    #[test]
    fn error_log_24_preview() {
        let p = ApacheError::processor().unwrap();
        let record = p
            .inspect()
            .preview("[Thu Sep 30 03:18:29.239182 2021] [ssl:error] [pid 2451:tid 140169666050176] AH02217: ssl_stapling_init_cert: Can't retrieve issuer certificate!")
            .unwrap();
        assert_eq!(record.fields["module"], Value::from("ssl"));
        assert_eq!(record.fields["level"], Value::from("error"));
        assert_eq!(record.fields["pid"], Value::from(2451));
        assert_eq!(record.fields["errorCode"], Value::from("AH02217"));
    }

    #[test]
    fn trace_levels_map_to_debug() {
        let p = ApacheError::processor().unwrap();
        let table = p.inspect().severity.unwrap();
        assert_eq!(table.lookup("trace5"), Some(Severity::Debug));
        assert_eq!(table.lookup("crit"), Some(Severity::Critical));
    }
}
