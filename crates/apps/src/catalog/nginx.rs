//! nginx (stub_status, 접근/에러 로그)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::access_log::ACCESS_LOG_TIME_FORMAT;
use opsconf_logging::{LoggingError, ModifyFields, ParseRegex, ParserShared, SeverityTable};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope, severity_fields, validate_url, workload_prefix,
};

const TYPE: &str = "nginx";
const DEFAULT_STUB_STATUS_URL: &str = "http://127.0.0.1/status";

#[derive(Debug, Clone, Deserialize)]
struct Nginx {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    stub_status_url: Option<String>,
}

impl ProductMetrics for Nginx {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["stub_status_url"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_url("stub_status_url", self.stub_status_url.as_deref())
    }
}

impl MetricsReceiver for Nginx {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .stub_status_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_STUB_STATUS_URL);
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                }),
            ),
            vec![normalize_sums(), workload_prefix(), scope(TYPE)],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// combined 형식 뒤에 선택적인 "gzip_ratio"
// ::1 - - [26/Aug/2021:16:49:43 +0000] "GET / HTTP/1.1" 200 10701 "-" "curl/7.64.0"
const ACCESS_REGEX: &str = r#"^(?<http_request_remoteIp>[^ ]*) (?<host>[^ ]*) (?<user>[^ ]*) \[(?<time>[^\]]*)\] "(?<http_request_requestMethod>\S+)(?: +(?<http_request_requestUrl>[^\"]*?)(?: +(?<http_request_protocol>\S+))?)?" (?<http_request_status>[^ ]*) (?<http_request_responseSize>[^ ]*)(?: "(?<http_request_referer>[^\"]*)" "(?<http_request_userAgent>[^\"]*)")?(?: "(?<gzip_ratio>[^\"]*)")?$"#;

struct NginxAccess;

impl FilesProduct for NginxAccess {
    const TYPE: &'static str = "nginx_access";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/nginx/access.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            ACCESS_REGEX,
            ParserShared::new("time", ACCESS_LOG_TIME_FORMAT)
                .with_type("http_request_status", FieldType::Integer),
        )?;
        Ok(ProductProcessor::new(parse)
            .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?))
    }
}

// 2021/08/26 16:50:17 [error] 29060#29060: *2191 open() "/var/www/html/forbidden.html" failed (13: Permission denied), client: ::1, server: _, request: "GET /forbidden.html HTTP/1.1", host: "localhost:8080"
const ERROR_REGEX: &str = r#"^(?<time>[0-9]+[./-][0-9]+[./-][0-9]+[- ][0-9]+:[0-9]+:[0-9]+) \[(?<level>[^\]]*)\] (?<pid>[0-9]+)#(?<tid>[0-9]+):(?: \*(?<connection>[0-9]+))? (?<message>.*?)(?:, client: (?<client>[^,]+))?(?:, server: (?<server>[^,]+))?(?:, request: "(?<request>[^"]*)")?(?:, subrequest: \"(?<subrequest>[^\"]*)\")?(?:, upstream: \"(?<upstream>[^"]*)\")?(?:, host: \"(?<host>[^\"]*)\")?(?:, referrer: \"(?<referer>[^"]*)\")?$"#;

struct NginxError;

impl FilesProduct for NginxError {
    const TYPE: &'static str = "nginx_error";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/nginx/error.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            ERROR_REGEX,
            ParserShared::new("time", "%Y/%m/%d %H:%M:%S")
                .with_type("pid", FieldType::Integer)
                .with_type("tid", FieldType::Integer)
                .with_type("connection", FieldType::Integer),
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
            ],
            true,
        );
        Ok(ProductProcessor::new(parse).then(severity_fields(Self::TYPE, severity).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Nginx>(registries)?;
    register_files_product::<NginxAccess>(registries)?;
    register_files_product::<NginxError>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn stub_status_url_override() {
        let body = serde_yaml::from_str("stub_status_url: http://localhost:8080/nginx_status").unwrap();
        let r: Nginx = parse_strict(body, Nginx::FIELDS).unwrap();
        r.validate().unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(
            pipelines[0].receiver.config["endpoint"],
            "http://localhost:8080/nginx_status"
        );
    }

    #[test]
    fn error_log_preview_extracts_request_context() {
        let p = NginxError::processor().unwrap();
        let record = p
            .inspect()
            .preview(r#"2021/08/26 16:50:17 [error] 29060#29060: *2191 open() "/var/www/html/forbidden.html" failed (13: Permission denied), client: ::1, server: _, request: "GET /forbidden.html HTTP/1.1", host: "localhost:8080""#)
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("error"));
        assert_eq!(record.fields["connection"], Value::from(2191));
        assert_eq!(record.fields["client"], Value::from("::1"));
        assert_eq!(record.fields["host"], Value::from("localhost:8080"));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn access_log_keeps_gzip_ratio() {
        let p = NginxAccess::processor().unwrap();
        let record = p
            .inspect()
            .preview(r#"::1 - - [26/Aug/2021:16:49:43 +0000] "GET / HTTP/1.1" 200 10701 "-" "curl/7.64.0" "2.75""#)
            .unwrap();
        assert_eq!(record.fields["gzip_ratio"], Value::from("2.75"));
        assert_eq!(record.fields["http_request_status"], Value::from(200));
    }
}
