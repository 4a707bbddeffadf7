//! Apache CouchDB

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{
    HttpRequestNest, LoggingError, MultilineRule, ParseRegexComplex, ParserShared, RegexParser,
    SeverityTable,
};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, validate_credentials,
    validate_url, workload_prefix,
};

const TYPE: &str = "couchdb";
const DEFAULT_ENDPOINT: &str = "http://localhost:5984";

#[derive(Debug, Clone, Deserialize)]
struct Couchdb {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
}

impl ProductMetrics for Couchdb {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["endpoint", "username", "password"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_url("endpoint", self.endpoint.as_deref())?;
        validate_credentials(self.username.as_deref(), &self.password)
    }
}

impl MetricsReceiver for Couchdb {
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
                    "username": self.username.as_deref().unwrap_or_default(),
                    "password": self.password.expose(),
                }),
            ),
            vec![normalize_sums(), workload_prefix(), scope(TYPE)],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// [notice] 2021-12-02T23:36:42.555157Z nonode@nohost <0.17165.1> a5f585a0d3 localhost:5984 127.0.0.1 otelu PUT /oteld 201 ok 16
const REQUEST_REGEX: &str = r"^\[(?<level>\w*)\] (?<timestamp>[\d\-\.:TZ]+) (?<node>\S+)@(?<host>[^\s]+) <(?<pid>[^ ]*)> [\w-]+ (?<http_request_serverIp>[^ ]*) (?<http_request_remoteIp>[^ ]*) (?<message>(?<remote_user>[^ ]*) (?<http_request_requestMethod>[^ ]*) (?<path>[^ ]*) (?<http_request_status>[^ ]*) (?<status_message>[^ ]*) (?<http_request_responseSize>[\d]*)$)";

// [info] 2022-01-12T16:52:56.998128Z nonode@nohost <0.216.0> -------- Apache CouchDB has started. Time to relax.
const GENERAL_REGEX: &str = r"^\[(?<level>\w*)\] (?<timestamp>[\d\-\.:TZ]+) (?<node>\S+)@(?<host>[^\s]+) (?<message>[\s\S]*(<(?<pid>[^>]+)>)[\s\S]*)";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%L%z";

struct CouchdbLogs;

impl FilesProduct for CouchdbLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/couchdb/couchdb.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parsers = vec![
            RegexParser::new(
                REQUEST_REGEX,
                ParserShared::new("timestamp", TIME_FORMAT)
                    .with_type("http_request_status", FieldType::Integer),
            )?,
            RegexParser::new(GENERAL_REGEX, ParserShared::new("timestamp", TIME_FORMAT))?,
        ];
        let severity = SeverityTable::new(
            "level",
            &[
                ("emerg", Severity::Emergency),
                ("emergency", Severity::Emergency),
                ("alert", Severity::Alert),
                ("crit", Severity::Critical),
                ("critical", Severity::Critical),
                ("error", Severity::Error),
                ("err", Severity::Error),
                ("warn", Severity::Warning),
                ("warning", Severity::Warning),
                ("notice", Severity::Notice),
                ("info", Severity::Info),
                ("debug", Severity::Debug),
            ],
            true,
        );
        Ok(ProductProcessor::new(ParseRegexComplex::new(parsers))
            .then(HttpRequestNest)
            .then(severity_fields(Self::TYPE, severity).build()?))
    }

    // 프로세서로 쓰일 때는 줄 단위로 파싱하고, 수신기는 레벨 태그로 레코드를 나눕니다.
    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(anchored_rules(r"\[\w+\]"))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Couchdb>(registries)?;
    register_files_product::<CouchdbLogs>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_core::types::Platform;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn request_line_preview() {
        let p = CouchdbLogs::processor().unwrap();
        let record = p
            .inspect()
            .preview("[notice] 2021-12-02T23:36:42.555157Z nonode@nohost <0.17165.1> a5f585a0d3 localhost:5984 127.0.0.1 otelu PUT /oteld 201 ok 16")
            .unwrap();
        assert_eq!(record.fields["pid"], Value::from("0.17165.1"));
        assert_eq!(record.fields["http_request_requestMethod"], Value::from("PUT"));
        assert_eq!(record.fields["http_request_status"], Value::from(201));
    }

    #[test]
    fn general_line_falls_through_to_second_parser() {
        let p = CouchdbLogs::processor().unwrap();
        let record = p
            .inspect()
            .preview("[info] 2022-01-12T16:52:56.998128Z nonode@nohost <0.216.0> -------- Apache CouchDB has started. Time to relax.")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("info"));
        assert_eq!(record.fields["pid"], Value::from("0.216.0"));
        assert!(!record.fields.contains_key("http_request_status"));
    }

    #[test]
    fn processor_has_no_multiline_but_receiver_does() {
        let p = CouchdbLogs::processor().unwrap();
        assert!(p.inspect().multiline.is_none());

        let mut r = Registries::new();
        register(&mut r).unwrap();
        let receiver = r
            .logging_receivers
            .build(TYPE, serde_yaml::Value::Null, Platform::Linux)
            .unwrap();
        let rules = receiver.inspect().multiline.unwrap();
        assert_eq!(rules.rules()[0].regex, r"^\[\w+\]");
    }

    #[test]
    fn password_requires_username() {
        let body = serde_yaml::from_str("password: secret").unwrap();
        let r: Couchdb = parse_strict(body, Couchdb::FIELDS).unwrap();
        assert!(r.validate().is_err());
    }
}
