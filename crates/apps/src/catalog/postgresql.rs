//! PostgreSQL

use serde::Deserialize;
use serde_json::{Map, Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{
    LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_metrics::processors::{
    agent_scope, convert_float_to_int, flatten_resource_attribute, metrics_remove_service_attributes,
    metrics_transform, normalize_sums, set_name, transformation_metrics,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{
    MetricsError, MetricsReceiver, Operation, ReceiverShared, SharedTls, Transform,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, severity_fields, validate_endpoint,
};

const TYPE: &str = "postgresql";
/// 실제 소켓은 `/var/run/postgresql/.s.PGSQL.5432`이지만 리시버는 `dir:port` 형태를 기대합니다.
const DEFAULT_UNIX_ENDPOINT: &str = "var/run/postgresql/:5432";

#[derive(Debug, Clone, Deserialize)]
struct Postgresql {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
    #[serde(default)]
    databases: Vec<String>,
}

impl ProductMetrics for Postgresql {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        ReceiverShared::FIELDS,
        SharedTls::FIELDS,
        &["endpoint", "username", "password", "databases"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())
    }
}

/// `(endpoint, transport)`
///
/// 소켓 파일 경로 `/dir/.s.PGSQL.<port>`는 `dir/:<port>`로 바꿉니다.
fn endpoint_and_transport(endpoint: Option<&str>) -> (String, &'static str) {
    match endpoint.filter(|e| !e.is_empty()) {
        None => (DEFAULT_UNIX_ENDPOINT.to_owned(), "unix"),
        Some(e) if e.starts_with('/') => {
            let mut parts = e.split('.');
            let dir = parts.next().unwrap_or_default().trim_start_matches('/');
            let port = parts.next_back().unwrap_or_default();
            (format!("{dir}:{port}"), "unix")
        }
        Some(e) => (e.to_owned(), "tcp"),
    }
}

impl MetricsReceiver for Postgresql {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let (endpoint, transport) = endpoint_and_transport(self.endpoint.as_deref());

        let mut config = Map::new();
        config.insert(
            "collection_interval".to_owned(),
            json!(self.shared.collection_interval_string()),
        );
        config.insert("endpoint".to_owned(), json!(endpoint));
        config.insert(
            "username".to_owned(),
            json!(self.username.as_deref().unwrap_or_default()),
        );
        config.insert("password".to_owned(), json!(self.password.expose()));
        config.insert("transport".to_owned(), json!(transport));
        config.insert(
            "metrics".to_owned(),
            json!({
                "postgresql.wal.delay": { "enabled": true },
                "postgresql.wal.lag": { "enabled": false },
            }),
        );
        if transport == "tcp" {
            config.insert("tls".to_owned(), self.tls.tls_config(true));
        }
        if !self.databases.is_empty() {
            config.insert("databases".to_owned(), json!(self.databases));
        }

        let [scope_name, scope_version] = agent_scope(TYPE);
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(TYPE, Value::Object(config)),
            vec![
                normalize_sums(),
                // 실수형 wal.delay를 정수형 wal.lag로 되돌립니다. 두 메트릭은 함께 나오지 않습니다.
                transformation_metrics([
                    flatten_resource_attribute("postgresql.database.name", "database"),
                    flatten_resource_attribute("postgresql.table.name", "table"),
                    flatten_resource_attribute("postgresql.index.name", "index"),
                    convert_float_to_int("postgresql.wal.delay"),
                    set_name("postgresql.wal.delay", "postgresql.wal.lag"),
                    scope_name,
                    scope_version,
                ]),
                metrics_transform(vec![
                    Transform::update_metric("postgresql.bgwriter.duration")
                        .with_operations(vec![Operation::ToggleScalarDataType]),
                    Transform::add_prefix(WORKLOAD_PREFIX),
                ]),
                metrics_remove_service_attributes(),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

const LINE_START: &str = r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{3,} \w+";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S.%L %z";

struct PostgresqlGeneral;

impl FilesProduct for PostgresqlGeneral {
    const TYPE: &'static str = "postgresql_general";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/postgresql/postgresql*.log",
        "/var/lib/pgsql/data/log/postgresql*.log",
        "/var/lib/pgsql/*/data/log/postgresql*.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parsers = vec![
            // log_line_prefix = '%m [%p] %q%u@%d '
            // 2022-01-12 20:59:25.169 UTC [27445] postgres@postgres FATAL:  Peer authentication failed for user "postgres"
            RegexParser::new(
                &[
                    r"^(?<time>",
                    LINE_START,
                    r")\s*\[(?<tid>\d+)\](?:\s+(?<user>\S*)@(?<database>\S*))?\s*(?<level>\w+):\s+(?<message>[\s\S]*)",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT).with_type("tid", FieldType::Integer),
            )?,
            // log_line_prefix = '%m %d %u [%p]' (SLES)
            // 2024-05-30 15:34:26.572 UTC postgres postgres [23958]STATEMENT:  INSERT INTO test2 (id) VALUES('1');
            RegexParser::new(
                &[
                    r"^(?<time>",
                    LINE_START,
                    r")\s*(?:\s+(?<database>\S*)\s+(?<user>\S*))?\s*\[(?<tid>\d+)\]\s*(?<level>\w+):\s+(?<message>[\s\S]*)",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT).with_type("tid", FieldType::Integer),
            )?,
        ];
        let severity = SeverityTable::new(
            "level",
            &[
                ("DEBUG1", Severity::Debug),
                ("DEBUG2", Severity::Debug),
                ("DEBUG3", Severity::Debug),
                ("DEBUG4", Severity::Debug),
                ("DEBUG5", Severity::Debug),
                ("DETAIL", Severity::Debug),
                ("STATEMENT", Severity::Debug),
                ("INFO", Severity::Info),
                ("LOG", Severity::Info),
                ("NOTICE", Severity::Info),
                ("ERROR", Severity::Error),
                ("WARNING", Severity::Warning),
                ("FATAL", Severity::Critical),
                ("PANIC", Severity::Critical),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(LINE_START),
                parsers,
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Postgresql>(registries)?;
    register_files_product::<PostgresqlGeneral>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;

    fn pipeline(yaml: &str) -> ReceiverPipeline {
        let body = serde_yaml::from_str(yaml).unwrap();
        let r: Postgresql = parse_strict(body, Postgresql::FIELDS).unwrap();
        r.validate().unwrap();
        r.pipelines(&GenContext::default()).unwrap().remove(0)
    }

    #[test]
    fn socket_path_is_rewritten() {
        assert_eq!(
            endpoint_and_transport(Some("/var/run/postgresql/.s.PGSQL.5432")),
            ("var/run/postgresql/:5432".to_owned(), "unix")
        );
        assert_eq!(
            endpoint_and_transport(None),
            (DEFAULT_UNIX_ENDPOINT.to_owned(), "unix")
        );
        assert_eq!(
            endpoint_and_transport(Some("db:5432")),
            ("db:5432".to_owned(), "tcp")
        );
    }

    #[test]
    fn tls_only_for_tcp() {
        let unix = pipeline("{}");
        assert!(unix.receiver.config.get("tls").is_none());

        let tcp = pipeline("endpoint: localhost:5432\ninsecure: false\nca_file: /ca.pem");
        assert_eq!(tcp.receiver.config["tls"]["insecure"], false);
        assert_eq!(tcp.receiver.config["tls"]["ca_file"], "/ca.pem");
    }

    #[test]
    fn databases_emitted_when_set() {
        let p = pipeline("databases: [app, audit]");
        assert_eq!(p.receiver.config["databases"][1], "audit");
        assert!(pipeline("{}").receiver.config.get("databases").is_none());
    }

    #[test]
    fn general_log_preview_with_user_and_database() {
        let p = PostgresqlGeneral::processor().unwrap();
        let record = p
            .inspect()
            .preview(r#"2022-01-12 20:59:25.169 UTC [27445] postgres@postgres FATAL:  Peer authentication failed for user "postgres""#)
            .unwrap();
        assert_eq!(record.fields["tid"], serde_json::Value::from(27445));
        assert_eq!(record.fields["user"], serde_json::Value::from("postgres"));
        assert_eq!(record.fields["level"], serde_json::Value::from("FATAL"));
    }

    #[test]
    fn sles_prefix_preview() {
        let p = PostgresqlGeneral::processor().unwrap();
        let record = p
            .inspect()
            .preview("2024-05-30 15:34:26.572 UTC postgres postgres [23958]STATEMENT:  INSERT INTO test2 (id) VALUES('1');")
            .unwrap();
        assert_eq!(record.fields["level"], serde_json::Value::from("STATEMENT"));
        assert_eq!(record.fields["database"], serde_json::Value::from("postgres"));
    }
}
