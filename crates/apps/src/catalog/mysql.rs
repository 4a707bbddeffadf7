//! MySQL / MariaDB (메트릭, 에러/일반/슬로우 쿼리 로그)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{
    LoggingError, ModifyField, ModifyFields, MultilineRule, ParseMultilineRegex,
    ParseRegexComplex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_logging::multiline::START_STATE;
use opsconf_metrics::processors::{
    metrics_transform, modify_instrumentation_scope, normalize_sums,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{MetricsError, MetricsReceiver, Operation, ReceiverShared, Transform};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, severity_fields, validate_endpoint,
};

const TYPE: &str = "mysql";
const DEFAULT_UNIX_ENDPOINT: &str = "/var/run/mysqld/mysqld.sock";
const DEFAULT_USERNAME: &str = "root";

/// 리시버 기본값과 다르게 켜고 끄는 메트릭
const METRIC_TOGGLES: [(&str, bool); 11] = [
    ("mysql.commands", true),
    ("mysql.index.io.wait.count", false),
    ("mysql.index.io.wait.time", false),
    ("mysql.mysqlx_connections", false),
    ("mysql.opened_resources", false),
    ("mysql.tmp_resources", false),
    ("mysql.prepared_statements", false),
    ("mysql.table.io.wait.count", false),
    ("mysql.table.io.wait.time", false),
    ("mysql.replica.sql_delay", true),
    ("mysql.replica.time_behind_source", true),
];

#[derive(Debug, Clone, Deserialize)]
struct Mysql {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
}

impl ProductMetrics for Mysql {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["endpoint", "username", "password"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())
    }
}

impl Mysql {
    /// `(endpoint, transport)`: 비어 있거나 `/`로 시작하면 유닉스 소켓
    fn endpoint_and_transport(&self) -> (&str, &'static str) {
        match self.endpoint.as_deref().filter(|e| !e.is_empty()) {
            None => (DEFAULT_UNIX_ENDPOINT, "unix"),
            Some(e) if e.starts_with('/') => (e, "unix"),
            Some(e) => (e, "tcp"),
        }
    }
}

impl MetricsReceiver for Mysql {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let (endpoint, transport) = self.endpoint_and_transport();
        let username = self
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_USERNAME);
        let toggles: serde_json::Map<String, serde_json::Value> = METRIC_TOGGLES
            .iter()
            .map(|(metric, enabled)| ((*metric).to_owned(), json!({ "enabled": enabled })))
            .collect();

        // 버퍼 풀 메트릭 이름과 타입은 이전 리시버 출력과 맞춥니다.
        let compat = vec![
            Transform::change_prefix(r"mysql\.buffer_pool\.", "mysql.buffer_pool_")?,
            Transform::update_metric("mysql.buffer_pool_pages")
                .with_operations(vec![Operation::ToggleScalarDataType]),
            Transform::update_metric("mysql.threads")
                .with_operations(vec![Operation::ToggleScalarDataType]),
            Transform::rename_metric("mysql.buffer_pool_usage", "mysql.buffer_pool_size")
                .with_operations(vec![
                    Operation::rename_label("status", "kind"),
                    Operation::ToggleScalarDataType,
                ]),
            Transform::add_prefix(WORKLOAD_PREFIX),
        ];

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                    "username": username,
                    "password": self.password.expose(),
                    "transport": transport,
                    "metrics": toggles,
                }),
            ),
            vec![
                normalize_sums(),
                metrics_transform(compat),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )])
    }
}

// ─── 시간 형식 ───────────────────────────────────────────────────────

// MySQL >= 5.7
const TIME_NEW: &str = r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}.\d+(?:Z|[+-]\d{2}:?\d{2})?";
const TIME_FORMAT_NEW: &str = "%Y-%m-%dT%H:%M:%S.%L%z";
// MySQL < 5.7, MariaDB < 10.1.4
const TIME_OLD: &str = r"\d{6}\s+\d{1,2}:\d{2}:\d{2}";
const TIME_FORMAT_OLD: &str = "%y%m%d %H:%M:%S";
// MariaDB >= 10.1.5 에러 로그
const TIME_MARIADB: &str = r"\d{4}-\d{2}-\d{2}\s+\d{1,2}:\d{2}:\d{2}";
const TIME_FORMAT_MARIADB: &str = "%Y-%m-%d %H:%M:%S";

// ─── mysql_error ─────────────────────────────────────────────────────

struct MysqlError;

impl FilesProduct for MysqlError {
    const TYPE: &'static str = "mysql_error";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/mysqld.log",
        "/var/log/mysql/mysqld.log",
        "/var/log/mysql/error.log",
        "/run/mysqld/mysqld.err",
        "/var/lib/mysql/${HOSTNAME}.err",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parsers = vec![
            // 2020-08-06T14:25:02.936146Z 0 [Warning] [MY-010068] [Server] CA certificate is self signed.
            RegexParser::new(
                &[
                    r"^(?<time>",
                    TIME_NEW,
                    r")\s+(?<tid>\d+)\s+\[(?<level>[^\]]+)\](?:\s+\[(?<errorCode>[^\]]+)\])?(?:\s+\[(?<subsystem>[^\]]+)\])?\s+(?<message>.*)$",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT_NEW).with_type("tid", FieldType::Integer),
            )?,
            // 160615 16:53:08 [Note] InnoDB: The InnoDB memory heap is disabled
            RegexParser::new(
                &[
                    r"^(?<time>",
                    TIME_OLD,
                    r")\s+\[(?<level>[^\]]+)\]\s+(?<message>.*)$",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT_OLD),
            )?,
            // 2016-06-15  1:53:33 139651251140544 [Note] InnoDB: The InnoDB memory heap is disabled
            RegexParser::new(
                &[
                    r"^(?<time>",
                    TIME_MARIADB,
                    r")(?:\s+(?<tid>\d+))?(?:\s+\[(?<level>[^\]]+)\])?\s+(?<message>.*)$",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT_MARIADB).with_type("tid", FieldType::Integer),
            )?,
        ];
        let severity = SeverityTable::new(
            "level",
            &[
                ("ERROR", Severity::Error),
                ("Error", Severity::Error),
                ("WARNING", Severity::Warning),
                ("Warning", Severity::Warning),
                ("SYSTEM", Severity::Info),
                ("System", Severity::Info),
                ("NOTE", Severity::Notice),
                ("Note", Severity::Notice),
            ],
            true,
        );
        Ok(ProductProcessor::new(ParseRegexComplex::new(parsers))
            .then(severity_fields(Self::TYPE, severity).build()?))
    }
}

// ─── mysql_general ───────────────────────────────────────────────────

struct MysqlGeneral;

impl FilesProduct for MysqlGeneral {
    const TYPE: &'static str = "mysql_general";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/lib/mysql/${HOSTNAME}.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parsers = vec![
            // 2021-10-12T01:12:37.733135Z        14 Query     select @@version_comment limit 1
            RegexParser::new(
                &[
                    r"^(?<time>",
                    TIME_NEW,
                    r")\s+(?<tid>\d+)\s+(?<command>\w+)(\s+(?<message>[\s|\S]*))?",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT_NEW).with_type("tid", FieldType::Integer),
            )?,
            // MariaDB: 시간이 이전 줄과 같으면 탭으로 대체됩니다.
            RegexParser::new(
                &[
                    r"^((?<time>",
                    TIME_OLD,
                    r")|\t)\s+(?<tid>\d+)\s+(?<command>\w+)(\s+(?<message>[\s|\S]*))?",
                ]
                .concat(),
                ParserShared::new("time", TIME_FORMAT_OLD).with_type("tid", FieldType::Integer),
            )?,
        ];
        let start = ["(", TIME_NEW, "|", TIME_OLD, r"|\t\t)"].concat();
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(anchored_rules(&start), parsers)?)
                .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?),
        )
    }
}

// ─── mysql_slow ──────────────────────────────────────────────────────

/// MySQL 8.0.14+ 통계 필드 (`log_slow_extra`가 켜져 있으면 뒤쪽 필드가 붙습니다)
const NEW_SLOW_FIELDS: [&str; 24] = [
    r"\s+Query_time:\s+(?<queryTime>[\d\.]+)",
    r"\s+Lock_time:\s+(?<lockTime>[\d\.]+)",
    r"\s+Rows_sent:\s+(?<rowsSent>\d+)",
    r"\s+Rows_examined:\s(?<rowsExamined>\d+)",
    r"(?:\s+Thread_id:\s+\d+)?",
    r"(?:\s+Errno:\s(?<errorNumber>\d+))?",
    r"(?:\s+Killed:\s(?<killed>\d+))?",
    r"(?:\s+Bytes_received:\s(?<bytesReceived>\d+))?",
    r"(?:\s+Bytes_sent:\s(?<bytesSent>\d+))?",
    r"(?:\s+Read_first:\s(?<readFirst>\d+))?",
    r"(?:\s+Read_last:\s(?<readLast>\d+))?",
    r"(?:\s+Read_key:\s(?<readKey>\d+))?",
    r"(?:\s+Read_next:\s(?<readNext>\d+))?",
    r"(?:\s+Read_prev:\s(?<readPrev>\d+))?",
    r"(?:\s+Read_rnd:\s(?<readRnd>\d+))?",
    r"(?:\s+Read_rnd_next:\s(?<readRndNext>\d+))?",
    r"(?:\s+Sort_merge_passes:\s(?<sortMergePasses>\d+))?",
    r"(?:\s+Sort_range_count:\s(?<sortRangeCount>\d+))?",
    r"(?:\s+Sort_rows:\s(?<sortRows>\d+))?",
    r"(?:\s+Sort_scan_count:\s(?<sortScanCount>\d+))?",
    r"(?:\s+Created_tmp_disk_tables:\s(?<createdTmpDiskTables>\d+))?",
    r"(?:\s+Created_tmp_tables:\s(?<createdTmpTables>\d+))?",
    r"(?:\s+Start:\s(?<startTime>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}.\d+Z))?",
    r"(?:\s+End:\s(?<endTime>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}.\d+Z))?",
];

const NEW_SLOW_INTEGERS: [&str; 20] = [
    "tid",
    "rowsSent",
    "rowsExamined",
    "errorNumber",
    "killed",
    "bytesReceived",
    "bytesSent",
    "readFirst",
    "readLast",
    "readKey",
    "readNext",
    "readPrev",
    "readRnd",
    "readRndNext",
    "sortMergePasses",
    "sortRangeCount",
    "sortRows",
    "sortScanCount",
    "createdTmpDiskTables",
    "createdTmpTables",
];

#[derive(Debug, Clone, Copy)]
enum SlowValue {
    Float,
    Integer,
    YesNo,
    Pattern(&'static str),
}

impl SlowValue {
    fn pattern(self) -> &'static str {
        match self {
            Self::Float => r"[\d\.]+",
            Self::Integer => r"\d+",
            Self::YesNo => "Yes|No",
            Self::Pattern(p) => p,
        }
    }
}

/// 이전 MySQL / MariaDB 주석 줄: `(식별자, JSON 필드, 값)`
///
/// JSON 필드가 비어 있으면 값을 캡처하지 않습니다.
const OLD_SLOW_LINES: &[&[(&str, &str, SlowValue)]] = &[
    &[
        ("Thread_id", "tid", SlowValue::Integer),
        ("Schema", "database", SlowValue::Pattern(r"\S*")),
        ("QC_hit", "queryCacheHit", SlowValue::YesNo),
    ],
    &[
        ("Query_time", "queryTime", SlowValue::Float),
        ("Lock_time", "lockTime", SlowValue::Float),
        ("Rows_sent", "rowsSent", SlowValue::Integer),
        ("Rows_examined", "rowsExamined", SlowValue::Integer),
    ],
    &[
        ("Rows_affected", "rowsAffected", SlowValue::Integer),
        ("Bytes_sent", "bytesSent", SlowValue::Integer),
    ],
    &[
        ("Tmp_tables", "createdTmpTables", SlowValue::Integer),
        ("Tmp_disk_tables", "createdTmpDiskTables", SlowValue::Integer),
        ("Tmp_table_sizes", "createdTmpTableSizes", SlowValue::Integer),
    ],
    &[("Stored_routine", "storedRoutine", SlowValue::Pattern(r"\S+"))],
    &[
        ("Full_scan", "fullScan", SlowValue::YesNo),
        ("Full_join", "fullJoin", SlowValue::YesNo),
        ("Tmp_table", "", SlowValue::YesNo),
        ("Tmp_table_on_disk", "", SlowValue::YesNo),
    ],
    &[
        ("Filesort", "filesort", SlowValue::YesNo),
        ("Filesort_on_disk", "filesortOnDisk", SlowValue::YesNo),
        ("Merge_passes", "sortMergePasses", SlowValue::Integer),
        ("Priority_queue", "priorityQueue", SlowValue::YesNo),
    ],
];

fn new_slow_parser() -> Result<RegexParser, LoggingError> {
    let fields = NEW_SLOW_FIELDS.concat();
    let regex = [
        r"^(?:# Time: (?<time>",
        TIME_NEW,
        r")\s)?# User@Host:\s+(?<user>[^\[]*)\[(?<database>[^\]]*)\]\s+@\s+((?<host>[^\s]+)\s)?\[(?:(?<ipAddress>[\w\d\.:]+)?)\]\s+Id:\s+(?<tid>\d+)\s+#",
        fields.as_str(),
        r"\s+(?<message>[\s\S]+)",
    ]
    .concat();
    let shared = NEW_SLOW_INTEGERS.iter().fold(
        ParserShared::new("time", TIME_FORMAT_NEW)
            .with_type("queryTime", FieldType::Float)
            .with_type("lockTime", FieldType::Float),
        |shared, field| shared.with_type(field, FieldType::Integer),
    );
    RegexParser::new(&regex, shared)
}

/// 이전 형식 파서와 Yes/No 불리언 필드 목록
fn old_slow_parser() -> Result<(RegexParser, Vec<&'static str>), LoggingError> {
    let mut regex = [
        r"^(?:# Time: (?<time>",
        TIME_OLD,
        r")\s)?# User@Host:\s+(?<user>[^\[]*)\[[^\]]*\]\s+@\s+((?<host>[^\s]+)\s)?\[(?:(?<ipAddress>[\w\d\.:]+)?)\]",
    ]
    .concat();
    let mut shared = ParserShared::new("time", TIME_FORMAT_OLD);
    let mut booleans = Vec::new();

    for line in OLD_SLOW_LINES {
        let mut fields = String::new();
        for (idx, (identifier, json_field, value)) in line.iter().enumerate() {
            let pattern = value.pattern();
            let value_regex = if json_field.is_empty() {
                format!("(?:{pattern})")
            } else {
                match value {
                    SlowValue::Float => shared = shared.with_type(json_field, FieldType::Float),
                    SlowValue::Integer => shared = shared.with_type(json_field, FieldType::Integer),
                    SlowValue::YesNo => booleans.push(*json_field),
                    SlowValue::Pattern(_) => {}
                }
                format!("(?<{json_field}>{pattern})")
            };
            // 줄의 첫 필드는 필수 (다음 줄의 "# "를 먹지 않도록)
            let optional = if idx == 0 { "" } else { "?" };
            fields.push_str(&format!(r"(?:\s+{identifier}:\s{value_regex}){optional}"));
        }
        regex.push_str(&format!(r"(?:\s+#{fields})?"));
    }
    regex.push_str(r"\s+(?<message>[\s\S]+)");

    Ok((RegexParser::new(&regex, shared)?, booleans))
}

struct MysqlSlow;

impl FilesProduct for MysqlSlow {
    const TYPE: &'static str = "mysql_slow";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/lib/mysql/${HOSTNAME}-slow.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let (old, booleans) = old_slow_parser()?;
        let header = ["# (User@Host: |Time: (", TIME_NEW, "|", TIME_OLD, "))"].concat();
        let rules = vec![
            MultilineRule::new(START_STATE, format!("^{header}"), "comment"),
            MultilineRule::new("comment", "^# ", "cont"),
            MultilineRule::new("cont", format!("^(?!{header})"), "cont"),
        ];

        let modify = booleans.into_iter().fold(
            ModifyFields::new().with_instrumentation_source(Self::TYPE),
            |modify, field| {
                modify.field(
                    format!("jsonPayload.{field}"),
                    ModifyField {
                        field_type: Some(FieldType::YesNoBoolean),
                        ..ModifyField::default()
                    },
                )
            },
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(rules, vec![new_slow_parser()?, old])?)
                .then(modify.build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Mysql>(registries)?;
    register_files_product::<MysqlError>(registries)?;
    register_files_product::<MysqlGeneral>(registries)?;
    register_files_product::<MysqlSlow>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    fn metrics(yaml: &str) -> Vec<ReceiverPipeline> {
        let body = serde_yaml::from_str(yaml).unwrap();
        let r: Mysql = parse_strict(body, Mysql::FIELDS).unwrap();
        r.validate().unwrap();
        r.pipelines(&GenContext::default()).unwrap()
    }

    #[test]
    fn empty_endpoint_uses_unix_socket_and_root() {
        let pipelines = metrics("{}");
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["endpoint"], DEFAULT_UNIX_ENDPOINT);
        assert_eq!(config["transport"], "unix");
        assert_eq!(config["username"], "root");
        assert_eq!(config["metrics"]["mysql.commands"]["enabled"], true);
        assert_eq!(config["metrics"]["mysql.tmp_resources"]["enabled"], false);
    }

    #[test]
    fn host_port_endpoint_uses_tcp() {
        let pipelines = metrics("endpoint: localhost:3306\nusername: admin\npassword: pw");
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["transport"], "tcp");
        assert_eq!(config["username"], "admin");
        assert_eq!(config["password"], "pw");
        let processors = &pipelines[0].processors["metrics"];
        assert_eq!(processors[2].type_name, "modifyscope");
    }

    #[test]
    fn error_log_new_format_preview() {
        let p = MysqlError::processor().unwrap();
        let record = p
            .inspect()
            .preview("2020-08-06T14:25:02.936146Z 0 [Warning] [MY-010068] [Server] CA certificate /var/mysql/sslinfo/cacert.pem is self signed.")
            .unwrap();
        assert_eq!(record.fields["tid"], Value::from(0));
        assert_eq!(record.fields["level"], Value::from("Warning"));
        assert_eq!(record.fields["errorCode"], Value::from("MY-010068"));
        assert_eq!(record.fields["subsystem"], Value::from("Server"));
        let ts = record.timestamp.expect("microsecond Z timestamp parses");
        assert_eq!(ts.timestamp_subsec_micros(), 936_146);
    }

    #[test]
    fn error_log_old_format_preview() {
        let p = MysqlError::processor().unwrap();
        let record = p
            .inspect()
            .preview("160615 16:53:08 [Note] InnoDB: The InnoDB memory heap is disabled")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("Note"));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn slow_query_new_format_preview() {
        let p = MysqlSlow::processor().unwrap();
        let entry = "# Time: 2021-10-12T01:13:38.132884Z\n# User@Host: root[root] @ localhost []  Id:    15\n# Query_time: 0.001855  Lock_time: 0.000000 Rows_sent: 0  Rows_examined: 0\nSET timestamp=1634001218;\nSET GLOBAL slow_query_log = 1;";
        let record = p.inspect().preview(entry).unwrap();
        assert_eq!(record.fields["user"], Value::from("root"));
        assert_eq!(record.fields["host"], Value::from("localhost"));
        assert_eq!(record.fields["tid"], Value::from(15));
        assert_eq!(record.fields["queryTime"], Value::from(0.001855));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn slow_query_mariadb_format_preview() {
        let p = MysqlSlow::processor().unwrap();
        let entry = "# User@Host: root[root] @ localhost []\n# Thread_id: 32  Schema: dbt3sf1  QC_hit: No\n# Query_time: 0.000130  Lock_time: 0.000068  Rows_sent: 0  Rows_examined: 0\n# Rows_affected: 0  Bytes_sent: 1351\nSET timestamp=1689286831;\nSELECT 1;";
        let record = p.inspect().preview(entry).unwrap();
        assert_eq!(record.fields["tid"], Value::from(32));
        assert_eq!(record.fields["database"], Value::from("dbt3sf1"));
        assert_eq!(record.fields["bytesSent"], Value::from(1351));
        assert_eq!(record.fields["queryCacheHit"], Value::from("No"));
    }

    #[test]
    fn slow_query_booleans_are_converted() {
        let (_, booleans) = old_slow_parser().unwrap();
        assert!(booleans.contains(&"queryCacheHit"));
        assert!(booleans.contains(&"priorityQueue"));
        assert_eq!(booleans.len(), 6);
    }

    #[test]
    fn slow_query_rules_consume_comment_line() {
        let p = MysqlSlow::processor().unwrap();
        let rules = p.inspect().multiline.unwrap();
        let names: Vec<&str> = rules.rules().iter().map(|r| r.next_state.as_str()).collect();
        assert_eq!(names, ["comment", "cont", "cont"]);
    }
}
