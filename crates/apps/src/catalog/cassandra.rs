//! Apache Cassandra (JMX, 시스템/디버그/GC 로그)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::{
    LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedCollectJvm, SharedJvm};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, workload_prefix,
};

const TYPE: &str = "cassandra";
const DEFAULT_ENDPOINT: &str = "localhost:7199";

#[derive(Debug, Clone, Deserialize)]
struct Cassandra {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Cassandra {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Cassandra {
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

// ─── 로그 ────────────────────────────────────────────────────────────

// INFO  [main] 2021-10-07 10:14:58,281 IndexSummaryManager.java:103 - Redistributing index summaries
const JAVA_REGEX: &str = r"^(?<level>[A-Z]+)\s+\[(?<module>[^\]]+)\]\s+(?<time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+)\s+(?<message>(?:(?<javaClass>[\w\.]+):(?<lineNumber>\d+))?[\S\s]+)";
const JAVA_START: &str = r"[A-Z]+\s+\[[^\]]+\] \d+";

/// 시스템/디버그 로그가 공유하는 자바 로그 프로세서
fn java_log(type_id: &str) -> Result<ProductProcessor, LoggingError> {
    let parser = RegexParser::new(
        JAVA_REGEX,
        ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L")
            .with_type("lineNumber", FieldType::Integer),
    )?;
    let severity = SeverityTable::new(
        "level",
        &[
            ("TRACE", Severity::Trace),
            ("DEBUG", Severity::Debug),
            ("INFO", Severity::Info),
            ("ERROR", Severity::Error),
            ("WARN", Severity::Warning),
        ],
        true,
    );
    Ok(
        ProductProcessor::multiline(ParseMultilineRegex::new(
            anchored_rules(JAVA_START),
            vec![parser],
        )?)
        .then(severity_fields(type_id, severity).build()?),
    )
}

struct CassandraSystem;

impl FilesProduct for CassandraSystem {
    const TYPE: &'static str = "cassandra_system";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/cassandra/system*.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        java_log(Self::TYPE)
    }
}

struct CassandraDebug;

impl FilesProduct for CassandraDebug {
    const TYPE: &'static str = "cassandra_debug";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/cassandra/debug*.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        java_log(Self::TYPE)
    }
}

const GC_TIME: &str = r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3,6}(?:Z|[+-]\d{2}:?\d{2})";
const GC_MESSAGE: &str = r"(?<message>(?:Total time for which application threads were stopped: (?<timeStopped>\d+\.\d+) seconds, Stopping threads took: (?<timeStopping>\d+\.\d+)[\s\S]*|[\s\S]+))";

struct CassandraGc;

impl FilesProduct for CassandraGc {
    const TYPE: &'static str = "cassandra_gc";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/cassandra/gc.log.*.current",
        "/var/log/cassandra/gc.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let time_format = "%Y-%m-%dT%H:%M:%S.%L%z";
        // Java 8: 2021-10-02T04:18:28.284+0000: 3.315: Total time for which ...
        let java8 = RegexParser::new(
            &format!(r"^(?<time>{GC_TIME}):\s+(?<uptime>\d+\.\d{{3,6}}):\s+{GC_MESSAGE}"),
            ParserShared::new("time", time_format)
                .with_type("uptime", FieldType::Float)
                .with_type("timeStopped", FieldType::Float)
                .with_type("timeStopping", FieldType::Float),
        )?;
        // Java 11: [2021-10-02T04:18:28.284+0000][3.315s][1234][5678][info ] Total time ...
        let java11 = RegexParser::new(
            &format!(
                r"^\[(?<time>{GC_TIME})\]\s?\[(?<uptime>\d+\.\d{{3,6}})s?\]\s?\[(?<pid>\d+)\]\s?\[(?<tid>\d+)\]\s?\[(?<level>\w+)\s?\]\s?{GC_MESSAGE}"
            ),
            ParserShared::new("time", time_format)
                .with_type("uptime", FieldType::Float)
                .with_type("pid", FieldType::Integer)
                .with_type("tid", FieldType::Integer)
                .with_type("timeStopped", FieldType::Float)
                .with_type("timeStopping", FieldType::Float),
        )?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("develop", Severity::Trace),
                ("trace", Severity::Trace),
                ("debug", Severity::Debug),
                ("info", Severity::Info),
                ("error", Severity::Error),
                ("warning", Severity::Warning),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(r"\[?\d{4}-\d{2}-\d{2}"),
                vec![java8, java11],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Cassandra>(registries)?;
    register_files_product::<CassandraSystem>(registries)?;
    register_files_product::<CassandraDebug>(registries)?;
    register_files_product::<CassandraGc>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use serde_json::Value;

    #[test]
    fn system_preview_extracts_java_class() {
        let p = CassandraSystem::processor().unwrap();
        let record = p
            .inspect()
            .preview("INFO  [main] 2021-10-07 10:14:58,281 IndexSummaryManager.java:103 - Redistributing index summaries")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("INFO"));
        assert_eq!(record.fields["module"], Value::from("main"));
        assert_eq!(record.fields["javaClass"], Value::from("IndexSummaryManager.java"));
        assert_eq!(record.fields["lineNumber"], Value::from(103));
    }

    #[test]
    fn gc_java8_preview_types_floats() {
        let p = CassandraGc::processor().unwrap();
        let record = p
            .inspect()
            .preview("2021-10-02T04:18:28.284+0000: 3.315: Total time for which application threads were stopped: 0.0002000 seconds, Stopping threads took: 0.0000141 seconds")
            .unwrap();
        assert_eq!(record.fields["uptime"], Value::from(3.315));
        assert_eq!(record.fields["timeStopped"], Value::from(0.0002));
    }

    #[test]
    fn gc_java11_preview_reads_level() {
        let p = CassandraGc::processor().unwrap();
        let record = p
            .inspect()
            .preview("[2021-10-02T04:18:28.284+0000][3.315s][1234][5678][info ] Using G1")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("info"));
        assert_eq!(record.fields["pid"], Value::from(1234));
    }

    #[test]
    fn metrics_default_endpoint() {
        let r: Cassandra =
            opsconf_metrics::shared::parse_strict(serde_yaml::Value::Null, Cassandra::FIELDS)
                .unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(
            pipelines[0].receiver.config["endpoint"],
            "service:jmx:rmi:///jndi/rmi://localhost:7199/jmxrmi"
        );
    }
}
