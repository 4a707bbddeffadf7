//! Apache ZooKeeper

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::{
    LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_metrics::processors::{metrics_remove_service_attributes, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, validate_endpoint,
    workload_prefix,
};

const TYPE: &str = "zookeeper";
const DEFAULT_ENDPOINT: &str = "localhost:2181";

#[derive(Debug, Clone, Deserialize)]
struct Zookeeper {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
}

impl ProductMetrics for Zookeeper {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS, &["endpoint"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())
    }
}

impl MetricsReceiver for Zookeeper {
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
                }),
            ),
            vec![
                normalize_sums(),
                workload_prefix(),
                scope(TYPE),
                metrics_remove_service_attributes(),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-01-31 17:51:45,451 [myid:1] - INFO  [NIOWorkerThread-3:NIOServerCnxn@514] - Processing mntr command
const MYID_REGEX: &str = r"^(?<time>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2},\d{3})\s\[myid:(?<myid>\d+)?\]\s-\s(?<level>\w+)\s+\[(?<thread>.+):(?<source>.+)@(?<line>\d+)\]\s+-\s*(?<message>[\S\s]*)";
// 2022-01-31 17:51:45,451 - INFO  [NIOWorkerThread-3:NIOServerCnxn@514] - Processing mntr command
const PLAIN_REGEX: &str = r"^(?<time>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2},\d{3})\s-\s(?<level>\w+)\s+\[(?<thread>.+):(?<source>.+)@(?<line>\d+)\]\s+-\s*(?<message>[\S\s]*)";
const LINE_START: &str = r"\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2},\d{3}";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%L";

struct ZookeeperGeneral;

impl FilesProduct for ZookeeperGeneral {
    const TYPE: &'static str = "zookeeper_general";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/zookeeper/logs/zookeeper-*.out",
        "/var/log/zookeeper/zookeeper.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        // thread/source는 숫자처럼 보여도 문자열로 유지
        let typed = || {
            ParserShared::new("time", TIME_FORMAT)
                .with_type("thread", FieldType::String)
                .with_type("source", FieldType::String)
                .with_type("line", FieldType::Integer)
        };
        let with_myid = RegexParser::new(MYID_REGEX, typed().with_type("myid", FieldType::Integer))?;
        let plain = RegexParser::new(PLAIN_REGEX, typed())?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("TRACE", Severity::Debug),
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("WARN", Severity::Warning),
                ("ERROR", Severity::Error),
                ("CRITICAL", Severity::Error),
                ("FATAL", Severity::Fatal),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(LINE_START),
                vec![with_myid, plain],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Zookeeper>(registries)?;
    register_files_product::<ZookeeperGeneral>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn default_endpoint() {
        let r: Zookeeper = parse_strict(serde_yaml::Value::Null, Zookeeper::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(pipelines[0].receiver.config["endpoint"], DEFAULT_ENDPOINT);
        assert_eq!(pipelines[0].processors["metrics"].len(), 4);
    }

    #[test]
    fn rejects_bad_endpoint() {
        let body = serde_yaml::from_str("endpoint: not a host").unwrap();
        let r: Zookeeper = parse_strict(body, Zookeeper::FIELDS).unwrap();
        assert!(r.validate().is_err());
    }

    #[test]
    fn myid_line_preview() {
        let p = ZookeeperGeneral::processor().unwrap();
        let record = p
            .inspect()
            .preview("2022-01-31 17:51:45,451 [myid:1] - INFO  [NIOWorkerThread-3:NIOServerCnxn@514] - Processing mntr command from /0:0:0:0:0:0:0:1:50284")
            .unwrap();
        assert_eq!(record.fields["myid"], Value::from(1));
        assert_eq!(record.fields["thread"], Value::from("NIOWorkerThread-3"));
        assert_eq!(record.fields["source"], Value::from("NIOServerCnxn"));
        assert_eq!(record.fields["line"], Value::from(514));
    }

    #[test]
    fn plain_line_falls_through_to_second_parser() {
        let p = ZookeeperGeneral::processor().unwrap();
        let record = p
            .inspect()
            .preview("2022-02-01 00:46:33,626 - WARN  [SendWorker:2:QuorumCnxManager$SendWorker@1283] - Interrupted while waiting for message on queue")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("WARN"));
        assert!(!record.fields.contains_key("myid"));
        assert_eq!(record.fields["line"], Value::from(1283));
    }
}
