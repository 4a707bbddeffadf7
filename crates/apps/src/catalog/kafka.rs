//! Apache Kafka (JMX, 브로커 로그)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::Severity;
use opsconf_logging::{
    LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_metrics::processors::{metrics_filter, normalize_sums};
use opsconf_metrics::{
    MatchType, MetricsError, MetricsReceiver, Polarity, SharedCollectJvm, SharedJvm,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, workload_prefix,
};

const TYPE: &str = "kafka";
const DEFAULT_ENDPOINT: &str = "localhost:9999";

/// JMX 스크립트가 내보내는 것 중 수집할 메트릭
const KAFKA_METRICS: [&str; 10] = [
    "kafka.message.count",
    "kafka.request.count",
    "kafka.request.failed",
    "kafka.request.time.total",
    "kafka.network.io",
    "kafka.purgatory.size",
    "kafka.partition.count",
    "kafka.partition.offline",
    "kafka.partition.under_replicated",
    "kafka.isr.operation.count",
];

#[derive(Debug, Clone, Deserialize)]
struct Kafka {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Kafka {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Kafka {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![
                    metrics_filter(Polarity::Include, MatchType::Strict, KAFKA_METRICS)?,
                    normalize_sums(),
                    workload_prefix(),
                    scope(TYPE),
                ],
                &ctx.jmx_jar,
            ))
    }
}

// [2022-01-26 18:25:20,466] INFO Initiating client connection, connectString=localhost:2181 (org.apache.zookeeper.ZooKeeper)
// [2022-02-01 21:34:21,230] INFO [ExpirationReaper-0-Produce]: Starting (kafka.server.DelayedOperationPurgatory$ExpiredOperationReaper)
const LOG_REGEX: &str = r"^\[(?<time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+)\]\s+(?<level>[A-Z]+)(?:\s+\[(?<source>.*)\]:?)?\s+(?<message>[\s\S]*)(?=\s+\([\w\s\.\$]+\)$|\s+$)(?:\s+\((?<logger>[\w\s\.\$]+)\))?";

struct KafkaLogs;

impl FilesProduct for KafkaLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/kafka/*.log",
        "/opt/kafka/logs/server.log",
        "/opt/kafka/logs/controller.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(LOG_REGEX, ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L"))?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("TRACE", Severity::Trace),
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("ERROR", Severity::Error),
                ("WARN", Severity::Warning),
                ("FATAL", Severity::Critical),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(r"\[\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+\]"),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Kafka>(registries)?;
    register_files_product::<KafkaLogs>(registries)
}
