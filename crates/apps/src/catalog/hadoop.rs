//! Apache Hadoop (JMX)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::Severity;
use opsconf_logging::{LoggingError, MultilineRule, ParseRegex, ParserShared, SeverityTable};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedCollectJvm, SharedJvm};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, severity_fields, workload_prefix,
};

const TYPE: &str = "hadoop";
const DEFAULT_ENDPOINT: &str = "localhost:8004";

#[derive(Debug, Clone, Deserialize)]
struct Hadoop {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Hadoop {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Hadoop {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![normalize_sums(), workload_prefix()],
                &ctx.jmx_jar,
            ))
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-02-01 18:09:47,136 INFO org.apache.hadoop.hdfs.server.namenode.NameNode: STARTUP_MSG:
const LOG_REGEX: &str = r"(?<timestamp>\d+-\d+-\d+ \d+:\d+:\d+,\d+)\s+(?<severity>\w+)\s+(?<source>\S+):\s+(?<message>[\S\s]*)";

struct HadoopLogs;

impl FilesProduct for HadoopLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/hadoop/logs/hadoop-*.log",
        "/opt/hadoop/logs/yarn-*.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            LOG_REGEX,
            ParserShared::new("timestamp", "%Y-%m-%d %H:%M:%S,%L"),
        )?;
        let severity = SeverityTable::new(
            "severity",
            &[
                ("TRACE", Severity::Debug),
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("WARN", Severity::Warning),
                ("DEPRECATION", Severity::Warning),
                ("ERROR", Severity::Error),
                ("CRITICAL", Severity::Error),
                ("FATAL", Severity::Fatal),
            ],
            false,
        );
        Ok(ProductProcessor::new(parse).then(severity_fields(Self::TYPE, severity).build()?))
    }

    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(anchored_rules(r"\d+-\d+-\d+ \d+:\d+:\d+,\d+"))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Hadoop>(registries)?;
    register_files_product::<HadoopLogs>(registries)
}
