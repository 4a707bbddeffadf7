//! Apache Flink

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::Severity;
use opsconf_logging::{LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable};
use opsconf_metrics::processors::{
    flatten_resource_attribute, metrics_transform, modify_instrumentation_scope, normalize_sums,
    transformation_metrics,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{MetricsError, MetricsReceiver, Operation, ReceiverShared, Transform};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, severity_fields,
};

const TYPE: &str = "flink";
const DEFAULT_ENDPOINT: &str = "http://localhost:8081";

#[derive(Debug, Clone, Deserialize)]
struct Flink {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
}

impl ProductMetrics for Flink {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS, &["endpoint"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        match self.endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) if !endpoint.starts_with("http:") => Err(MetricsError::parameter(
                "endpoint",
                format!("{endpoint:?} must be an http: URL"),
            )),
            _ => Ok(()),
        }
    }
}

impl MetricsReceiver for Flink {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);

        let relabel = |metric: &str, label: &str| {
            Transform::update_metric(metric).with_operations(vec![Operation::rename_label("name", label)])
        };

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                "flinkmetrics",
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                }),
            ),
            vec![
                normalize_sums(),
                metrics_transform(vec![
                    relabel("flink.jvm.gc.collections.count", "garbage_collector_name"),
                    relabel("flink.jvm.gc.collections.time", "garbage_collector_name"),
                    relabel("flink.operator.record.count", "operator_name"),
                    relabel("flink.operator.watermark.output", "operator_name"),
                    Transform::add_prefix(WORKLOAD_PREFIX),
                ]),
                transformation_metrics([
                    flatten_resource_attribute("host.name", "host_name"),
                    flatten_resource_attribute("flink.taskmanager.id", "taskmanager_id"),
                    flatten_resource_attribute("flink.job.name", "job_name"),
                    flatten_resource_attribute("flink.task.name", "task_name"),
                    flatten_resource_attribute("flink.subtask.index", "subtask_index"),
                    flatten_resource_attribute("flink.resource.type", "resource_type"),
                ]),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-04-22 11:51:35,718 INFO  org.apache.flink.runtime.jobmaster.JobMaster                 [] - Close ResourceManager connection
const LOG_REGEX: &str = r"^(?<time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+)\s+(?<level>[A-Z]+)\s+(?<source>[^ ]*)(?<message>[\s\S]*)";
const LOG_START: &str = r"\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+";

struct FlinkLogs;

impl FilesProduct for FlinkLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/flink/log/flink-*-standalonesession-*.log",
        "/opt/flink/log/flink-*-taskexecutor-*.log",
        "/opt/flink/log/flink-*-client-*.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(LOG_REGEX, ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L"))?;
        // log4j 레벨
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
                anchored_rules(LOG_START),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Flink>(registries)?;
    register_files_product::<FlinkLogs>(registries)
}
