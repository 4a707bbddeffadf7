//! Microsoft SQL Server
//!
//! 메트릭(Windows 전용)은 `receiver_version`으로 세대를 고릅니다.
//! - 1: `windowsperfcounters`로 성능 카운터 세 개
//! - 2: `sqlserver` 리시버
//!
//! 오류 로그는 모든 플랫폼에서 읽습니다.

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::fluentbit::{ModifyOptions, ModifyRule};
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::PlatformFilter;
use opsconf_logging::{LoggingError, ModifySteps, MultilineRule, ParseRegex, ParserShared};
use opsconf_metrics::processors::{
    flatten_resource_attribute, metrics_transform, modify_instrumentation_scope, normalize_sums,
    transformation_metrics,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, SharedVersion, Transform};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics,
};

const TYPE: &str = "mssql";
const LATEST_VERSION: u64 = 2;
const AGENT_PREFIX: &str = "agent.googleapis.com";

/// (성능 카운터 경로, 에이전트 메트릭 이름)
const PERF_COUNTERS: [(&str, &str); 3] = [
    (
        r"\SQLServer:General Statistics(_Total)\User Connections",
        "mssql/connections/user",
    ),
    (
        r"\SQLServer:Databases(_Total)\Transactions/sec",
        "mssql/transaction_rate",
    ),
    (
        r"\SQLServer:Databases(_Total)\Write Transactions/sec",
        "mssql/write_transaction_rate",
    ),
];

#[derive(Debug, Clone, Deserialize)]
struct Mssql {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    version: SharedVersion,
}

impl Mssql {
    fn perf_counter_pipeline(&self) -> ReceiverPipeline {
        let config = json!({
            "collection_interval": self.shared.collection_interval_string(),
            "perfcounters": [
                {
                    "object": "SQLServer:General Statistics",
                    "instances": ["_Total"],
                    "counters": [{ "name": "User Connections" }],
                },
                {
                    "object": "SQLServer:Databases",
                    "instances": ["_Total"],
                    "counters": [
                        { "name": "Transactions/sec" },
                        { "name": "Write Transactions/sec" },
                    ],
                },
            ],
        });
        let mut transforms: Vec<Transform> = PERF_COUNTERS
            .iter()
            .map(|(counter, name)| Transform::rename_metric(counter, name))
            .collect();
        transforms.push(Transform::add_prefix(AGENT_PREFIX));

        ReceiverPipeline::metrics(
            Component::new("windowsperfcounters", config),
            vec![
                metrics_transform(transforms),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )
    }

    fn sqlserver_pipeline(&self) -> ReceiverPipeline {
        ReceiverPipeline::metrics(
            Component::new(
                "sqlserver",
                json!({ "collection_interval": self.shared.collection_interval_string() }),
            ),
            vec![
                metrics_transform(vec![
                    Transform::rename_metric(
                        "sqlserver.transaction_log.usage",
                        "sqlserver.transaction_log.percent_used",
                    ),
                    Transform::add_prefix(WORKLOAD_PREFIX),
                ]),
                transformation_metrics([flatten_resource_attribute(
                    "sqlserver.database.name",
                    "database",
                )]),
                normalize_sums(),
                modify_instrumentation_scope(TYPE, "2.0"),
            ],
        )
    }
}

impl ProductMetrics for Mssql {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::WindowsOnly;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS, SharedVersion::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.version.validate(LATEST_VERSION)
    }
}

impl MetricsReceiver for Mssql {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let pipeline = match self.version.version() {
            2 => self.sqlserver_pipeline(),
            _ => self.perf_counter_pipeline(),
        };
        Ok(vec![pipeline])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-03-20 00:00:03.76 Logon       Error: 18456, Severity: 14, State: 38.
// 시간은 서버 현지 시각이라 레코드 시간으로 쓰지 않습니다.
const ERRORLOG_REGEX: &str = r"^(?<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{2}) (?<process>\w+)\s+(?<message>[\s|\S]*)?";

struct MssqlErrorlog;

impl FilesProduct for MssqlErrorlog {
    const TYPE: &'static str = "mssql_errorlog";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/opt/mssql/log/errorlog",
        r"C:\Program Files\Microsoft SQL Server\MSSQL*\MSSQL\LOG\ERRORLOG",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(ERRORLOG_REGEX, ParserShared::default())?;
        Ok(ProductProcessor::new(parse).then(ModifySteps::new().then(ModifyOptions::new(
            ModifyRule::Add,
            "logging.googleapis.com/severity info",
        ))))
    }

    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(anchored_rules(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{2}"))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Mssql>(registries)?;
    register_files_product::<MssqlErrorlog>(registries)
}
