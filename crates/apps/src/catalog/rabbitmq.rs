//! RabbitMQ

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{Secret, Severity};
use opsconf_logging::multiline::START_STATE;
use opsconf_logging::{LoggingError, MultilineRule, ParseRegex, ParserShared, SeverityTable};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, SharedTls};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope, severity_fields, validate_url, workload_prefix,
};

const TYPE: &str = "rabbitmq";
const DEFAULT_ENDPOINT: &str = "http://localhost:15672";

#[derive(Debug, Clone, Deserialize)]
struct Rabbitmq {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
    #[serde(default)]
    endpoint: Option<String>,
}

impl ProductMetrics for Rabbitmq {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        ReceiverShared::FIELDS,
        SharedTls::FIELDS,
        &["username", "password", "endpoint"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        if self.username.as_deref().is_none_or(str::is_empty) {
            return Err(MetricsError::parameter("username", "required"));
        }
        if self.password.is_empty() {
            return Err(MetricsError::parameter("password", "required"));
        }
        validate_url("endpoint", self.endpoint.as_deref())
    }
}

impl MetricsReceiver for Rabbitmq {
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
                    "tls": self.tls.tls_config(true),
                }),
            ),
            vec![normalize_sums(), workload_prefix(), scope(TYPE)],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-01-31 18:01:20.441571+00:00 [erro] <0.692.0> ** Connection attempt from node 'rabbit_ctl_17@host' rejected. **
const LOG_REGEX: &str = r"^(?<timestamp>\d+-\d+-\d+ \d+:\d+:\d+\.\d+\+\d+:\d+) \[(?<severity>\w+)\] <(?<process_id>\d+\.\d+\.\d+)> (?<message>.*)$";
const LINE_START: &str = r"\d+-\d+-\d+ \d+:\d+:\d+\.\d+\+\d+:\d+";

struct RabbitmqLogs;

impl FilesProduct for RabbitmqLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/rabbitmq/rabbit*.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            LOG_REGEX,
            ParserShared::new("timestamp", "%Y-%m-%d %H:%M:%S.%L+%Z"),
        )?;
        let severity = SeverityTable::new(
            "severity",
            &[
                ("debug", Severity::Debug),
                ("error", Severity::Error),
                ("info", Severity::Info),
                ("noti", Severity::Default),
            ],
            true,
        );
        Ok(ProductProcessor::new(parse).then(severity_fields(Self::TYPE, severity).build()?))
    }

    // 크래시 보고(BOOT FAILED 등)는 타임스탬프 줄 뒤에 여러 줄로 이어집니다.
    // 시작 규칙은 줄 중간의 타임스탬프도 받아들입니다.
    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(vec![
            MultilineRule::new(START_STATE, LINE_START, "cont"),
            MultilineRule::new("cont", format!("^(?!{LINE_START})"), "cont"),
        ])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Rabbitmq>(registries)?;
    register_files_product::<RabbitmqLogs>(registries)
}
