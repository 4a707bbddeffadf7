//! Redis

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{LoggingError, ModifyField, ParseRegex, ParserShared, SeverityTable};
use opsconf_metrics::processors::{metrics_filter, normalize_sums};
use opsconf_metrics::{
    MatchType, MetricsError, MetricsReceiver, Polarity, ReceiverShared, SharedTls,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope, severity_fields, validate_endpoint, workload_prefix,
};

const TYPE: &str = "redis";
const DEFAULT_ADDRESS: &str = "localhost:6379";

#[derive(Debug, Clone, Deserialize)]
struct Redis {
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    password: Secret,
}

impl ProductMetrics for Redis {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[SharedTls::FIELDS, ReceiverShared::FIELDS, &["address", "password"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        validate_endpoint("address", self.address.as_deref())
    }
}

impl MetricsReceiver for Redis {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let address = self
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_ADDRESS);
        let transport = if address.starts_with('/') { "unix" } else { "tcp" };
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": address,
                    "password": self.password.expose(),
                    "tls": self.tls.tls_config(true),
                    "transport": transport,
                }),
            ),
            vec![
                metrics_filter(
                    Polarity::Exclude,
                    MatchType::Strict,
                    ["redis.commands", "redis.uptime"],
                )?,
                normalize_sums(),
                workload_prefix(),
                scope(TYPE),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// Redis 3+: 534:M 28 Apr 2020 11:30:29.988 * DB loaded from disk: 0.002 seconds
// Redis <3: [4018] 14 Nov 07:01:22.119 * Background saving terminated with success
const LOG_REGEX: &str = r"^\[?(?<pid>\d+):?(?<roleChar>[A-Z])?\]?\s+(?<time>\d{2}\s+\w+(?:\s+\d{4})?\s+\d{2}:\d{2}:\d{2}.\d{3})\s+(?<level>(\*|#|-|\.))\s+(?<message>.*)$";

struct RedisLogs;

impl FilesProduct for RedisLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/var/log/redis/redis-server.log",
        "/var/log/redis_6379.log",
        "/var/log/redis/redis.log",
        "/var/log/redis/default.log",
        "/var/log/redis/redis_6379.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            LOG_REGEX,
            ParserShared::new("time", "%d %b %Y %H:%M:%S.%L").with_type("pid", FieldType::Integer),
        )?;
        let severity = SeverityTable::new(
            "level",
            &[
                (".", Severity::Debug),
                ("-", Severity::Info),
                ("*", Severity::Notice),
                ("#", Severity::Warning),
            ],
            true,
        );
        let role = ModifyField::copy_from("jsonPayload.roleChar")
            .map("X", "sentinel")
            .map("C", "RDB/AOF_writing_child")
            .map("S", "slave")
            .map("M", "master")
            .exclusive();
        Ok(ProductProcessor::new(parse)
            .then(severity_fields(Self::TYPE, severity).field("jsonPayload.role", role).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Redis>(registries)?;
    register_files_product::<RedisLogs>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn socket_address_uses_unix_transport() {
        let body = serde_yaml::from_str("address: /var/run/redis.sock").unwrap();
        let r: Redis = parse_strict(body, Redis::FIELDS).unwrap();
        r.validate().unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(pipelines[0].receiver.config["transport"], "unix");
    }

    #[test]
    fn default_address_is_tcp() {
        let r: Redis = parse_strict(serde_yaml::Value::Null, Redis::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(pipelines[0].receiver.config["endpoint"], DEFAULT_ADDRESS);
        assert_eq!(pipelines[0].receiver.config["transport"], "tcp");
    }

    #[test]
    fn modern_log_line_preview() {
        let p = RedisLogs::processor().unwrap();
        let record = p
            .inspect()
            .preview("534:M 28 Apr 2020 11:30:29.988 * DB loaded from disk: 0.002 seconds")
            .unwrap();
        assert_eq!(record.fields["pid"], Value::from(534));
        assert_eq!(record.fields["roleChar"], Value::from("M"));
        assert_eq!(record.fields["level"], Value::from("*"));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn legacy_log_line_preview() {
        let p = RedisLogs::processor().unwrap();
        let record = p
            .inspect()
            .preview("[4018] 14 Nov 07:01:22.119 * Background saving terminated with success")
            .unwrap();
        assert_eq!(record.fields["pid"], Value::from(4018));
        assert!(!record.fields.contains_key("roleChar"));
    }
}
