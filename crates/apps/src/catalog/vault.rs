//! HashiCorp Vault
//!
//! 메트릭은 Prometheus 형식 엔드포인트를 긁어 옵니다. 스토리지 백엔드별
//! summary는 작업 종류별 합계 메트릭 두 개로 바뀌고 `storage` 속성이 붙습니다.

use serde::Deserialize;
use serde_json::{Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::Secret;
use opsconf_logging::{LoggingError, MultilineRule, ParseJson, ParserShared};
use opsconf_metrics::processors::{
    TransformQuery, metrics_filter, metrics_transform, normalize_sums, set_attribute,
    set_description, set_name, set_unit, summary_count_to_sum, summary_sum_to_sum,
    transformation_metrics,
};
use opsconf_metrics::{
    MatchType, MetricsError, MetricsReceiver, Operation, Polarity, ReceiverShared, SharedTls,
    Transform,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, validate_endpoint, workload_prefix,
};

const TYPE: &str = "vault";
const DEFAULT_ENDPOINT: &str = "localhost:8200";
const DEFAULT_METRICS_PATH: &str = "/v1/sys/metrics";
const DEFAULT_SCHEME: &str = "http";

const OPERATIONS: [&str; 4] = ["delete", "get", "list", "put"];

const STORAGES: [&str; 15] = [
    "azure",
    "cassandra",
    "cockroachdb",
    "consul",
    "couchdb",
    "dynamodb",
    "etcd",
    "gcs",
    "mssql",
    "mysql",
    "postgres",
    "s3",
    "spanner",
    "swift",
    "zookeeper",
];

/// 이름/설명/단위를 바꿀 메트릭 하나
struct Renamed {
    old: &'static str,
    new: &'static str,
    description: &'static str,
    unit: &'static str,
    monotonic: bool,
}

/// summary의 sum만 쓰는 토큰/리더십 메트릭
const SUMMARY_METRICS: [Renamed; 3] = [
    Renamed {
        old: "vault_expire_revoke",
        new: "vault.token.revoke.time",
        description: "The average time taken to revoke a token.",
        unit: "ms",
        monotonic: true,
    },
    Renamed {
        old: "vault_expire_renew",
        new: "vault.token.renew.time",
        description: "The average time taken to renew a token.",
        unit: "ms",
        monotonic: true,
    },
    Renamed {
        old: "vault_core_leadership_lost",
        new: "vault.core.leader.duration",
        description: "The amount of time a core was the leader in high availability mode.",
        unit: "ms",
        monotonic: false,
    },
];

const GAUGE_METRICS: [Renamed; 6] = [
    Renamed {
        old: "vault_core_in_flight_requests",
        new: "vault.core.request.count",
        description: "The number of requests handled by the Vault core.",
        unit: "{requests}",
        monotonic: false,
    },
    Renamed {
        old: "vault_expire_num_leases",
        new: "vault.token.lease.count",
        description: "The number of tokens that are leased for eventual expiration.",
        unit: "{tokens}",
        monotonic: false,
    },
    Renamed {
        old: "vault_audit_log_request_failure",
        new: "vault.audit.request.failed",
        description: "The number of audit log requests that have failed.",
        unit: "{requests}",
        monotonic: false,
    },
    Renamed {
        old: "vault_audit_log_response_failure",
        new: "vault.audit.response.failed",
        description: "The number of audit log responses that have failed.",
        unit: "{responses}",
        monotonic: false,
    },
    Renamed {
        old: "vault_runtime_sys_bytes",
        new: "vault.memory.usage",
        description: "The amount of memory used by Vault.",
        unit: "bytes",
        monotonic: false,
    },
    Renamed {
        old: "vault_token_count",
        new: "vault.token.count",
        description: "The number of tokens created.",
        unit: "{tokens}",
        monotonic: false,
    },
];

/// int/double 전환이 필요한 메트릭
const TOGGLED_METRICS: [&str; 5] = [
    "vault.audit.response.failed",
    "vault.audit.request.failed",
    "vault.token.lease.count",
    "vault.token.count",
    "vault.core.request.count",
];

#[derive(Debug, Clone, Deserialize)]
struct Vault {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(default)]
    token: Secret,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    metrics_path: Option<String>,
    #[serde(default)]
    scheme: Option<String>,
}

fn non_empty<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.filter(|v| !v.is_empty()).unwrap_or(default)
}

/// 스토리지 summary 변환 쿼리와 결과 메트릭 이름
fn storage_queries() -> (Vec<TransformQuery>, Vec<String>) {
    let mut queries = Vec::new();
    let mut names = Vec::new();
    for operation in OPERATIONS {
        let time_name = format!("vault.storage.operation.{operation}.time");
        let count_name = format!("vault.storage.operation.{operation}.count");
        for storage in STORAGES {
            let old = format!("vault_{storage}_{operation}");
            let old_count = format!("{old}_count");
            let old_sum = format!("{old}_sum");
            queries.extend([
                summary_count_to_sum(&old, true),
                summary_sum_to_sum(&old, true),
                set_attribute(&old_count, "storage", storage),
                set_attribute(&old_sum, "storage", storage),
                set_name(&old_sum, &time_name),
                set_unit(&time_name, "ms"),
                set_description(
                    &time_name,
                    &format!("The duration of {operation} operations executed against the storage backend."),
                ),
                set_name(&old_count, &count_name),
                set_unit(&count_name, "{operations}"),
                set_description(
                    &count_name,
                    &format!("The amount of {operation} operations executed against the storage backend."),
                ),
            ]);
        }
        names.push(time_name);
        names.push(count_name);
    }
    (queries, names)
}

fn summary_queries() -> impl Iterator<Item = TransformQuery> {
    SUMMARY_METRICS.iter().flat_map(|m| {
        [
            summary_sum_to_sum(m.old, m.monotonic),
            set_name(&format!("{}_sum", m.old), m.new),
            set_unit(m.new, m.unit),
            set_description(m.new, m.description),
        ]
    })
}

fn gauge_queries() -> impl Iterator<Item = TransformQuery> {
    GAUGE_METRICS.iter().flat_map(|m| {
        [
            set_name(m.old, m.new),
            set_description(m.new, m.description),
            set_unit(m.new, m.unit),
        ]
    })
}

impl Vault {
    fn scrape_config(&self) -> Value {
        let mut tls = self.tls.tls_config(true);
        let secure = tls.get("insecure") == Some(&Value::Bool(false));
        if let Value::Object(map) = &mut tls {
            map.remove("insecure");
        }
        let scheme = if secure {
            "https"
        } else {
            non_empty(self.scheme.as_deref(), DEFAULT_SCHEME)
        };

        let mut scrape = json!({
            "job_name": TYPE,
            "scrape_interval": self.shared.collection_interval_string(),
            "metrics_path": non_empty(self.metrics_path.as_deref(), DEFAULT_METRICS_PATH),
            "static_configs": [{
                "targets": [non_empty(self.endpoint.as_deref(), DEFAULT_ENDPOINT)],
            }],
            "scheme": scheme,
            "tls_config": tls,
        });
        if !self.token.is_empty() {
            scrape["authorization"] = json!({
                "credentials": self.token.expose(),
                "type": "Bearer",
            });
        }
        scrape
    }
}

impl ProductMetrics for Vault {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        ReceiverShared::FIELDS,
        SharedTls::FIELDS,
        &["token", "endpoint", "metrics_path", "scheme"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())?;
        match self.metrics_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) if !path.starts_with('/') => Err(MetricsError::parameter(
                "metrics_path",
                format!("{path:?} must start with \"/\""),
            )),
            _ => Ok(()),
        }
    }
}

impl MetricsReceiver for Vault {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let (storage, mut include) = storage_queries();
        include.extend(GAUGE_METRICS.iter().map(|m| m.new.to_owned()));
        include.extend(SUMMARY_METRICS.iter().map(|m| m.new.to_owned()));

        let queries = storage
            .into_iter()
            .chain(summary_queries())
            .chain(gauge_queries());
        // transform 프로세서는 스칼라 형 전환을 못 하므로 metricstransform을 함께 씁니다.
        let toggles = TOGGLED_METRICS
            .iter()
            .map(|m| Transform::update_metric(m).with_operations(vec![Operation::ToggleScalarDataType]))
            .collect();

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                "prometheus",
                json!({ "config": { "scrape_configs": [self.scrape_config()] } }),
            ),
            vec![
                transformation_metrics(queries),
                metrics_filter(Polarity::Include, MatchType::Strict, include)?,
                metrics_transform(toggles),
                normalize_sums(),
                workload_prefix(),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// {"time":"2022-06-07T20:34:34.392078404Z","type":"request","auth":{"token_type":"default"},"request":{"operation":"update","path":"sys/audit/test"}}
struct VaultAudit;

impl FilesProduct for VaultAudit {
    const TYPE: &'static str = "vault_audit";
    // 감사 로그 위치는 설치마다 다르므로 include_paths가 필수입니다.
    const DEFAULT_PATHS: &'static [&'static str] = &[];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseJson {
            field: None,
            shared: ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%z"),
        };
        Ok(ProductProcessor::new(parse).then(
            opsconf_logging::ModifyFields::new()
                .with_instrumentation_source(Self::TYPE)
                .build()?,
        ))
    }

    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(anchored_rules(r"\{.*"))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Vault>(registries)?;
    register_files_product::<VaultAudit>(registries)
}
