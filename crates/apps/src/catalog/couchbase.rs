//! Couchbase
//!
//! 메트릭은 Couchbase의 Prometheus 엔드포인트에서 `kv_*` 계열만 남겨 긁어 옵니다.

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{
    LoggingError, ModifyField, ModifyFields, ParseMultilineRegex, ParseRegex, ParserShared,
    RegexParser, SeverityTable,
};
use opsconf_metrics::processors::{
    TransformQuery, convert_gauge_to_sum, metrics_filter, metrics_transform,
    modify_instrumentation_scope, normalize_sums, set_description, set_unit,
    transformation_metrics,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{
    Aggregation, MatchType, MetricsError, MetricsReceiver, Operation, Polarity, ReceiverShared,
    Transform,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, severity_fields, validate_endpoint,
};

const TYPE: &str = "couchbase";
const DEFAULT_ENDPOINT: &str = "localhost:8091";

const KEPT_METRICS: &str = "(kv_ops)|(kv_vb_curr_items)|(kv_num_vbuckets)|(kv_total_memory_used_bytes)|(kv_ep_num_value_ejects)|(kv_ep_mem_high_wat)|(kv_ep_mem_low_wat)|(kv_ep_oom_errors)";

/// Prometheus 스크레이프 자체가 만드는 메트릭
const SCRAPE_METRICS: [&str; 5] = [
    "scrape_samples_post_metric_relabeling",
    "scrape_series_added",
    "scrape_duration_seconds",
    "scrape_samples_scraped",
    "up",
];

/// (원래 이름, 새 이름, 스칼라 형 전환 여부)
const RENAMES: [(&str, &str, bool); 9] = [
    ("kv_ops", "couchbase.bucket.operation.count", true),
    ("kv_vb_curr_items", "couchbase.bucket.item.count", false),
    ("kv_num_vbuckets", "couchbase.bucket.vbucket.count", false),
    ("kv_total_memory_used_bytes", "couchbase.bucket.memory.usage", false),
    ("kv_ep_num_value_ejects", "couchbase.bucket.item.ejection.count", true),
    ("kv_ep_mem_high_wat", "couchbase.bucket.memory.high_water_mark.limit", false),
    ("kv_ep_mem_low_wat", "couchbase.bucket.memory.low_water_mark.limit", false),
    ("kv_ep_tmp_oom_errors", "couchbase.bucket.error.oom.count.recoverable", true),
    ("kv_ep_oom_errors", "couchbase.bucket.error.oom.count.unrecoverable", true),
];

/// (접두어 뒤 이름, 설명, 합계 변환 여부, 단위). 이름순
const METRIC_DETAILS: [(&str, &str, bool, &str); 8] = [
    ("couchbase.bucket.error.oom.count", "Number of out of memory errors.", true, "{errors}"),
    ("couchbase.bucket.item.count", "Number of items that belong to the bucket.", false, "{items}"),
    ("couchbase.bucket.item.ejection.count", "Number of item value ejections from memory to disk.", true, "{ejections}"),
    ("couchbase.bucket.memory.high_water_mark.limit", "The memory usage at which items will be ejected.", false, "By"),
    ("couchbase.bucket.memory.low_water_mark.limit", "The memory usage at which ejections will stop that were previously triggered by a high water mark breach.", false, "By"),
    ("couchbase.bucket.memory.usage", "Usage of total memory available to the bucket.", false, "By"),
    ("couchbase.bucket.operation.count", "Number of operations on the bucket.", true, "{operations}"),
    ("couchbase.bucket.vbucket.count", "Number of non-resident vBuckets.", false, "{vbuckets}"),
];

#[derive(Debug, Clone, Deserialize)]
struct Couchbase {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
}

fn renames() -> Result<Vec<Transform>, MetricsError> {
    let mut transforms: Vec<Transform> = RENAMES
        .iter()
        .map(|(old, new, toggle)| {
            let mut operations = Vec::new();
            if *toggle {
                operations.push(Operation::ToggleScalarDataType);
            }
            operations.push(Operation::rename_label("bucket", "bucket_name"));
            Transform::rename_metric(old, new).with_operations(operations)
        })
        .collect();
    transforms.push(Transform::combine_metrics(
        r"^couchbase\.bucket\.error\.oom\.count\.(?P<error_type>unrecoverable|recoverable)$$",
        "couchbase.bucket.error.oom.count",
    )?);
    transforms.push(
        Transform::update_metric("couchbase.bucket.operation.count").with_operations(vec![
            Operation::aggregate_labels(Aggregation::Sum, &["bucket_name", "op"]),
        ]),
    );
    transforms.push(Transform::add_prefix(WORKLOAD_PREFIX));
    Ok(transforms)
}

fn detail_queries() -> Vec<TransformQuery> {
    let mut queries = Vec::new();
    for (name, description, cast_to_sum, unit) in METRIC_DETAILS {
        let name = format!("{WORKLOAD_PREFIX}/{name}");
        if cast_to_sum {
            queries.push(convert_gauge_to_sum(&name));
        }
        queries.push(set_description(&name, description));
        queries.push(set_unit(&name, unit));
    }
    queries
}

impl ProductMetrics for Couchbase {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] =
        &[ReceiverShared::FIELDS, &["endpoint", "username", "password"]];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())?;
        if self.username.as_deref().is_none_or(str::is_empty) {
            return Err(MetricsError::parameter("username", "required"));
        }
        if self.password.is_empty() {
            return Err(MetricsError::parameter("password", "required"));
        }
        Ok(())
    }
}

impl MetricsReceiver for Couchbase {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        let scrape = json!({
            "job_name": TYPE,
            "scrape_interval": self.shared.collection_interval_string(),
            "basic_auth": {
                "username": self.username.as_deref().unwrap_or_default(),
                "password": self.password.expose(),
            },
            "metric_relabel_configs": [{
                "source_labels": ["__name__"],
                "regex": KEPT_METRICS,
                "action": "keep",
            }],
            "static_configs": [{ "targets": [endpoint] }],
        });

        Ok(vec![ReceiverPipeline::metrics(
            Component::new("prometheus", json!({ "config": { "scrape_configs": [scrape] } })),
            vec![
                normalize_sums(),
                metrics_filter(Polarity::Exclude, MatchType::Strict, SCRAPE_METRICS)?,
                // 접두어보다 이름 변경이 먼저 와야 합니다.
                metrics_transform(renames()?),
                transformation_metrics(detail_queries()),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// [ns_server:info,2022-02-24T16:49:45.386Z,ns_1@127.0.0.1:<0.17893.0>:ns_orchestrator:handle_info:1146]Skipping janitor
const GENERAL_REGEX: &str = r"^\[(?<type>[^:]*):(?<level>[^,]*),(?<timestamp>\d+-\d+-\d+T\d+:\d+:\d+.\d+Z),(?<node_name>[^:]*):([^:]+):(?<source>[^\]]+)\](?<message>.*)$";

// 127.0.0.1 - Administrator [24/Feb/2022:16:49:44 +0000] "GET /pools/default HTTP/1.1" 200 4529 - "Python-urllib/3.8" 5
const HTTP_ACCESS_REGEX: &str = r#"^(?<http_request_remoteIp>[^ ]*) (?<host>[^ ]*) (?<user>[^ ]*) \[(?<timestamp>[^\]]*)\] "(?<http_request_requestMethod>\S+) (?<http_request_requestUrl>\S+) (?<http_request_protocol>\S+)" (?<http_request_status>[^ ]*) (?<http_request_responseSize>[^ ]*\S+) (?<http_request_referer>[^ ]*) "(?<http_request_userAgent>[^\"]*)" (?<message>.*)$"#;

const HTTP_REQUEST_FIELDS: [&str; 8] = [
    "remoteIp",
    "requestMethod",
    "requestUrl",
    "protocol",
    "status",
    "responseSize",
    "referer",
    "userAgent",
];

// 2022-02-24T16:50:13.366Z INFO GOXDCR.ReplMgr: GOMAXPROCS=4
const GOXDCR_REGEX: &str = r"^(?<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}.\d*Z) (?<level>\w+) (?<log_type>\w+.\w+): (?<message>.*)$";

const COUCHBASE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%L";

struct CouchbaseGeneral;

impl FilesProduct for CouchbaseGeneral {
    const TYPE: &'static str = "couchbase_general";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/couchbase/var/lib/couchbase/logs/couchdb.log",
        "/opt/couchbase/var/lib/couchbase/logs/info.log",
        "/opt/couchbase/var/lib/couchbase/logs/debug.log",
        "/opt/couchbase/var/lib/couchbase/logs/error.log",
        "/opt/couchbase/var/lib/couchbase/logs/babysitter.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(
            GENERAL_REGEX,
            ParserShared::new("timestamp", COUCHBASE_TIME_FORMAT),
        )?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("debug", Severity::Debug),
                ("info", Severity::Info),
                ("warn", Severity::Warning),
                ("error", Severity::Error),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(r"\[([^\s+:]*):"),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

struct CouchbaseHttpAccess;

impl FilesProduct for CouchbaseHttpAccess {
    const TYPE: &'static str = "couchbase_http_access";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/couchbase/var/lib/couchbase/logs/http_access.log",
        "/opt/couchbase/var/lib/couchbase/logs/http_access_internal.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            HTTP_ACCESS_REGEX,
            ParserShared::new("timestamp", "%d/%b/%Y:%H:%M:%S %z")
                .with_type("http_request_status", FieldType::Integer),
        )?;
        let http_request = HTTP_REQUEST_FIELDS.iter().fold(
            ModifyFields::new().with_instrumentation_source(Self::TYPE),
            |fields, name| {
                let src = format!("jsonPayload.http_request_{name}");
                let field = if *name == "referer" {
                    // 리퍼러가 없으면 `-`로 기록됩니다.
                    ModifyField::move_from(src.clone()).omit_if(format!("{src} = \"-\""))
                } else {
                    ModifyField::move_from(src)
                };
                fields.field(format!("httpRequest.{name}"), field)
            },
        );
        Ok(ProductProcessor::new(parse).then(http_request.build()?))
    }
}

struct CouchbaseGoxdcr;

impl FilesProduct for CouchbaseGoxdcr {
    const TYPE: &'static str = "couchbase_goxdcr";
    const DEFAULT_PATHS: &'static [&'static str] = &["/opt/couchbase/var/lib/couchbase/logs/goxdcr.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(
            GOXDCR_REGEX,
            ParserShared::new("timestamp", COUCHBASE_TIME_FORMAT),
        )?;
        let severity = SeverityTable::new(
            "level",
            &[
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("WARN", Severity::Warning),
                ("ERROR", Severity::Error),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}"),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Couchbase>(registries)?;
    register_files_product::<CouchbaseGeneral>(registries)?;
    register_files_product::<CouchbaseHttpAccess>(registries)?;
    register_files_product::<CouchbaseGoxdcr>(registries)
}
