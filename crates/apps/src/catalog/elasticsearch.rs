//! Elasticsearch
//!
//! JSON 로그는 7.x 형식(`timestamp`)과 8.x ECS 형식(`@timestamp`)이 시간 키가
//! 달라 타입을 둘로 나눕니다. 각 타입은 다른 형식의 레코드를 grep으로 버립니다.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{
    GrepExclude, LoggingError, ModifyFields, MultilineRule, NestWildcard, ParseJson,
    ParseMultilineRegex, ParseRegex, ParserShared, SeverityTable,
};
use opsconf_logging::multiline::START_STATE;
use opsconf_metrics::processors::{
    metrics_ottl_filter, metrics_remove_service_attributes, normalize_sums,
};
use opsconf_metrics::{
    MetricsError, MetricsReceiver, ReceiverShared, SharedCluster, SharedCollectJvm, SharedTls,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope, severity_fields, validate_credentials, validate_url, workload_prefix,
};

const TYPE: &str = "elasticsearch";
const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

/// JMX 없이 수집되므로 `collect_jvm_metrics: false`면 개별로 끕니다.
const JVM_METRICS: [&str; 11] = [
    "jvm.classes.loaded",
    "jvm.gc.collections.count",
    "jvm.gc.collections.elapsed",
    "jvm.memory.heap.max",
    "jvm.memory.heap.used",
    "jvm.memory.heap.committed",
    "jvm.memory.nonheap.used",
    "jvm.memory.nonheap.committed",
    "jvm.memory.pool.max",
    "jvm.memory.pool.used",
    "jvm.threads.count",
];

/// 인덱스 이름 리소스 속성을 내리지 않으므로 항상 끕니다.
const INDEX_METRICS: [&str; 14] = [
    "elasticsearch.index.cache.evictions",
    "elasticsearch.index.cache.memory.usage",
    "elasticsearch.index.cache.size",
    "elasticsearch.index.documents",
    "elasticsearch.index.operations.completed",
    "elasticsearch.index.operations.merge.docs_count",
    "elasticsearch.index.operations.merge.size",
    "elasticsearch.index.operations.time",
    "elasticsearch.index.segments.count",
    "elasticsearch.index.segments.memory",
    "elasticsearch.index.segments.size",
    "elasticsearch.index.shards.size",
    "elasticsearch.index.translog.operations",
    "elasticsearch.index.translog.size",
];

#[derive(Debug, Clone, Deserialize)]
struct Elasticsearch {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
    #[serde(flatten)]
    cluster: SharedCluster,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
}

impl Elasticsearch {
    fn disabled_metrics(&self) -> Map<String, Value> {
        let jvm: &[&str] = if self.collect_jvm.should_collect_jvm_metrics() {
            &[]
        } else {
            &JVM_METRICS
        };
        jvm.iter()
            .chain(INDEX_METRICS.iter())
            .map(|m| ((*m).to_owned(), json!({ "enabled": false })))
            .collect()
    }
}

impl ProductMetrics for Elasticsearch {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        ReceiverShared::FIELDS,
        SharedTls::FIELDS,
        SharedCollectJvm::FIELDS,
        SharedCluster::FIELDS,
        &["endpoint", "username", "password"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        validate_url("endpoint", self.endpoint.as_deref())?;
        validate_credentials(self.username.as_deref(), &self.password)
    }
}

impl MetricsReceiver for Elasticsearch {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        let config = json!({
            "collection_interval": self.shared.collection_interval_string(),
            "endpoint": endpoint,
            "username": self.username.as_deref().unwrap_or_default(),
            "password": self.password.expose(),
            "nodes": ["_local"],
            "tls": self.tls.tls_config(true),
            "skip_cluster_metrics": !self.cluster.should_collect_cluster_metrics(),
            "metrics": self.disabled_metrics(),
        });

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(TYPE, config),
            vec![
                normalize_sums(),
                // 클러스터 요약 힙 메트릭은 노드 이름이 없어 시계열이 겹칩니다.
                metrics_ottl_filter(
                    &[r#"name == "jvm.memory.heap.used" and resource.attributes["elasticsearch.node.name"] == nil"#],
                    &[],
                ),
                workload_prefix(),
                scope(TYPE),
                metrics_remove_service_attributes(),
            ],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

const JSON_PATHS: &[&str] = &[
    "/var/log/elasticsearch/*_server.json",
    "/var/log/elasticsearch/*_deprecation.json",
    "/var/log/elasticsearch/*_index_search_slowlog.json",
    "/var/log/elasticsearch/*_index_indexing_slowlog.json",
    "/var/log/elasticsearch/*_audit.json",
];

/// 감사 이벤트 속성과 레이아웃의 점 표기 키 접두어. 긴 접두어가 먼저 옵니다.
const NESTED_PREFIXES: [&str; 14] = [
    "user.run_by",
    "user.run_as",
    "authentication.token",
    "node",
    "event",
    "authentication",
    "user",
    "origin",
    "request",
    "url",
    "host",
    "apikey",
    "cluster",
    "log",
];

/// 스택 트레이스가 있으면 JSON 레코드가 여러 줄에 걸칩니다.
fn json_rules() -> Vec<MultilineRule> {
    vec![
        MultilineRule::new(START_STATE, r"^\{.*", "cont"),
        MultilineRule::new("cont", r"^[^{].*[,}]$", "cont"),
    ]
}

fn json_severity(source: &str) -> SeverityTable {
    SeverityTable::new(
        source,
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
        true,
    )
}

fn with_nesting(processor: ProductProcessor) -> ProductProcessor {
    NESTED_PREFIXES
        .iter()
        .fold(processor, |p, prefix| p.then(NestWildcard::dotted(prefix)))
}

// {"type": "server", "timestamp": "2022-01-17T18:31:47,365Z", "level": "INFO", "component": "o.e.n.Node", "message": "initialized" }
struct ElasticsearchJson;

impl FilesProduct for ElasticsearchJson {
    const TYPE: &'static str = "elasticsearch_json";
    const DEFAULT_PATHS: &'static [&'static str] = JSON_PATHS;

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseJson {
            field: None,
            shared: ParserShared::new("timestamp", "%Y-%m-%dT%H:%M:%S,%L%z"),
        };
        let processor = ProductProcessor::multiline(ParseMultilineRegex::new(json_rules(), Vec::new())?)
            .then(parse)
            .then(GrepExclude::new("@timestamp"))
            .then(severity_fields(Self::TYPE, json_severity("level")).build()?);
        Ok(with_nesting(processor))
    }
}

// {"@timestamp":"2025-09-19T02:20:17.920Z", "log.level": "INFO", "message":"initialized", "ecs.version": "1.2.0"}
struct ElasticsearchJsonEcs;

impl FilesProduct for ElasticsearchJsonEcs {
    const TYPE: &'static str = "elasticsearch_json_ecs";
    const DEFAULT_PATHS: &'static [&'static str] = JSON_PATHS;

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseJson {
            field: None,
            shared: ParserShared::new("@timestamp", "%Y-%m-%dT%H:%M:%S.%L%z"),
        };
        let processor = ProductProcessor::multiline(ParseMultilineRegex::new(json_rules(), Vec::new())?)
            .then(parse)
            .then(GrepExclude::new("timestamp"));
        // `log.level`은 중첩 뒤에 `log` 맵 아래에 있습니다.
        Ok(with_nesting(processor)
            .then(severity_fields(Self::TYPE, json_severity("log.level")).build()?))
    }
}

// [2022-01-17T18:31:37.240+0000][652141][gc,start    ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)
const GC_REGEX: &str = r"\[(?<time>\d+-\d+-\d+T\d+:\d+:\d+.\d+\+\d+)\]\[\d+\]\[(?<type>[A-z,]+)\s*\]\s*(?:GC\((?<gc_run>\d+)\))?\s*(?<message>.*)";

struct ElasticsearchGc;

impl FilesProduct for ElasticsearchGc {
    const TYPE: &'static str = "elasticsearch_gc";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/elasticsearch/gc.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            GC_REGEX,
            ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%z").with_type("gc_run", FieldType::Integer),
        )?;
        Ok(ProductProcessor::new(parse).then(
            ModifyFields::new()
                .with_instrumentation_source(Self::TYPE)
                .build()?,
        ))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Elasticsearch>(registries)?;
    register_files_product::<ElasticsearchJson>(registries)?;
    register_files_product::<ElasticsearchJsonEcs>(registries)?;
    register_files_product::<ElasticsearchGc>(registries)
}
