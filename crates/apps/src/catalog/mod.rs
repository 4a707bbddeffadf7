//! 제품 카탈로그 -- 레지스트리 초기화와 제품 디스크립터 공통 틀
//!
//! [`build_registries`]가 모든 디스크립터를 명시적으로 등록합니다.
//! 모듈 로드 시점의 부수 효과로 등록하는 코드는 없습니다.
//!
//! # 파일 프로세서 매크로
//! 로그 제품 하나는 [`FilesProduct`] 정의 하나로 두 디스크립터가 됩니다.
//! - 프로세서 `<type>`: 파싱 + 심각도 + 계측 소스 레이블
//! - 수신기 `<type>`: 파일 수신기 필드 + 기본 경로 + 위 프로세서
//!
//! 수신기로 쓰일 때 프로세서의 멀티라인 규칙은 INPUT으로 옮겨집니다.

pub mod builtin;
pub mod generic;

mod active_directory_ds;
mod activemq;
mod aerospike;
mod apache;
mod cassandra;
mod couchbase;
mod couchdb;
mod dcgm;
mod elasticsearch;
mod flink;
mod hadoop;
mod hbase;
mod iis;
mod jetty;
mod jvm;
mod kafka;
mod memcached;
mod mongodb;
mod mssql;
mod mysql;
mod nginx;
mod nvml;
mod oracledb;
mod postgresql;
mod rabbitmq;
mod redis;
mod saphana;
mod solr;
mod sqlserver;
mod tomcat;
mod varnish;
mod vault;
mod wildfly;
mod zookeeper;

use serde::de::DeserializeOwned;
use tracing::info;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::fluentbit::Component;
use opsconf_core::otel;
use opsconf_core::registry::ComponentRegistry;
use opsconf_core::types::{MultilineFallback, PlatformFilter, Secret};
use opsconf_logging::multiline::START_STATE;
use opsconf_logging::receiver::FilesReceiverConfig;
use opsconf_logging::{
    Inspect, LoggingError, LoggingProcessor, LoggingReceiver, ModifyFields, MultilineRule,
    MultilineRules, ParseMultilineRegex, ProcessorChain, ProductFilesReceiver, SeverityTable,
};
use opsconf_metrics::processors::{agent_scope, metrics_transform, transformation_metrics};
use opsconf_metrics::shared::parse_strict;
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{MetricsError, MetricsProcessor, MetricsReceiver, Transform};

// ─── Registries ──────────────────────────────────────────────────────

/// 네 종류의 디스크립터 레지스트리
pub struct Registries {
    pub logging_receivers: ComponentRegistry<dyn LoggingReceiver>,
    pub logging_processors: ComponentRegistry<dyn LoggingProcessor>,
    pub metrics_receivers: ComponentRegistry<dyn MetricsReceiver>,
    pub metrics_processors: ComponentRegistry<dyn MetricsProcessor>,
}

impl Registries {
    /// 비어 있는 레지스트리 묶음
    pub fn new() -> Self {
        Self {
            logging_receivers: ComponentRegistry::new("logging", "receiver"),
            logging_processors: ComponentRegistry::new("logging", "processor"),
            metrics_receivers: ComponentRegistry::new("metrics", "receiver"),
            metrics_processors: ComponentRegistry::new("metrics", "processor"),
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

/// 모든 범용 컴포넌트와 제품 디스크립터를 등록한 레지스트리를 만듭니다.
pub fn build_registries() -> Result<Registries, OpsconfError> {
    let mut registries = Registries::new();

    generic::register(&mut registries)?;

    active_directory_ds::register(&mut registries)?;
    activemq::register(&mut registries)?;
    aerospike::register(&mut registries)?;
    apache::register(&mut registries)?;
    cassandra::register(&mut registries)?;
    couchbase::register(&mut registries)?;
    couchdb::register(&mut registries)?;
    dcgm::register(&mut registries)?;
    elasticsearch::register(&mut registries)?;
    flink::register(&mut registries)?;
    hadoop::register(&mut registries)?;
    hbase::register(&mut registries)?;
    iis::register(&mut registries)?;
    jetty::register(&mut registries)?;
    jvm::register(&mut registries)?;
    kafka::register(&mut registries)?;
    memcached::register(&mut registries)?;
    mongodb::register(&mut registries)?;
    mssql::register(&mut registries)?;
    mysql::register(&mut registries)?;
    nginx::register(&mut registries)?;
    nvml::register(&mut registries)?;
    oracledb::register(&mut registries)?;
    postgresql::register(&mut registries)?;
    rabbitmq::register(&mut registries)?;
    redis::register(&mut registries)?;
    saphana::register(&mut registries)?;
    solr::register(&mut registries)?;
    sqlserver::register(&mut registries)?;
    tomcat::register(&mut registries)?;
    varnish::register(&mut registries)?;
    vault::register(&mut registries)?;
    wildfly::register(&mut registries)?;
    zookeeper::register(&mut registries)?;

    info!(
        logging_receivers = registries.logging_receivers.count(),
        logging_processors = registries.logging_processors.count(),
        metrics_receivers = registries.metrics_receivers.count(),
        metrics_processors = registries.metrics_processors.count(),
        "registries built"
    );
    Ok(registries)
}

// ─── ProductProcessor ────────────────────────────────────────────────

#[derive(Debug)]
enum Parse {
    Steps(ProcessorChain),
    Multiline(ParseMultilineRegex),
}

/// 제품 로그 프로세서: 파싱 단계 하나 + 후처리 단계들
///
/// 모든 단계는 같은 `uid`를 공유합니다.
#[derive(Debug)]
pub struct ProductProcessor {
    parse: Parse,
    post: ProcessorChain,
}

impl ProductProcessor {
    pub fn new(step: impl LoggingProcessor + 'static) -> Self {
        Self {
            parse: Parse::Steps(ProcessorChain::new().then(step)),
            post: ProcessorChain::new(),
        }
    }

    /// 멀티라인 파서로 시작하는 프로세서
    pub fn multiline(parser: ParseMultilineRegex) -> Self {
        Self {
            parse: Parse::Multiline(parser),
            post: ProcessorChain::new(),
        }
    }

    /// 후처리 단계를 추가합니다 (builder).
    pub fn then(mut self, step: impl LoggingProcessor + 'static) -> Self {
        self.post = self.post.then(step);
        self
    }

    /// 멀티라인 규칙을 떼어 내고 나머지 프로세서를 반환합니다.
    ///
    /// 규칙이 없는 프로세서는 그대로 돌려줍니다.
    pub fn into_receiver_parts(self) -> (Option<MultilineRules>, Self) {
        let Self { parse, post } = self;
        match parse {
            Parse::Multiline(parser) => {
                let (rules, complex) = parser.split();
                let rest = Self {
                    parse: Parse::Steps(ProcessorChain::new().then(complex)),
                    post,
                };
                (Some(rules), rest)
            }
            steps => (None, Self { parse: steps, post }),
        }
    }
}

impl LoggingProcessor for ProductProcessor {
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        let mut components = match &self.parse {
            Parse::Steps(chain) => chain.components(ctx, tag, uid),
            Parse::Multiline(parser) => parser.components(ctx, tag, uid),
        };
        components.extend(self.post.components(ctx, tag, uid));
        components
    }

    fn inspect(&self) -> Inspect<'_> {
        let parse = match &self.parse {
            Parse::Steps(chain) => chain.inspect(),
            Parse::Multiline(parser) => parser.inspect(),
        };
        parse.merge(self.post.inspect())
    }
}

// ─── FilesProduct ────────────────────────────────────────────────────

/// 파일 프로세서 매크로 정의
pub trait FilesProduct {
    /// 프로세서와 수신기가 함께 쓰는 타입 ID
    const TYPE: &'static str;
    /// `include_paths`가 없을 때 쓰는 경로
    const DEFAULT_PATHS: &'static [&'static str];
    /// `exclude_paths`가 없을 때 쓰는 경로
    const DEFAULT_EXCLUDE_PATHS: &'static [&'static str] = &[];
    const PLATFORMS: PlatformFilter = PlatformFilter::All;

    fn processor() -> Result<ProductProcessor, LoggingError>;

    /// 수신기로 쓰일 때만 INPUT에 붙는 멀티라인 규칙
    ///
    /// 있으면 프로세서의 규칙보다 우선합니다.
    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        None
    }
}

/// `null` 본문을 빈 매핑으로 바꿉니다.
pub(crate) fn body_or_empty(body: serde_yaml::Value) -> serde_yaml::Value {
    match body {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    }
}

/// 설정 필드가 없는 컴포넌트의 본문을 검사합니다.
pub(crate) fn reject_fields(body: &serde_yaml::Value) -> Result<(), LoggingError> {
    match body {
        serde_yaml::Value::Null => Ok(()),
        serde_yaml::Value::Mapping(map) => match map.keys().next() {
            None => Ok(()),
            Some(key) => Err(LoggingError::field(
                key.as_str().unwrap_or("<non-string key>"),
                "unknown field",
            )),
        },
        _ => Err(LoggingError::field("body", "expected a mapping")),
    }
}

pub(crate) fn files_processor_factory<P: FilesProduct>(
    body: serde_yaml::Value,
) -> Result<Box<dyn LoggingProcessor>, OpsconfError> {
    reject_fields(&body)?;
    Ok(Box::new(P::processor()?))
}

pub(crate) fn files_receiver_factory<P: FilesProduct>(
    body: serde_yaml::Value,
) -> Result<Box<dyn LoggingReceiver>, OpsconfError> {
    let config: FilesReceiverConfig =
        serde_yaml::from_value(body_or_empty(body)).map_err(LoggingError::from)?;
    let mut files = config.into_receiver(P::DEFAULT_PATHS)?;
    if files.exclude_paths.is_empty() {
        files.exclude_paths = P::DEFAULT_EXCLUDE_PATHS.iter().map(|p| (*p).to_owned()).collect();
    }
    let (rules, processor) = P::processor()?.into_receiver_parts();

    let files = match P::receiver_rules() {
        Some(rules) => {
            files.with_multiline(MultilineRules::compile(rules, MultilineFallback::default())?)
        }
        None => match rules {
            Some(rules) => files.with_multiline(rules),
            None => files,
        },
    };
    Ok(Box::new(ProductFilesReceiver::new(files, Box::new(processor))))
}

/// 프로세서와 파일 수신기를 함께 등록합니다.
pub(crate) fn register_files_product<P: FilesProduct>(
    registries: &mut Registries,
) -> Result<(), OpsconfError> {
    registries
        .logging_processors
        .register(P::TYPE, P::PLATFORMS, files_processor_factory::<P>)?;
    registries
        .logging_receivers
        .register(P::TYPE, P::PLATFORMS, files_receiver_factory::<P>)
}

/// `^P`로 시작하는 줄이 레코드를 열고 `^(?!P)`인 줄이 이어 붙는 규칙
pub(crate) fn anchored_rules(pattern: &str) -> Vec<MultilineRule> {
    vec![
        MultilineRule::new(START_STATE, format!("^{pattern}"), "cont"),
        MultilineRule::new("cont", format!("^(?!{pattern})"), "cont"),
    ]
}

/// 심각도 테이블과 계측 소스 레이블을 기록하는 후처리 단계
pub(crate) fn severity_fields(type_id: &str, table: SeverityTable) -> ModifyFields {
    ModifyFields::new()
        .with_severity(table)
        .with_instrumentation_source(type_id)
}

// ─── ProductMetrics ──────────────────────────────────────────────────

/// 제품 메트릭 리시버 정의
///
/// 본문은 `FIELDS`에 없는 키를 거부한 뒤 역직렬화되고 `validate`를 거칩니다.
pub trait ProductMetrics: MetricsReceiver + DeserializeOwned + 'static {
    const TYPE: &'static str;
    const PLATFORMS: PlatformFilter = PlatformFilter::All;
    const FIELDS: &'static [&'static [&'static str]];

    fn validate(&self) -> Result<(), MetricsError> {
        Ok(())
    }
}

fn metrics_factory<R: ProductMetrics>(
    body: serde_yaml::Value,
) -> Result<Box<dyn MetricsReceiver>, OpsconfError> {
    let receiver: R = parse_strict(body, R::FIELDS)?;
    receiver.validate()?;
    Ok(Box::new(receiver))
}

pub(crate) fn register_metrics<R: ProductMetrics>(
    registries: &mut Registries,
) -> Result<(), OpsconfError> {
    registries
        .metrics_receivers
        .register(R::TYPE, R::PLATFORMS, metrics_factory::<R>)
}

// ─── 공통 메트릭 프로세서 ────────────────────────────────────────────

/// `workload.googleapis.com/` 접두어를 붙이는 변환
pub(crate) fn workload_prefix() -> otel::Component {
    metrics_transform(vec![Transform::add_prefix(WORKLOAD_PREFIX)])
}

/// `agent.googleapis.com/<type>` 계측 범위
pub(crate) fn scope(type_id: &str) -> otel::Component {
    transformation_metrics(agent_scope(type_id))
}

/// `host:port` 또는 `/`로 시작하는 소켓 경로인지 검사합니다.
pub(crate) fn validate_endpoint(field: &str, endpoint: Option<&str>) -> Result<(), MetricsError> {
    let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) else {
        return Ok(());
    };
    if endpoint.starts_with('/') || is_host_port(endpoint) {
        Ok(())
    } else {
        Err(MetricsError::parameter(
            field,
            format!("{endpoint:?} must be host:port or an absolute socket path"),
        ))
    }
}

/// `http://` 또는 `https://` URL인지 검사합니다.
pub(crate) fn validate_url(field: &str, url: Option<&str>) -> Result<(), MetricsError> {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return Ok(());
    };
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(MetricsError::parameter(
            field,
            format!("{url:?} must be an http(s) URL"),
        )),
    }
}

/// 사용자 이름과 비밀번호는 함께 지정해야 합니다.
pub(crate) fn validate_credentials(
    username: Option<&str>,
    password: &Secret,
) -> Result<(), MetricsError> {
    let has_user = username.is_some_and(|u| !u.is_empty());
    match (has_user, password.is_empty()) {
        (true, true) => Err(MetricsError::parameter("password", "required with username")),
        (false, false) => Err(MetricsError::parameter("username", "required with password")),
        _ => Ok(()),
    }
}

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
