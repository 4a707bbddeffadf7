//! 통합 사용자 설정 -- `config.yaml` 파싱, 해석, 검증
//!
//! 사용자는 `logging`과 `metrics` 두 섹션에 컴포넌트와 파이프라인을 정의합니다.
//! 각 컴포넌트 본문은 `type` 키와 타입별 필드로 이루어지며, 레지스트리를 거쳐
//! 타입이 있는 디스크립터로 만들어집니다.
//!
//! ```yaml
//! logging:
//!   receivers:
//!     mysql_error:
//!       type: mysql_error
//!   service:
//!     pipelines:
//!       mysql:
//!         receivers: [mysql_error]
//! metrics:
//!   receivers:
//!     mysql:
//!       type: mysql
//!       endpoint: localhost:3306
//!   service:
//!     pipelines:
//!       mysql:
//!         receivers: [mysql]
//! ```
//!
//! # 검증 순서
//! 처음 발견한 오류 하나를 반환합니다.
//! 1. 파이프라인 참조 (내장 `lib:` 프로세서는 항상 참조 가능)
//! 2. 타입별 개수 제한
//! 3. 파이프라인당 JVM 기반 메트릭 리시버 하나
//! 4. 레지스트리를 통한 디스크립터 생성
//! 5. TLS `insecure` 충돌
//! 6. `lib:` 접두어 ID 금지
//! 7. 계측 소스 레이블 쓰기 금지

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use opsconf_core::context::GenContext;
use opsconf_core::error::{ConfigError, OpsconfError, RegistryError};
use opsconf_core::registry::ComponentRegistry;
use opsconf_core::types::Platform;
use opsconf_logging::modify::{FieldPath, INSTRUMENTATION_SOURCE_LABEL};
use opsconf_logging::{LoggingProcessor, LoggingReceiver};
use opsconf_metrics::shared::tls_conflicts;
use opsconf_metrics::{MetricsProcessor, MetricsReceiver};

use crate::catalog::Registries;
use crate::catalog::builtin::{self, BUILTIN_PREFIX};
use crate::error::AppsError;

/// 한 파이프라인에 함께 둘 수 없는 JVM 기반 메트릭 리시버 타입
pub const JVM_RECEIVER_TYPES: [&str; 4] = ["jvm", "activemq", "cassandra", "tomcat"];

/// 파이프라인당 타입별 최대 개수
const COMPONENT_TYPE_LIMITS: [(&str, usize); 2] = [("iis", 1), ("mssql", 1)];

/// 서비스 로그 수준으로 허용되는 값
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

const DEFAULT_LOG_LEVEL: &str = "info";

// ─── 사용자 설정 구조 ───────────────────────────────────────────────

/// `config.yaml` 최상위 구조
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnifiedConfig {
    #[serde(default)]
    pub logging: Option<Section>,
    #[serde(default)]
    pub metrics: Option<Section>,
}

/// `logging` / `metrics` 섹션
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    #[serde(default)]
    pub receivers: BTreeMap<String, serde_yaml::Mapping>,
    #[serde(default)]
    pub processors: BTreeMap<String, serde_yaml::Mapping>,
    #[serde(default)]
    pub service: Option<Service>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineSpec>,
}

/// 파이프라인 하나가 참조하는 컴포넌트 ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default)]
    pub processors: Vec<String>,
}

/// `type`과 나머지 본문으로 나눈 컴포넌트 정의
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub type_id: String,
    /// `type`을 뺀 본문. 필드가 없으면 `Null`
    pub body: serde_yaml::Value,
}

impl ComponentSpec {
    fn from_mapping(
        subagent: &str,
        kind: &str,
        id: &str,
        mapping: &serde_yaml::Mapping,
    ) -> Result<Self, AppsError> {
        let unknown = |reason: &str| AppsError::UnknownComponent {
            subagent: subagent.to_owned(),
            kind: kind.to_owned(),
            id: id.to_owned(),
            reason: reason.to_owned(),
        };
        let mut body = mapping.clone();
        let type_id = match body.remove("type") {
            Some(serde_yaml::Value::String(t)) => t,
            Some(_) => return Err(unknown("\"type\" must be a string")),
            None => return Err(unknown("missing required field \"type\"")),
        };
        let body = if body.is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::Value::Mapping(body)
        };
        Ok(Self { type_id, body })
    }
}

// ─── 해석 결과 ───────────────────────────────────────────────────────

/// 레지스트리에서 만든 디스크립터와 그 타입 ID
#[derive(Debug)]
pub struct Resolved<T: ?Sized> {
    pub type_id: String,
    pub descriptor: Box<T>,
}

/// 검증을 마친 섹션 하나
#[derive(Debug)]
pub struct ResolvedSection<R: ?Sized, P: ?Sized> {
    pub log_level: String,
    pub receivers: BTreeMap<String, Resolved<R>>,
    /// 사용자 정의 프로세서 + 참조된 내장 프로세서
    pub processors: BTreeMap<String, Resolved<P>>,
    pub pipelines: BTreeMap<String, PipelineSpec>,
}

impl<R: ?Sized, P: ?Sized> ResolvedSection<R, P> {
    fn empty() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            receivers: BTreeMap::new(),
            processors: BTreeMap::new(),
            pipelines: BTreeMap::new(),
        }
    }
}

pub type ResolvedLogging = ResolvedSection<dyn LoggingReceiver, dyn LoggingProcessor>;
pub type ResolvedMetrics = ResolvedSection<dyn MetricsReceiver, dyn MetricsProcessor>;

/// 생성 단계에 넘길 검증된 설정
#[derive(Debug)]
pub struct ResolvedConfig {
    pub platform: Platform,
    pub logging: ResolvedLogging,
    pub metrics: ResolvedMetrics,
}

// ─── 파싱 / 해석 ─────────────────────────────────────────────────────

/// 섹션의 컴포넌트 본문을 `type` 기준으로 나눈 결과
struct SectionSpecs<'a> {
    subagent: &'static str,
    section: &'a Section,
    receivers: BTreeMap<String, ComponentSpec>,
    processors: BTreeMap<String, ComponentSpec>,
}

impl<'a> SectionSpecs<'a> {
    fn parse(subagent: &'static str, section: &'a Section) -> Result<Self, AppsError> {
        let split = |kind: &str, components: &BTreeMap<String, serde_yaml::Mapping>| {
            components
                .iter()
                .map(|(id, mapping)| {
                    ComponentSpec::from_mapping(subagent, kind, id, mapping)
                        .map(|spec| (id.clone(), spec))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
        };
        Ok(Self {
            subagent,
            section,
            receivers: split("receiver", &section.receivers)?,
            processors: split("processor", &section.processors)?,
        })
    }

    fn pipelines(&self) -> impl Iterator<Item = (&String, &PipelineSpec)> {
        self.section
            .service
            .iter()
            .flat_map(|service| service.pipelines.iter())
    }

    fn log_level(&self) -> Result<String, AppsError> {
        let level = self
            .section
            .service
            .as_ref()
            .and_then(|s| s.log_level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(AppsError::Validation(format!(
                "{}.service.log_level \"{level}\" must be one of: {}",
                self.subagent,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(level)
    }

    /// 모든 파이프라인 참조가 정의된 컴포넌트를 가리키는지 확인합니다.
    fn check_references(&self, allow_builtin: bool) -> Result<(), AppsError> {
        for (pipeline, spec) in self.pipelines() {
            for id in &spec.receivers {
                if !self.receivers.contains_key(id) {
                    return Err(self.undefined("receiver", id, pipeline));
                }
            }
            for id in &spec.processors {
                let builtin_ok = allow_builtin && builtin::is_builtin(id);
                if !self.processors.contains_key(id) && !builtin_ok {
                    return Err(self.undefined("processor", id, pipeline));
                }
            }
        }
        Ok(())
    }

    fn undefined(&self, kind: &str, id: &str, pipeline: &str) -> AppsError {
        AppsError::UndefinedReference {
            subagent: self.subagent.to_owned(),
            kind: kind.to_owned(),
            id: id.to_owned(),
            pipeline: pipeline.to_owned(),
        }
    }

    /// 파이프라인마다 타입별 개수 제한을 확인합니다.
    fn check_type_limits(&self) -> Result<(), AppsError> {
        for (_, spec) in self.pipelines() {
            for (kind, refs, specs) in [
                ("receiver", &spec.receivers, &self.receivers),
                ("processor", &spec.processors, &self.processors),
            ] {
                let counts = type_counts(refs, specs);
                for (type_id, limit) in COMPONENT_TYPE_LIMITS {
                    if counts.get(type_id).copied().unwrap_or(0) > limit {
                        return Err(AppsError::Validation(format!(
                            "at most one {} {kind} with type \"{type_id}\" is allowed.",
                            self.subagent
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// JVM 기반 리시버는 파이프라인당 하나만 둘 수 있습니다.
    fn check_jvm_receivers(&self) -> Result<(), AppsError> {
        for (_, spec) in self.pipelines() {
            let counts = type_counts(&spec.receivers, &self.receivers);
            let jvm: usize = JVM_RECEIVER_TYPES
                .iter()
                .map(|t| counts.get(*t).copied().unwrap_or(0))
                .sum();
            if jvm > 1 {
                return Err(AppsError::Validation(format!(
                    "at most one metrics receiver of JVM types [{}] is allowed: \
                     JVM based receivers currently conflict, and only one can be configured",
                    JVM_RECEIVER_TYPES.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// 사용자 ID는 내장 프로세서 접두어로 시작할 수 없습니다.
    fn check_reserved_ids(&self) -> Result<(), AppsError> {
        let ids = [
            ("receiver", self.section.receivers.keys().collect::<Vec<_>>()),
            ("processor", self.section.processors.keys().collect()),
            ("pipeline", self.pipelines().map(|(id, _)| id).collect()),
        ];
        for (kind, list) in ids {
            if let Some(id) = list.into_iter().find(|id| id.starts_with(BUILTIN_PREFIX)) {
                return Err(AppsError::Validation(format!(
                    "{} {kind} id \"{id}\" must not start with \"{BUILTIN_PREFIX}\"",
                    self.subagent
                )));
            }
        }
        Ok(())
    }

    fn pipeline_map(&self) -> BTreeMap<String, PipelineSpec> {
        self.pipelines()
            .map(|(id, spec)| (id.clone(), spec.clone()))
            .collect()
    }
}

fn type_counts<'s>(
    refs: &[String],
    specs: &'s BTreeMap<String, ComponentSpec>,
) -> BTreeMap<&'s str, usize> {
    let mut counts = BTreeMap::new();
    for spec in refs.iter().filter_map(|id| specs.get(id)) {
        *counts.entry(spec.type_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// 레지스트리 에러에서 사용자에게 보일 사유만 꺼냅니다.
fn reason(err: OpsconfError) -> String {
    match err {
        OpsconfError::Registry(e @ RegistryError::Unsupported { .. }) => e.to_string(),
        OpsconfError::Config(ConfigError::Validation { reason }) => reason,
        other => other.to_string(),
    }
}

fn build_all<T: ?Sized>(
    registry: &ComponentRegistry<T>,
    specs: &BTreeMap<String, ComponentSpec>,
    platform: Platform,
) -> Result<BTreeMap<String, Resolved<T>>, AppsError> {
    let mut built = BTreeMap::new();
    for (id, spec) in specs {
        let descriptor = registry
            .build(&spec.type_id, spec.body.clone(), platform)
            .map_err(|e| AppsError::InvalidComponent {
                subagent: registry.subagent().to_owned(),
                kind: registry.kind().to_owned(),
                id: id.clone(),
                reason: reason(e),
            })?;
        debug!(
            subagent = registry.subagent(),
            kind = registry.kind(),
            id = %id,
            type_id = %spec.type_id,
            "component built"
        );
        built.insert(
            id.clone(),
            Resolved {
                type_id: spec.type_id.clone(),
                descriptor,
            },
        );
    }
    Ok(built)
}

impl UnifiedConfig {
    /// YAML 문자열에서 파싱합니다. 빈 문서는 빈 설정입니다.
    pub fn parse(yaml: &str) -> Result<Self, AppsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// 파일에서 읽어 파싱합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OpsconfError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsconfError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                OpsconfError::Io(e)
            }
        })?;
        Ok(Self::parse(&content)?)
    }

    /// 레지스트리로 모든 컴포넌트를 만들고 검증합니다.
    pub fn resolve(
        &self,
        registries: &Registries,
        ctx: &GenContext,
    ) -> Result<ResolvedConfig, AppsError> {
        let empty = Section::default();
        let logging = SectionSpecs::parse("logging", self.logging.as_ref().unwrap_or(&empty))?;
        let metrics = SectionSpecs::parse("metrics", self.metrics.as_ref().unwrap_or(&empty))?;

        logging.check_references(true)?;
        metrics.check_references(false)?;
        logging.check_type_limits()?;
        metrics.check_type_limits()?;
        metrics.check_jvm_receivers()?;

        let platform = ctx.platform;
        let mut resolved_logging = ResolvedLogging::empty();
        if self.logging.is_some() {
            resolved_logging = ResolvedSection {
                log_level: logging.log_level()?,
                receivers: build_all(&registries.logging_receivers, &logging.receivers, platform)?,
                processors: build_all(
                    &registries.logging_processors,
                    &logging.processors,
                    platform,
                )?,
                pipelines: logging.pipeline_map(),
            };
            add_referenced_builtins(&mut resolved_logging)?;
        }

        let mut resolved_metrics = ResolvedMetrics::empty();
        if self.metrics.is_some() {
            resolved_metrics = ResolvedSection {
                log_level: metrics.log_level()?,
                receivers: build_all(&registries.metrics_receivers, &metrics.receivers, platform)?,
                processors: build_all(
                    &registries.metrics_processors,
                    &metrics.processors,
                    platform,
                )?,
                pipelines: metrics.pipeline_map(),
            };
            check_tls(&resolved_metrics, ctx)?;
        }

        logging.check_reserved_ids()?;
        metrics.check_reserved_ids()?;
        check_writable_fields(&logging)?;

        info!(
            platform = %platform.as_str(),
            logging_pipelines = resolved_logging.pipelines.len(),
            metrics_pipelines = resolved_metrics.pipelines.len(),
            "unified config resolved"
        );
        Ok(ResolvedConfig {
            platform,
            logging: resolved_logging,
            metrics: resolved_metrics,
        })
    }
}

/// 파이프라인이 참조한 내장 프로세서를 프로세서 목록에 추가합니다.
fn add_referenced_builtins(section: &mut ResolvedLogging) -> Result<(), AppsError> {
    let referenced: Vec<String> = section
        .pipelines
        .values()
        .flat_map(|p| p.processors.iter())
        .filter(|id| !section.processors.contains_key(*id))
        .cloned()
        .collect();
    for id in referenced {
        let invalid = |reason: String| AppsError::InvalidComponent {
            subagent: "logging".to_owned(),
            kind: "processor".to_owned(),
            id: id.clone(),
            reason,
        };
        let parser = builtin::builtin(&id)
            .map_err(|e| invalid(e.to_string()))?
            .ok_or_else(|| invalid("unknown built-in processor".to_owned()))?;
        section.processors.insert(
            id.clone(),
            Resolved {
                type_id: id.clone(),
                descriptor: Box::new(parser),
            },
        );
    }
    Ok(())
}

/// `insecure: true`인 TLS 설정에 보안 전용 필드가 있으면 거부합니다.
fn check_tls(section: &ResolvedMetrics, ctx: &GenContext) -> Result<(), AppsError> {
    for (id, receiver) in &section.receivers {
        let pipelines = receiver
            .descriptor
            .pipelines(ctx)
            .map_err(|e| AppsError::InvalidComponent {
                subagent: "metrics".to_owned(),
                kind: "receiver".to_owned(),
                id: id.clone(),
                reason: e.to_string(),
            })?;
        for pipeline in pipelines {
            let Some(tls) = pipeline.receiver.config.get("tls") else {
                continue;
            };
            let conflicts = tls_conflicts(tls);
            if !conflicts.is_empty() {
                let fields: Vec<String> = conflicts.iter().map(|f| format!("\"{f}\"")).collect();
                return Err(AppsError::Validation(format!(
                    "{} are not allowed when \"insecure\" is true, \
                     which indicates TLS is disabled for receiver \"{id}\"",
                    fields.join(", ")
                )));
            }
        }
    }
    Ok(())
}

/// `modify_fields`는 계측 소스 레이블에 쓸 수 없습니다.
fn check_writable_fields(logging: &SectionSpecs<'_>) -> Result<(), AppsError> {
    let Ok(protected) = FieldPath::parse(INSTRUMENTATION_SOURCE_LABEL) else {
        return Ok(());
    };
    for (id, spec) in &logging.processors {
        if spec.type_id != "modify_fields" {
            continue;
        }
        let Some(serde_yaml::Value::Mapping(fields)) = spec.body.get("fields") else {
            continue;
        };
        for key in fields.keys().filter_map(serde_yaml::Value::as_str) {
            if FieldPath::parse(key).is_ok_and(|path| path == protected) {
                return Err(AppsError::Validation(format!(
                    "logging processor \"{id}\": field \"{key}\" is not writable"
                )));
            }
        }
    }
    Ok(())
}
