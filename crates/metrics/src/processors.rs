//! collector 프로세서 생성 함수
//!
//! 모든 함수는 [`otel::Component`]를 반환하며, 메트릭 리시버 디스크립터가
//! 이들을 순서대로 나열해 프로세서 목록을 만듭니다. 정규식 패턴을 받는
//! 함수는 생성 시점에 패턴을 검증합니다.
//!
//! [`otel::Component`]: opsconf_core::otel::Component

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use opsconf_core::otel::Component;

use crate::component::MetricsProcessor;
use crate::error::MetricsError;
use crate::transform::{MatchType, Transform, compile_pattern};

/// 에이전트 계측 범위 접두어
pub const AGENT_SCOPE_PREFIX: &str = "agent.googleapis.com/";

/// 필터 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

// ─── 필터 / 형 변환 ──────────────────────────────────────────────────

/// 이름으로 메트릭을 거르는 `filter` 프로세서
pub fn metrics_filter<I, S>(
    polarity: Polarity,
    match_type: MatchType,
    names: I,
) -> Result<Component, MetricsError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names = strings(names);
    if match_type == MatchType::Regexp {
        for name in &names {
            compile_pattern(name)?;
        }
    }
    let match_type = match match_type {
        MatchType::Strict => "strict",
        MatchType::Regexp => "regexp",
    };
    Ok(Component::new(
        "filter",
        json!({
            "metrics": {
                polarity.as_str(): {
                    "match_type": match_type,
                    "metric_names": names,
                }
            }
        }),
    ))
}

/// OTTL 조건으로 메트릭/데이터포인트를 버리는 `filter` 프로세서
///
/// 조건 중 하나라도 참이면 버립니다. 비어 있는 쪽은 생략합니다.
pub fn metrics_ottl_filter(metric_queries: &[&str], datapoint_queries: &[&str]) -> Component {
    let mut metrics = serde_json::Map::new();
    if !metric_queries.is_empty() {
        metrics.insert("metric".to_owned(), json!(metric_queries));
    }
    if !datapoint_queries.is_empty() {
        metrics.insert("datapoint".to_owned(), json!(datapoint_queries));
    }
    Component::new(
        "filter",
        json!({ "error_mode": "ignore", "metrics": Value::Object(metrics) }),
    )
}

/// 변환 목록을 담은 `metricstransform` 프로세서
pub fn metrics_transform(transforms: Vec<Transform>) -> Component {
    Component::new("metricstransform", json!({ "transforms": transforms }))
}

/// 카운터 정규화
pub fn normalize_sums() -> Component {
    Component::new("normalizesums", json!({}))
}

pub fn cast_to_sum(metrics: &[&str]) -> Component {
    Component::new("casttosum", json!({ "metrics": metrics }))
}

pub fn cumulative_to_delta(metrics: &[&str]) -> Component {
    Component::new(
        "cumulativetodelta",
        json!({ "include": { "metrics": metrics, "match_type": "strict" } }),
    )
}

pub fn delta_to_rate(metrics: &[&str]) -> Component {
    Component::new("deltatorate", json!({ "metrics": metrics }))
}

// ─── transform 쿼리 ─────────────────────────────────────────────────

/// 쿼리가 실행되는 OTTL 컨텍스트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryContext {
    Metric,
    Datapoint,
}

/// transform 프로세서 문장 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformQuery {
    pub context: QueryContext,
    pub statement: String,
}

impl TransformQuery {
    fn datapoint(statement: String) -> Self {
        Self {
            context: QueryContext::Datapoint,
            statement,
        }
    }

    fn metric(statement: String) -> Self {
        Self {
            context: QueryContext::Metric,
            statement,
        }
    }
}

/// 리소스 속성을 메트릭 속성으로 내립니다.
pub fn flatten_resource_attribute(resource_attribute: &str, metric_attribute: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(attributes["{metric_attribute}"], resource.attributes["{resource_attribute}"])"#
    ))
}

/// 메트릭 속성을 리소스 속성으로 올립니다.
pub fn group_by_attribute(attribute: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(resource.attributes["{attribute}"], attributes["{attribute}"])"#
    ))
}

pub fn delete_metric_attribute(attribute: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(r#"delete_key(attributes, "{attribute}")"#))
}

pub fn convert_gauge_to_sum(metric: &str) -> TransformQuery {
    TransformQuery::metric(format!(
        r#"convert_gauge_to_sum("cumulative", true) where name == "{metric}""#
    ))
}

/// summary의 count 값을 `<metric>_count` 합계 메트릭으로 꺼냅니다.
pub fn summary_count_to_sum(metric: &str, monotonic: bool) -> TransformQuery {
    TransformQuery::metric(format!(
        r#"convert_summary_count_val_to_sum("cumulative", {monotonic}) where name == "{metric}""#
    ))
}

/// summary의 sum 값을 `<metric>_sum` 합계 메트릭으로 꺼냅니다.
pub fn summary_sum_to_sum(metric: &str, monotonic: bool) -> TransformQuery {
    TransformQuery::metric(format!(
        r#"convert_summary_sum_val_to_sum("cumulative", {monotonic}) where name == "{metric}""#
    ))
}

pub fn convert_float_to_int(metric: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(value_int, Int(value_double)) where metric.name == "{metric}""#
    ))
}

pub fn set_description(metric: &str, description: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(metric.description, "{description}") where metric.name == "{metric}""#
    ))
}

pub fn set_unit(metric: &str, unit: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(metric.unit, "{unit}") where metric.name == "{metric}""#
    ))
}

pub fn set_name(old: &str, new: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(metric.name, "{new}") where metric.name == "{old}""#
    ))
}

pub fn set_attribute(metric: &str, key: &str, value: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(attributes["{key}"], "{value}") where metric.name == "{metric}""#
    ))
}

/// 나열된 리소스 속성만 남깁니다.
pub fn retain_resource(keys: &[&str]) -> TransformQuery {
    let quoted: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
    TransformQuery::datapoint(format!(
        "keep_keys(resource.attributes, [{}])",
        quoted.join(", ")
    ))
}

pub fn set_scope_name(name: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(r#"set(instrumentation_scope.name, "{name}")"#))
}

pub fn set_scope_version(version: &str) -> TransformQuery {
    TransformQuery::datapoint(format!(
        r#"set(instrumentation_scope.version, "{version}")"#
    ))
}

/// 제품 리시버가 공통으로 붙이는 계측 범위 쿼리
pub fn agent_scope(type_name: &str) -> [TransformQuery; 2] {
    [
        set_scope_name(&format!("{AGENT_SCOPE_PREFIX}{type_name}")),
        set_scope_version("1.0"),
    ]
}

/// 쿼리를 담은 `transform` 프로세서
///
/// 쿼리는 `metric`, `datapoint` 컨텍스트 순으로 묶이며 빈 묶음은 생략합니다.
pub fn transformation_metrics<I>(queries: I) -> Component
where
    I: IntoIterator<Item = TransformQuery>,
{
    let mut metric = Vec::new();
    let mut datapoint = Vec::new();
    for q in queries {
        match q.context {
            QueryContext::Metric => metric.push(q.statement),
            QueryContext::Datapoint => datapoint.push(q.statement),
        }
    }

    let mut statements = Vec::new();
    if !metric.is_empty() {
        statements.push(json!({ "context": "metric", "statements": metric }));
    }
    if !datapoint.is_empty() {
        statements.push(json!({ "context": "datapoint", "statements": datapoint }));
    }
    Component::new("transform", json!({ "metric_statements": statements }))
}

// ─── 리소스 / 범위 ──────────────────────────────────────────────────

/// 계측 범위 이름과 버전을 덮어씁니다. 이름 앞에는 `agent.googleapis.com/`이 붙습니다.
pub fn modify_instrumentation_scope(name: &str, version: &str) -> Component {
    Component::new(
        "modifyscope",
        json!({
            "override_scope_name": format!("{AGENT_SCOPE_PREFIX}{name}"),
            "override_scope_version": version,
        }),
    )
}

/// 같은 리소스를 가진 메트릭 묶음을 하나로 합칩니다.
pub fn condense_resource_metrics() -> Component {
    Component::new("groupbyattrs", json!({}))
}

/// GCP 전용 `resourcedetection` 프로세서
///
/// `override`의 기본값은 true이므로 true일 때는 생략합니다.
pub fn gcp_resource_detector(override_existing: bool) -> Component {
    let mut config = json!({ "detectors": ["gcp"] });
    if !override_existing {
        config["override"] = json!(false);
    }
    Component::new("resourcedetection", config)
}

/// 리소스 속성을 설정하는 `resource` 프로세서 (키 정렬)
pub fn resource_transform(attributes: &BTreeMap<String, String>, override_existing: bool) -> Component {
    let action = if override_existing { "upsert" } else { "insert" };
    let list: Vec<Value> = attributes
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value, "action": action }))
        .collect();
    Component::new("resource", json!({ "attributes": list }))
}

/// 수신기가 붙인 `service.*` 리소스 속성을 제거합니다.
pub fn metrics_remove_service_attributes() -> Component {
    let statements: Vec<String> = [
        "service.name",
        "service.namespace",
        "service.instance.id",
        "service.version",
    ]
    .iter()
    .map(|key| format!(r#"delete_key(attributes, "{key}")"#))
    .collect();
    Component::new(
        "transform",
        json!({
            "error_mode": "ignore",
            "metric_statements": [{ "context": "resource", "statements": statements }],
        }),
    )
}

// ─── exclude_metrics ────────────────────────────────────────────────

/// 제외 패턴이 시작해야 하는 접두어
pub const EXCLUDE_PATTERN_PREFIX: &str = "agent.googleapis.com/";

/// 글롭 패턴(`*`만 와일드카드)을 collector 설정용 정규식으로 바꿉니다.
///
/// 결과는 `$`가 `$$`로 이스케이프된 형태이며 `$$`로 끝납니다.
pub fn glob_to_regex(glob: &str) -> String {
    let literals: Vec<String> = glob
        .split('*')
        .map(|part| regex::escape(part).replace('$', "$$"))
        .collect();
    format!("^{}$$", literals.join(".*"))
}

/// 사용자 설정 `exclude_metrics` 프로세서
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeMetrics {
    #[serde(default)]
    pub metrics_pattern: Vec<String>,
}

impl ExcludeMetrics {
    pub fn from_value(body: serde_yaml::Value) -> Result<Self, MetricsError> {
        let p: Self = serde_yaml::from_value(body)?;
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        for pattern in &self.metrics_pattern {
            if !pattern.starts_with(EXCLUDE_PATTERN_PREFIX) || !pattern.ends_with("/*") {
                return Err(MetricsError::parameter(
                    "metrics_pattern",
                    format!(
                        "{pattern:?} must start with {EXCLUDE_PATTERN_PREFIX:?} and end with \"/*\""
                    ),
                ));
            }
        }
        Ok(())
    }

    /// 패턴이 제외할 메트릭 이름인지 로컬에서 확인합니다.
    pub fn excludes(&self, metric: &str) -> bool {
        self.metrics_pattern
            .iter()
            .filter_map(|glob| compile_pattern(&glob_to_regex(glob)).ok())
            .any(|re| re.is_match(metric))
    }
}

impl MetricsProcessor for ExcludeMetrics {
    fn processors(&self) -> Result<Vec<Component>, MetricsError> {
        let names: Vec<String> = self.metrics_pattern.iter().map(|g| glob_to_regex(g)).collect();
        Ok(vec![metrics_filter(Polarity::Exclude, MatchType::Regexp, names)?])
    }
}
