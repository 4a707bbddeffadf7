//! 메트릭 변환 지시 (metricstransform)
//!
//! [`Transform`]은 메트릭 스트림 하나(또는 정규식에 매칭되는 여러 스트림)에
//! 대한 이름 변경과 [`Operation`] 목록을 순수 데이터로 표현합니다. 변환 목록은
//! 선언 순서 그대로 직렬화되며, 뒤 단계는 앞 단계가 만든 이름을 기준으로
//! 매칭하므로 순서가 의미를 가집니다.
//!
//! ```text
//! mysql.buffer_pool.usage
//!   ──change_prefix──► mysql.buffer_pool_usage
//!   ──rename_metric──► mysql.buffer_pool_size
//!   ──add_prefix─────► workload.googleapis.com/mysql.buffer_pool_size
//! ```
//!
//! [`project_name`]은 이 이름 효과만 로컬에서 적용해 봅니다.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::error::MetricsError;

/// 서드파티 워크로드 메트릭 접두어
pub const WORKLOAD_PREFIX: &str = "workload.googleapis.com";

// ─── 연산 ────────────────────────────────────────────────────────────

/// 라벨 집계 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Max,
    Min,
    Count,
    Median,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
            Self::Count => "count",
            Self::Median => "median",
        }
    }
}

/// 메트릭 하나에 적용되는 연산
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// int ↔ double 전환
    ToggleScalarDataType,
    /// 고정 값 라벨 추가
    AddLabel { key: String, value: String },
    /// 라벨 키 이름 변경
    RenameLabel { old: String, new: String },
    /// 라벨 값 이름 변경 (old → new)
    RenameLabelValues {
        label: String,
        values: BTreeMap<String, String>,
    },
    /// 해당 라벨 값을 가진 스트림 삭제
    DeleteLabelValue { label: String, value: String },
    /// 값에 상수를 곱함
    ScaleValue { factor: f64 },
    /// 나열된 라벨만 남기고 집계
    AggregateLabels {
        aggregation: Aggregation,
        labels: Vec<String>,
    },
    /// 여러 라벨 값을 하나로 합쳐 집계
    AggregateLabelValues {
        aggregation: Aggregation,
        label: String,
        new_value: String,
        old_values: Vec<String>,
    },
}

impl Operation {
    pub fn add_label(key: &str, value: &str) -> Self {
        Self::AddLabel {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }

    pub fn rename_label(old: &str, new: &str) -> Self {
        Self::RenameLabel {
            old: old.to_owned(),
            new: new.to_owned(),
        }
    }

    pub fn rename_label_values(label: &str, values: &[(&str, &str)]) -> Self {
        Self::RenameLabelValues {
            label: label.to_owned(),
            values: values
                .iter()
                .map(|(old, new)| ((*old).to_owned(), (*new).to_owned()))
                .collect(),
        }
    }

    pub fn delete_label_value(label: &str, value: &str) -> Self {
        Self::DeleteLabelValue {
            label: label.to_owned(),
            value: value.to_owned(),
        }
    }

    pub fn aggregate_labels(aggregation: Aggregation, labels: &[&str]) -> Self {
        Self::AggregateLabels {
            aggregation,
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
        }
    }

    pub fn aggregate_label_values(
        aggregation: Aggregation,
        label: &str,
        new_value: &str,
        old_values: &[&str],
    ) -> Self {
        Self::AggregateLabelValues {
            aggregation,
            label: label.to_owned(),
            new_value: new_value.to_owned(),
            old_values: old_values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }

    /// metricstransform `operations` 항목 하나
    pub fn to_value(&self) -> Value {
        match self {
            Self::ToggleScalarDataType => json!({ "action": "toggle_scalar_data_type" }),
            Self::AddLabel { key, value } => json!({
                "action": "add_label",
                "new_label": key,
                "new_value": value,
            }),
            Self::RenameLabel { old, new } => json!({
                "action": "update_label",
                "label": old,
                "new_label": new,
            }),
            Self::RenameLabelValues { label, values } => {
                let actions: Vec<Value> = values
                    .iter()
                    .map(|(old, new)| json!({ "value": old, "new_value": new }))
                    .collect();
                json!({
                    "action": "update_label",
                    "label": label,
                    "value_actions": actions,
                })
            }
            Self::DeleteLabelValue { label, value } => json!({
                "action": "delete_label_value",
                "label": label,
                "label_value": value,
            }),
            Self::ScaleValue { factor } => json!({
                "action": "experimental_scale_value",
                "experimental_scale": factor,
            }),
            Self::AggregateLabels {
                aggregation,
                labels,
            } => json!({
                "action": "aggregate_labels",
                "label_set": labels,
                "aggregation_type": aggregation.as_str(),
            }),
            Self::AggregateLabelValues {
                aggregation,
                label,
                new_value,
                old_values,
            } => json!({
                "action": "aggregate_label_values",
                "aggregation_type": aggregation.as_str(),
                "label": label,
                "new_value": new_value,
                "aggregated_values": old_values,
            }),
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ─── 변환 ────────────────────────────────────────────────────────────

/// `include` 해석 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Strict,
    Regexp,
}

impl MatchType {
    fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// 매칭된 메트릭에 대한 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// 제자리 수정
    Update,
    /// 복제본을 만들어 수정 (원본 유지)
    Insert,
    /// 매칭된 메트릭들을 하나로 합침
    Combine,
}

/// metricstransform `transforms` 항목 하나
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transform {
    pub include: String,
    #[serde(skip_serializing_if = "MatchType::is_strict")]
    pub match_type: MatchType,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submatch_case: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,
}

/// 설정 값의 `$$` 이스케이프를 되돌립니다.
fn unescape(s: &str) -> String {
    s.replace("$$", "$")
}

/// collector 설정에 들어갈 패턴을 RE2 문법으로 컴파일해 봅니다.
///
/// `$$`는 collector 설정 확장에서 `$`가 되므로 되돌린 뒤 컴파일합니다.
pub fn compile_pattern(pattern: &str) -> Result<Regex, MetricsError> {
    Regex::new(&unescape(pattern)).map_err(|e| MetricsError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })
}

impl Transform {
    fn new(include: impl Into<String>, match_type: MatchType, action: Action) -> Self {
        Self {
            include: include.into(),
            match_type,
            action,
            new_name: None,
            submatch_case: None,
            operations: Vec::new(),
        }
    }

    /// 연산 목록을 설정합니다 (builder).
    pub fn with_operations(mut self, operations: Vec<Operation>) -> Self {
        self.operations = operations;
        self
    }

    /// `old`를 `new`로 이름 변경
    pub fn rename_metric(old: &str, new: &str) -> Self {
        let mut t = Self::new(old, MatchType::Strict, Action::Update);
        t.new_name = Some(new.to_owned());
        t
    }

    /// 이름은 그대로 두고 연산만 적용
    pub fn update_metric(metric: &str) -> Self {
        Self::new(metric, MatchType::Strict, Action::Update)
    }

    /// 정규식에 매칭되는 메트릭에 연산만 적용
    pub fn update_metric_regexp(pattern: &str) -> Result<Self, MetricsError> {
        compile_pattern(pattern)?;
        Ok(Self::new(pattern, MatchType::Regexp, Action::Update))
    }

    /// `old`를 `new`로 복제
    pub fn duplicate_metric(old: &str, new: &str) -> Self {
        let mut t = Self::new(old, MatchType::Strict, Action::Insert);
        t.new_name = Some(new.to_owned());
        t
    }

    /// 정규식에 매칭되는 메트릭들을 `new` 하나로 합침
    pub fn combine_metrics(pattern: &str, new: &str) -> Result<Self, MetricsError> {
        compile_pattern(pattern)?;
        let mut t = Self::new(pattern, MatchType::Regexp, Action::Combine);
        t.new_name = Some(new.to_owned());
        t.submatch_case = Some("lower".to_owned());
        Ok(t)
    }

    /// 정규식 이름 변경. `rename`은 `${1}` 형식의 캡처 치환을 지원합니다.
    pub fn regexp_rename(pattern: &str, rename: &str) -> Result<Self, MetricsError> {
        compile_pattern(pattern)?;
        Ok(Self::regexp_rename_unchecked(pattern, rename))
    }

    fn regexp_rename_unchecked(pattern: &str, rename: &str) -> Self {
        let mut t = Self::new(pattern.replace('$', "$$"), MatchType::Regexp, Action::Update);
        t.new_name = Some(rename.replace('$', "$$"));
        t
    }

    /// 모든 메트릭 이름 앞에 `prefix/`를 붙임
    pub fn add_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self::regexp_rename_unchecked("^(.*)$", &format!("{prefix}/${{1}}"))
    }

    /// 정규식 `old_prefix`로 시작하는 이름의 접두어를 `new_prefix`로 교체
    pub fn change_prefix(old_prefix: &str, new_prefix: &str) -> Result<Self, MetricsError> {
        Self::regexp_rename(&format!("^{old_prefix}(.*)$"), &format!("{new_prefix}${{1}}"))
    }

    /// 이 변환이 원래 스트림의 이름에 미치는 효과
    ///
    /// `Insert`는 복제본만 이름이 바뀌므로 원래 이름을 그대로 반환합니다.
    pub fn apply_name(&self, name: &str) -> String {
        match self.match_type {
            MatchType::Strict => {
                if self.include != name {
                    return name.to_owned();
                }
                match (self.action, &self.new_name) {
                    (Action::Insert, _) | (_, None) => name.to_owned(),
                    (_, Some(new)) => new.clone(),
                }
            }
            MatchType::Regexp => {
                let Ok(re) = compile_pattern(&self.include) else {
                    return name.to_owned();
                };
                if !re.is_match(name) {
                    return name.to_owned();
                }
                match (self.action, &self.new_name) {
                    (Action::Insert, _) | (_, None) => name.to_owned(),
                    (Action::Combine, Some(new)) => new.clone(),
                    (Action::Update, Some(new)) => {
                        re.replace_all(name, unescape(new).as_str()).into_owned()
                    }
                }
            }
        }
    }
}

/// 변환 목록의 이름 효과를 선언 순서대로 적용합니다.
pub fn project_name(name: &str, transforms: &[Transform]) -> String {
    transforms
        .iter()
        .fold(name.to_owned(), |current, t| t.apply_name(&current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_prefix_escapes_dollar() {
        let t = Transform::add_prefix(WORKLOAD_PREFIX);
        assert_eq!(t.include, "^(.*)$$");
        assert_eq!(
            t.new_name.as_deref(),
            Some("workload.googleapis.com/$${1}")
        );
        assert_eq!(t.match_type, MatchType::Regexp);
    }

    #[test]
    fn add_prefix_trims_trailing_slash() {
        let t = Transform::add_prefix("workload.googleapis.com/");
        assert_eq!(project_name("a.b", &[t]), "workload.googleapis.com/a.b");
    }

    #[test]
    fn strict_serialization_omits_match_type() {
        let t = Transform::rename_metric("a", "b")
            .with_operations(vec![Operation::ToggleScalarDataType]);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(
            v,
            json!({
                "include": "a",
                "action": "update",
                "new_name": "b",
                "operations": [{ "action": "toggle_scalar_data_type" }],
            })
        );
    }

    #[test]
    fn combine_sets_submatch_case() {
        let t = Transform::combine_metrics(r"^kafka\.(.*)$", "kafka.all").unwrap();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["action"], "combine");
        assert_eq!(v["match_type"], "regexp");
        assert_eq!(v["submatch_case"], "lower");
        assert!(v.get("operations").is_none());
    }

    #[test]
    fn invalid_regexp_rejected() {
        assert!(matches!(
            Transform::regexp_rename("^(unclosed", "x"),
            Err(MetricsError::InvalidPattern { .. })
        ));
        assert!(Transform::update_metric_regexp("[").is_err());
        assert!(Transform::change_prefix("(", "x").is_err());
    }

    #[test]
    fn rename_label_values_sorted_by_old_value() {
        let op = Operation::rename_label_values("state", &[("z", "last"), ("a", "first")]);
        let v = op.to_value();
        assert_eq!(v["action"], "update_label");
        assert_eq!(v["value_actions"][0]["value"], "a");
        assert_eq!(v["value_actions"][1]["new_value"], "last");
    }

    #[test]
    fn operation_wire_forms() {
        assert_eq!(
            Operation::rename_label("status", "kind").to_value(),
            json!({ "action": "update_label", "label": "status", "new_label": "kind" })
        );
        assert_eq!(
            Operation::ScaleValue { factor: 0.001 }.to_value()["action"],
            "experimental_scale_value"
        );
        let agg = Operation::aggregate_label_values(Aggregation::Sum, "state", "other", &["a", "b"]);
        assert_eq!(agg.to_value()["aggregated_values"], json!(["a", "b"]));
        assert_eq!(
            Operation::aggregate_labels(Aggregation::Max, &["x"]).to_value()["label_set"],
            json!(["x"])
        );
        assert_eq!(
            Operation::delete_label_value("l", "v").to_value()["label_value"],
            "v"
        );
        assert_eq!(Operation::add_label("k", "v").to_value()["new_label"], "k");
    }

    #[test]
    fn change_prefix_projection() {
        let t = Transform::change_prefix(r"mysql\.buffer_pool\.", "mysql.buffer_pool_").unwrap();
        assert_eq!(
            project_name("mysql.buffer_pool.pages", &[t.clone()]),
            "mysql.buffer_pool_pages"
        );
        assert_eq!(project_name("mysql.threads", &[t]), "mysql.threads");
    }

    #[test]
    fn duplicate_keeps_original_name() {
        let t = Transform::duplicate_metric("a", "b");
        assert_eq!(project_name("a", &[t]), "a");
    }

    #[test]
    fn combine_projects_to_new_name() {
        let t = Transform::combine_metrics(r"^x\..*$", "x.total").unwrap();
        assert_eq!(project_name("x.one", &[t.clone()]), "x.total");
        assert_eq!(project_name("y.one", &[t]), "y.one");
    }

    #[test]
    fn prefix_must_come_last() {
        let rename = Transform::rename_metric("mysql.buffer_pool_usage", "mysql.buffer_pool_size");
        let prefix = Transform::add_prefix(WORKLOAD_PREFIX);

        let ordered = project_name("mysql.buffer_pool_usage", &[rename.clone(), prefix.clone()]);
        assert_eq!(ordered, "workload.googleapis.com/mysql.buffer_pool_size");

        let reversed = project_name("mysql.buffer_pool_usage", &[prefix, rename]);
        assert_eq!(reversed, "workload.googleapis.com/mysql.buffer_pool_usage");
    }
}
