//! 필드 수정 프로세서 -- Lua 스크립트 생성
//!
//! [`ModifyFields`]는 목적지 필드별 [`ModifyField`] 지시를 하나의 Lua
//! `process(tag, timestamp, record)` 함수로 컴파일합니다.
//!
//! # 실행 순서
//! 1. 원본 필드를 지역 변수로 읽음
//! 2. `omit_if` 조건 평가 (수정 전 레코드 기준)
//! 3. `move_from` 원본 삭제
//! 4. 목적지별로 기본값 → 값 매핑 → 타입 변환 → omit 적용
//! 5. 목적지 기록
//!
//! 목적지는 이름 순으로 처리됩니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::{self, Component};
use opsconf_core::types::{FieldType, SeverityPolicy};

use crate::component::{Inspect, LoggingProcessor};
use crate::error::LoggingError;
use crate::severity::SeverityTable;

/// 계측 소스 레이블 필드
pub const INSTRUMENTATION_SOURCE_LABEL: &str =
    r#"labels."logging.googleapis.com/instrumentation_source""#;

/// `severity` 목적지가 기록되는 레코드 키
pub const SEVERITY_KEY: &str = "logging.googleapis.com/severity";

// ─── 필드 경로 ───────────────────────────────────────────────────────

/// 로그 엔트리 필드 경로를 레코드 키 경로로 해석한 값
///
/// | 경로 | 레코드 키 |
/// |---|---|
/// | `jsonPayload.a.b` | `a` / `b` |
/// | `severity` | `logging.googleapis.com/severity` |
/// | `labels."k"` | `logging.googleapis.com/labels` / `k` |
/// | `httpRequest.x` | `logging.googleapis.com/http_request` / `x` |
/// | `sourceLocation.x` | `logging.googleapis.com/sourceLocation` / `x` |
/// | `trace`, `spanId`, `logName` | `logging.googleapis.com/<name>` |
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, LoggingError> {
        let invalid = |reason: &str| LoggingError::InvalidFieldPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };

        let parts = split_path(path).ok_or_else(|| invalid("unbalanced quotes"))?;
        let (root, rest) = parts
            .split_first()
            .ok_or_else(|| invalid("empty path"))?;
        if parts.iter().any(String::is_empty) {
            return Err(invalid("empty path segment"));
        }

        let segments = match root.as_str() {
            "jsonPayload" => {
                if rest.is_empty() {
                    return Err(invalid("jsonPayload requires a field name"));
                }
                rest.to_vec()
            }
            "severity" | "trace" | "spanId" | "logName" => {
                if !rest.is_empty() {
                    return Err(invalid("field has no subfields"));
                }
                vec![format!("logging.googleapis.com/{root}")]
            }
            "labels" | "httpRequest" | "sourceLocation" => {
                if rest.len() != 1 {
                    return Err(invalid("exactly one subfield is required"));
                }
                let container = match root.as_str() {
                    "labels" => "logging.googleapis.com/labels",
                    "httpRequest" => "logging.googleapis.com/http_request",
                    _ => "logging.googleapis.com/sourceLocation",
                };
                vec![container.to_owned(), rest[0].clone()]
            }
            _ => return Err(invalid("unknown root field")),
        };
        Ok(Self { segments })
    }

    /// 레코드 키 경로
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn lua_table(&self) -> String {
        let quoted: Vec<String> = self.segments.iter().map(|s| lua_quote(s)).collect();
        format!("{{{}}}", quoted.join(", "))
    }
}

/// `.`으로 구분하되 `"..."` 안의 `.`은 무시합니다. 따옴표는 벗겨집니다.
fn split_path(path: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    let mut quoted_segment = false;
    while let Some(c) = chars.next() {
        match c {
            '"' if current.is_empty() && !quoted_segment => {
                let mut closed = false;
                while let Some(q) = chars.next() {
                    match q {
                        '\\' => current.push(chars.next()?),
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => current.push(other),
                    }
                }
                if !closed {
                    return None;
                }
                quoted_segment = true;
            }
            '.' => {
                parts.push(std::mem::take(&mut current));
                quoted_segment = false;
            }
            _ if quoted_segment => return None,
            other => current.push(other),
        }
    }
    parts.push(current);
    Some(parts)
}

/// `"..."` 문자열 리터럴 하나를 해석합니다.
fn parse_quoted(s: &str) -> Option<String> {
    let inner = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return chars.as_str().is_empty().then_some(out),
            other => out.push(other),
        }
    }
    None
}

/// Lua 문자열 리터럴로 인용합니다.
pub fn lua_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `omit_if` 조건: `<field> = "<value>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmitIf {
    pub field: FieldPath,
    pub value: String,
}

impl OmitIf {
    pub fn parse(expr: &str) -> Result<Self, LoggingError> {
        for (pos, _) in expr.match_indices('=') {
            let (lhs, rhs) = (expr[..pos].trim(), expr[pos + 1..].trim());
            if let Some(value) = parse_quoted(rhs) {
                if let Ok(field) = FieldPath::parse(lhs) {
                    return Ok(Self { field, value });
                }
            }
        }
        Err(LoggingError::field(
            "omit_if",
            format!("expected `<field> = \"<value>\"`, got {expr:?}"),
        ))
    }
}

// ─── ModifyField ─────────────────────────────────────────────────────

/// 목적지 필드 하나에 대한 수정 지시
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifyField {
    #[serde(default)]
    pub move_from: Option<String>,
    #[serde(default)]
    pub copy_from: Option<String>,
    #[serde(default)]
    pub static_value: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub map_values: BTreeMap<String, String>,
    #[serde(default)]
    pub map_values_exclusive: bool,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub omit_if: Option<String>,
}

impl ModifyField {
    /// 고정 값을 기록하는 지시
    pub fn static_value(value: impl Into<String>) -> Self {
        Self {
            static_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn move_from(field: impl Into<String>) -> Self {
        Self {
            move_from: Some(field.into()),
            ..Self::default()
        }
    }

    pub fn copy_from(field: impl Into<String>) -> Self {
        Self {
            copy_from: Some(field.into()),
            ..Self::default()
        }
    }

    /// 값 매핑을 추가합니다 (builder).
    pub fn map(mut self, from: &str, to: &str) -> Self {
        self.map_values.insert(from.to_owned(), to.to_owned());
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.map_values_exclusive = true;
        self
    }

    /// `<field> = "<value>"`이면 목적지를 쓰지 않습니다 (builder).
    pub fn omit_if(mut self, expr: impl Into<String>) -> Self {
        self.omit_if = Some(expr.into());
        self
    }

    fn validate(&self, dest: &str) -> Result<(), LoggingError> {
        let sources = [
            self.move_from.is_some(),
            self.copy_from.is_some(),
            self.static_value.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() > 1 {
            return Err(LoggingError::field(
                dest,
                "at most one of move_from, copy_from, static_value may be set",
            ));
        }
        if let Some(src) = self.move_from.as_deref().or(self.copy_from.as_deref()) {
            FieldPath::parse(src)?;
        }
        if let Some(expr) = &self.omit_if {
            OmitIf::parse(expr)?;
        }
        Ok(())
    }
}

/// `instrumentation_source` 레이블에 `agent.googleapis.com/<type>`을 기록하는 지시
pub fn instrumentation_source(type_id: &str) -> (String, ModifyField) {
    (
        INSTRUMENTATION_SOURCE_LABEL.to_owned(),
        ModifyField::static_value(format!("agent.googleapis.com/{type_id}")),
    )
}

// ─── ModifyFields ────────────────────────────────────────────────────

/// 필드 수정 설정 (`modify_fields`)
///
/// 빌더로 지시를 모은 뒤 [`build`](Self::build)로 검증된
/// [`ModifyFieldsFilter`]를 만듭니다. 경로와 조건 오류는 이때 드러납니다.
#[derive(Debug, Clone, Default)]
pub struct ModifyFields {
    pub fields: BTreeMap<String, ModifyField>,
    pub severity: Option<SeverityTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModifyFieldsConfig {
    fields: BTreeMap<String, ModifyField>,
}

impl ModifyFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드 지시를 추가합니다 (builder).
    pub fn field(mut self, dest: impl Into<String>, field: ModifyField) -> Self {
        self.fields.insert(dest.into(), field);
        self
    }

    /// 심각도 테이블을 붙입니다 (builder).
    pub fn with_severity(mut self, table: SeverityTable) -> Self {
        self.severity = Some(table);
        self
    }

    /// 계측 소스 레이블을 추가합니다 (builder).
    pub fn with_instrumentation_source(mut self, type_id: &str) -> Self {
        let (dest, field) = instrumentation_source(type_id);
        self.fields.insert(dest, field);
        self
    }

    /// 사용자 설정 본문에서 필터를 만듭니다.
    pub fn from_value(body: serde_yaml::Value) -> Result<ModifyFieldsFilter, LoggingError> {
        let cfg: ModifyFieldsConfig = serde_yaml::from_value(body)?;
        Self {
            fields: cfg.fields,
            severity: None,
        }
        .build()
    }

    /// 모든 경로와 조건을 검증합니다.
    pub fn validate(&self) -> Result<(), LoggingError> {
        self.compile().map(|_| ())
    }

    /// 검증을 거쳐 필터를 만듭니다.
    pub fn build(self) -> Result<ModifyFieldsFilter, LoggingError> {
        let plans = self.compile()?;
        let severity_plan = self
            .severity
            .as_ref()
            .and_then(|_| plans.iter().position(|p| p.dest_name == "severity"));
        Ok(ModifyFieldsFilter {
            plans,
            severity: self.severity,
            severity_plan,
        })
    }

    /// 목적지 이름 순의 실행 계획. 심각도 지시는 선언 정책으로 만들고,
    /// 배타 여부는 생성 시점 정책으로 다시 정합니다.
    fn compile(&self) -> Result<Vec<FieldPlan>, LoggingError> {
        let mut fields = self.fields.clone();
        if let Some(table) = &self.severity {
            fields.insert(
                "severity".to_owned(),
                table.clone().into_modify_field(SeverityPolicy::Declared),
            );
        }

        fields
            .into_iter()
            .map(|(dest_name, field)| {
                let dest = FieldPath::parse(&dest_name)?;
                field.validate(&dest_name)?;
                let source = match (&field.move_from, &field.copy_from, &field.static_value) {
                    (Some(src), _, _) => Source::Move(FieldPath::parse(src)?),
                    (None, Some(src), _) => Source::Copy(FieldPath::parse(src)?),
                    (None, None, Some(value)) => Source::Static(value.clone()),
                    (None, None, None) => Source::Current,
                };
                let omit = field.omit_if.as_deref().map(OmitIf::parse).transpose()?;
                Ok(FieldPlan {
                    dest_name,
                    dest,
                    source,
                    omit,
                    field,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Source {
    Move(FieldPath),
    Copy(FieldPath),
    Static(String),
    /// 목적지의 현재 값
    Current,
}

#[derive(Debug, Clone)]
struct FieldPlan {
    dest_name: String,
    dest: FieldPath,
    source: Source,
    omit: Option<OmitIf>,
    field: ModifyField,
}

impl FieldPlan {
    fn read_path(&self) -> Option<&FieldPath> {
        match &self.source {
            Source::Move(path) | Source::Copy(path) => Some(path),
            Source::Static(_) => None,
            Source::Current => Some(&self.dest),
        }
    }
}

/// 스크립트에 한 줄을 덧붙입니다.
fn line(script: &mut String, args: fmt::Arguments<'_>) {
    script.push_str(&args.to_string());
    script.push('\n');
}

/// 검증된 필드 수정 프로세서
///
/// 모든 경로가 이미 해석되어 있어 스크립트 생성은 실패하지 않습니다.
#[derive(Debug, Clone)]
pub struct ModifyFieldsFilter {
    plans: Vec<FieldPlan>,
    severity: Option<SeverityTable>,
    severity_plan: Option<usize>,
}

impl ModifyFieldsFilter {
    /// 목적지 필드 수
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// 목적지 `dest`의 지시
    pub fn field(&self, dest: &str) -> Option<&ModifyField> {
        self.plans
            .iter()
            .find(|p| p.dest_name == dest)
            .map(|p| &p.field)
    }

    /// Lua 스크립트를 생성합니다.
    pub fn lua_script(&self, ctx: &GenContext) -> String {
        let mut script = String::from(LUA_HELPERS);
        script.push_str("function process(tag, timestamp, record)\n");

        // 1. 원본 읽기
        let mut sources: Vec<&FieldPath> = Vec::new();
        let mut source_of = Vec::with_capacity(self.plans.len());
        for plan in &self.plans {
            let index = plan.read_path().map(|path| {
                if let Some(i) = sources.iter().position(|p| *p == path) {
                    return i;
                }
                let i = sources.len();
                line(
                    &mut script,
                    format_args!("  local __src_{i} = __get(record, {})", path.lua_table()),
                );
                sources.push(path);
                i
            });
            source_of.push(index);
        }

        // 2. omit_if 평가
        for (i, plan) in self.plans.iter().enumerate() {
            if let Some(omit) = &plan.omit {
                line(
                    &mut script,
                    format_args!(
                        "  local __omit_{i} = __get(record, {}) == {}",
                        omit.field.lua_table(),
                        lua_quote(&omit.value)
                    ),
                );
            }
        }

        // 3. move_from 삭제
        for plan in &self.plans {
            if let Source::Move(path) = &plan.source {
                line(&mut script, format_args!("  __set(record, {}, nil)", path.lua_table()));
            }
        }

        // 4-5. 변환 및 기록
        for (i, plan) in self.plans.iter().enumerate() {
            let field = &plan.field;
            let v = format!("__v_{i}");
            let initial = match (source_of[i], &plan.source) {
                (Some(src), _) => format!("__src_{src}"),
                (None, Source::Static(value)) => lua_quote(value),
                (None, _) => "nil".to_owned(),
            };
            line(&mut script, format_args!("  local {v} = {initial}"));

            if let Some(default) = &field.default_value {
                line(
                    &mut script,
                    format_args!("  if {v} == nil then {v} = {} end", lua_quote(default)),
                );
            }

            if !field.map_values.is_empty() {
                for (j, (from, to)) in field.map_values.iter().enumerate() {
                    let keyword = if j == 0 { "if" } else { "elseif" };
                    line(
                        &mut script,
                        format_args!(
                            "  {keyword} {v} == {} then {v} = {}",
                            lua_quote(from),
                            lua_quote(to)
                        ),
                    );
                }
                let exclusive = match (&self.severity, self.severity_plan) {
                    (Some(table), Some(s)) if s == i => {
                        table.effective_exclusive(ctx.severity_policy)
                    }
                    _ => field.map_values_exclusive,
                };
                if exclusive {
                    line(&mut script, format_args!("  else {v} = nil"));
                }
                script.push_str("  end\n");
            }

            match field.field_type {
                Some(FieldType::Integer) => line(
                    &mut script,
                    format_args!(
                        "  if {v} ~= nil then local n = tonumber({v}); if n ~= nil then {v} = math.floor(n) end end"
                    ),
                ),
                Some(FieldType::Float) => line(
                    &mut script,
                    format_args!(
                        "  if {v} ~= nil then local n = tonumber({v}); if n ~= nil then {v} = n end end"
                    ),
                ),
                Some(FieldType::String) => line(
                    &mut script,
                    format_args!("  if {v} ~= nil then {v} = tostring({v}) end"),
                ),
                Some(FieldType::YesNoBoolean) => line(
                    &mut script,
                    format_args!(
                        "  if {v} == \"Yes\" then {v} = true elseif {v} == \"No\" then {v} = false end"
                    ),
                ),
                None => {}
            }

            if plan.omit.is_some() {
                line(&mut script, format_args!("  if __omit_{i} then {v} = nil end"));
            }

            line(
                &mut script,
                format_args!("  __set(record, {}, {v})", plan.dest.lua_table()),
            );
        }

        script.push_str("  return 2, timestamp, record\nend\n");
        script
    }
}

const LUA_HELPERS: &str = r#"local function __get(record, path)
  local v = record
  for _, k in ipairs(path) do
    if type(v) ~= "table" then return nil end
    v = v[k]
  end
  return v
end

local function __set(record, path, value)
  local t = record
  for i = 1, #path - 1 do
    local k = path[i]
    if type(t[k]) ~= "table" then
      if value == nil then return end
      t[k] = {}
    end
    t = t[k]
  end
  t[path[#path]] = value
end

"#;

impl LoggingProcessor for ModifyFieldsFilter {
    fn components(&self, ctx: &GenContext, tag: &str, _uid: &str) -> Vec<Component> {
        vec![fluentbit::lua_filter(tag, "process", &self.lua_script(ctx))]
    }

    fn inspect(&self) -> Inspect<'_> {
        Inspect {
            severity: self.severity.as_ref(),
            ..Inspect::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_core::types::{Severity, SeverityPolicy};

    #[test]
    fn field_path_json_payload() {
        let p = FieldPath::parse("jsonPayload.a.b").unwrap();
        assert_eq!(p.segments(), ["a", "b"]);
    }

    #[test]
    fn field_path_special_roots() {
        assert_eq!(
            FieldPath::parse("severity").unwrap().segments(),
            ["logging.googleapis.com/severity"]
        );
        assert_eq!(
            FieldPath::parse("httpRequest.status").unwrap().segments(),
            ["logging.googleapis.com/http_request", "status"]
        );
        assert_eq!(
            FieldPath::parse(INSTRUMENTATION_SOURCE_LABEL).unwrap().segments(),
            [
                "logging.googleapis.com/labels",
                "logging.googleapis.com/instrumentation_source"
            ]
        );
    }

    #[test]
    fn field_path_quoted_json_segment() {
        let p = FieldPath::parse(r#"jsonPayload."a.b".c"#).unwrap();
        assert_eq!(p.segments(), ["a.b", "c"]);
    }

    #[test]
    fn field_path_rejects_bad_paths() {
        for bad in [
            "",
            "jsonPayload",
            "severity.x",
            "labels",
            "labels.a.b",
            "bogus.x",
            "jsonPayload..a",
            r#"jsonPayload."open"#,
        ] {
            assert!(FieldPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn omit_if_parses_equality() {
        let omit = OmitIf::parse(r#"jsonPayload.level = "-""#).unwrap();
        assert_eq!(omit.field.segments(), ["level"]);
        assert_eq!(omit.value, "-");
        assert!(OmitIf::parse("jsonPayload.level").is_err());
        assert!(OmitIf::parse("jsonPayload.level = bare").is_err());
    }

    #[test]
    fn lua_quote_escapes() {
        assert_eq!(lua_quote(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(lua_quote("x\ny"), r#""x\ny""#);
    }

    #[test]
    fn validate_rejects_multiple_sources() {
        let field = ModifyField {
            move_from: Some("jsonPayload.a".to_owned()),
            static_value: Some("x".to_owned()),
            ..ModifyField::default()
        };
        let p = ModifyFields::new().field("jsonPayload.b", field);
        assert!(p.validate().is_err());
    }

    #[test]
    fn from_value_parses_user_fields() {
        let body: serde_yaml::Value = serde_yaml::from_str(
            r#"
fields:
  severity:
    move_from: jsonPayload.level
    map_values:
      W: WARNING
    map_values_exclusive: true
  jsonPayload.count:
    type: integer
"#,
        )
        .unwrap();
        let p = ModifyFields::from_value(body).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(
            p.field("jsonPayload.count").unwrap().field_type,
            Some(FieldType::Integer)
        );
    }

    #[test]
    fn from_value_rejects_unknown_keys() {
        let body: serde_yaml::Value =
            serde_yaml::from_str("fields:\n  severity:\n    rename_to: x\n").unwrap();
        assert!(ModifyFields::from_value(body).is_err());
    }

    #[test]
    fn script_moves_maps_and_writes() {
        let p = ModifyFields::new().field(
            "severity",
            ModifyField::move_from("jsonPayload.level")
                .map("W", "WARNING")
                .map("E", "ERROR")
                .exclusive(),
        );
        let script = p.build().unwrap().lua_script(&GenContext::default());
        assert!(script.contains(r#"local __src_0 = __get(record, {"level"})"#));
        assert!(script.contains(r#"__set(record, {"level"}, nil)"#));
        assert!(script.contains(r#"if __v_0 == "E" then __v_0 = "ERROR""#));
        assert!(script.contains(r#"elseif __v_0 == "W" then __v_0 = "WARNING""#));
        assert!(script.contains("else __v_0 = nil"));
        assert!(script.contains(r#"__set(record, {"logging.googleapis.com/severity"}, __v_0)"#));
        assert!(script.trim_end().ends_with("end"));

        // 삭제가 기록보다 먼저
        let remove = script.find(r#"__set(record, {"level"}, nil)"#).unwrap();
        let write = script.find("__set(record, {\"logging.googleapis.com/severity\"}").unwrap();
        assert!(remove < write);
    }

    #[test]
    fn script_shares_reads_of_same_source() {
        let p = ModifyFields::new()
            .field("jsonPayload.a", ModifyField::copy_from("jsonPayload.src"))
            .field("jsonPayload.b", ModifyField::copy_from("jsonPayload.src"));
        let script = p.build().unwrap().lua_script(&GenContext::default());
        assert_eq!(script.matches("local __src_").count(), 1);
    }

    #[test]
    fn script_applies_default_type_and_omit() {
        let field = ModifyField {
            default_value: Some("0".to_owned()),
            field_type: Some(FieldType::Integer),
            omit_if: Some(r#"jsonPayload.flag = "skip""#.to_owned()),
            ..ModifyField::default()
        };
        let p = ModifyFields::new().field("jsonPayload.n", field);
        let script = p.build().unwrap().lua_script(&GenContext::default());
        assert!(script.contains(r#"if __v_0 == nil then __v_0 = "0" end"#));
        assert!(script.contains("math.floor(n)"));
        assert!(script.contains(r#"local __omit_0 = __get(record, {"flag"}) == "skip""#));
        assert!(script.contains("if __omit_0 then __v_0 = nil end"));
    }

    #[test]
    fn instrumentation_source_is_static_label() {
        let p = ModifyFields::new().with_instrumentation_source("mysql_error");
        let script = p.build().unwrap().lua_script(&GenContext::default());
        assert!(script.contains(r#"local __v_0 = "agent.googleapis.com/mysql_error""#));
        assert!(script.contains(
            r#"{"logging.googleapis.com/labels", "logging.googleapis.com/instrumentation_source"}"#
        ));
    }

    #[test]
    fn severity_table_is_resolved_with_context_policy() {
        let table = SeverityTable::new("level", &[("W", Severity::Warning)], true);
        let p = ModifyFields::new().with_severity(table).build().unwrap();

        let declared = p.lua_script(&GenContext::default());
        assert!(declared.contains("else __v_0 = nil"));

        let mut ctx = GenContext::default();
        ctx.severity_policy = SeverityPolicy::Passthrough;
        let passthrough = p.lua_script(&ctx);
        assert!(!passthrough.contains("else __v_0 = nil"));

        assert!(p.inspect().severity.is_some());
    }

    #[test]
    fn components_emit_single_lua_filter() {
        let p = ModifyFields::new()
            .with_instrumentation_source("redis")
            .build()
            .unwrap();
        let c = p.components(&GenContext::default(), "t", "u");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].get("Name"), Some("lua"));
        assert_eq!(c[0].get("call"), Some("process"));
        assert!(c[0].script.is_some());
    }

    #[test]
    fn build_rejects_bad_paths_before_generation() {
        let bad_dest = ModifyFields::new().field("bogus.x", ModifyField::static_value("v"));
        assert!(bad_dest.build().is_err());

        let bad_source = ModifyFields::new().field("jsonPayload.a", ModifyField::move_from("labels"));
        assert!(bad_source.build().is_err());

        let bad_omit = ModifyFields::new().field(
            "jsonPayload.a",
            ModifyField {
                omit_if: Some("jsonPayload.a == x".to_owned()),
                ..ModifyField::default()
            },
        );
        assert!(bad_omit.build().is_err());
    }

    #[test]
    fn built_filter_always_emits_its_script() {
        let table = SeverityTable::new("level", &[("E", Severity::Error)], false);
        let p = ModifyFields::new()
            .with_severity(table)
            .field("jsonPayload.n", ModifyField::copy_from("jsonPayload.m"))
            .build()
            .unwrap();
        for policy in [
            SeverityPolicy::Declared,
            SeverityPolicy::Exclusive,
            SeverityPolicy::Passthrough,
        ] {
            let mut ctx = GenContext::default();
            ctx.severity_policy = policy;
            let c = p.components(&ctx, "t", "u");
            assert_eq!(c.len(), 1, "{policy:?}");
            assert!(c[0].script.as_ref().is_some_and(|s| s.contents.contains("__v_1")));
        }
    }
}
