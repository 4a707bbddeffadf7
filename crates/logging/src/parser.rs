//! 필드 추출 파서 디스크립터
//!
//! 정규식/JSON 파서를 fluent-bit PARSER 섹션과 parser FILTER로 표현합니다.
//! 모든 정규식은 생성 시점에 컴파일되므로 잘못된 패턴은 설정 단계에서 실패합니다.
//!
//! [`RegexParser::preview`]는 다운스트림 엔진이 할 일을 로컬에서 흉내 내는
//! 미리보기입니다.

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::{Component, Kind};
use opsconf_core::metrics::REGEX_COMPILED_TOTAL;
use opsconf_core::types::{FieldType, MultilineFallback};

use crate::component::{Inspect, LoggingProcessor};
use crate::error::LoggingError;
use crate::multiline::{MultilineRule, MultilineRules, start_state_rules};

/// 파서가 기본으로 읽는 필드
pub const DEFAULT_KEY: &str = "message";

// ─── ParserShared ────────────────────────────────────────────────────

/// 파서 공통 설정: 시간 키, 시간 형식, 타입 변환
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserShared {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, FieldType>,
}

impl ParserShared {
    pub fn new(time_key: &str, time_format: &str) -> Self {
        Self {
            time_key: Some(time_key.to_owned()),
            time_format: Some(time_format.to_owned()),
            types: BTreeMap::new(),
        }
    }

    /// 타입 변환 항목을 추가합니다 (builder).
    pub fn with_type(mut self, field: &str, field_type: FieldType) -> Self {
        self.types.insert(field.to_owned(), field_type);
        self
    }

    /// `time_format`을 검증합니다. `%L`(밀리초)은 허용됩니다.
    pub fn validate(&self) -> Result<(), LoggingError> {
        if self.time_key.is_some() && self.time_format.is_none() {
            return Err(LoggingError::field(
                "time_format",
                "required when time_key is set",
            ));
        }
        if let Some(format) = &self.time_format {
            let invalid = chrono_formats(format)
                .iter()
                .any(|f| StrftimeItems::new(f).any(|item| matches!(item, Item::Error)));
            if invalid {
                return Err(LoggingError::InvalidTimeFormat {
                    format: format.clone(),
                    reason: "unsupported strftime directive".to_owned(),
                });
            }
        }
        Ok(())
    }

    /// 이름만 채운 PARSER 섹션. 호출자가 `Format`을 설정합니다.
    fn parser_component(&self, name: &str) -> Component {
        let mut c = Component::new(Kind::Parser).with("Name", name);
        if let Some(format) = &self.time_format {
            c.set("Time_Format", format.clone());
        }
        if let Some(key) = &self.time_key {
            c.set("Time_Key", key.clone());
        }
        if !self.types.is_empty() {
            let types: Vec<String> = self
                .types
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect();
            c.set("Types", types.join(" "));
        }
        c
    }

    fn parse_time(&self, value: &str) -> Option<DateTime<FixedOffset>> {
        let format = self.time_format.as_deref()?;
        let zulu;
        let value = match value.strip_suffix('Z') {
            Some(rest) if format.ends_with("%z") => {
                zulu = format!("{rest}+0000");
                zulu.as_str()
            }
            _ => value,
        };
        chrono_formats(format).iter().find_map(|format| {
            DateTime::parse_from_str(value, format).ok().or_else(|| {
                NaiveDateTime::parse_from_str(value, format)
                    .ok()
                    .map(|naive| naive.and_utc().fixed_offset())
            })
        })
    }
}

/// fluent-bit `%L`(소수 초)은 자릿수가 정해져 있지 않습니다. 3/6/9자리
/// chrono 형식을 차례로 만듭니다.
fn chrono_formats(format: &str) -> Vec<String> {
    if !format.contains("%L") {
        return vec![format.to_owned()];
    }
    ["%3f", "%6f", "%9f"]
        .iter()
        .map(|digits| format.replace("%L", digits))
        .collect()
}

/// 타입 변환. 숫자 변환 실패 시 원래 문자열을 유지합니다.
fn coerce(value: &str, field_type: Option<FieldType>) -> Value {
    match field_type {
        Some(FieldType::Integer) => value
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(value)),
        Some(FieldType::Float) => value
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or_else(|| Value::from(value)),
        Some(FieldType::YesNoBoolean) => match value {
            "Yes" => Value::Bool(true),
            "No" => Value::Bool(false),
            other => Value::from(other),
        },
        Some(FieldType::String) | None => Value::from(value),
    }
}

// ─── 미리보기 레코드 ─────────────────────────────────────────────────

/// 파서 미리보기 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// 추출된 필드 (시간 키는 파싱에 성공하면 빠집니다)
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

// ─── RegexParser ─────────────────────────────────────────────────────

/// 컴파일된 정규식 파서
#[derive(Debug, Clone)]
pub struct RegexParser {
    regex: Regex,
    pub shared: ParserShared,
}

impl RegexParser {
    /// 정규식과 시간 형식을 검증하고 파서를 만듭니다.
    pub fn new(regex: &str, shared: ParserShared) -> Result<Self, LoggingError> {
        shared.validate()?;
        let compiled = Regex::new(regex).map_err(|e| LoggingError::InvalidRegex {
            pattern: regex.to_owned(),
            reason: e.to_string(),
        })?;
        metrics::counter!(REGEX_COMPILED_TOTAL).increment(1);
        Ok(Self {
            regex: compiled,
            shared,
        })
    }

    /// 시간/타입 설정 없는 파서
    pub fn plain(regex: &str) -> Result<Self, LoggingError> {
        Self::new(regex, ParserShared::default())
    }

    pub fn regex(&self) -> &str {
        self.regex.as_str()
    }

    /// `Format regex` PARSER 섹션
    pub fn component(&self, name: &str) -> Component {
        let mut c = self.shared.parser_component(name);
        c.set("Format", "regex");
        c.set("Regex", self.regex().to_owned());
        c
    }

    /// 한 줄에 파서를 적용합니다. 매칭되지 않으면 `None`입니다.
    pub fn preview(&self, line: &str) -> Option<Record> {
        let caps = match self.regex.captures(line) {
            Ok(Some(caps)) => caps,
            Ok(None) => return None,
            Err(e) => {
                warn!(pattern = self.regex(), error = %e, "parser regex evaluation failed");
                return None;
            }
        };

        let mut fields = BTreeMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                let field_type = self.shared.types.get(name).copied();
                fields.insert(name.to_owned(), coerce(m.as_str(), field_type));
            }
        }

        let mut timestamp = None;
        if let Some(key) = &self.shared.time_key {
            let parsed = fields
                .get(key)
                .and_then(Value::as_str)
                .and_then(|raw| self.shared.parse_time(raw));
            if parsed.is_some() {
                fields.remove(key);
                timestamp = parsed;
            }
        }

        Some(Record { fields, timestamp })
    }
}

/// parser FILTER: `Key_Name`, `Reserve_Data True`, 반복되는 `Parser` 항목
pub fn parser_filter(
    tag: &str,
    field: Option<&str>,
    parser_names: &[String],
    preserve_key: bool,
) -> Component {
    let mut c = Component::new(Kind::Filter)
        .with("Match", tag)
        .with("Name", "parser")
        .with("Key_Name", field.unwrap_or(DEFAULT_KEY))
        .with("Reserve_Data", "True");
    if preserve_key {
        c.set("Preserve_Key", "True");
    }
    for name in parser_names {
        c = c.with_ordered("Parser", name.clone());
    }
    c
}

// ─── 프로세서 ────────────────────────────────────────────────────────

/// 필드를 JSON으로 파싱
#[derive(Debug, Clone, Default)]
pub struct ParseJson {
    pub field: Option<String>,
    pub shared: ParserShared,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseJsonConfig {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    time_key: Option<String>,
    #[serde(default)]
    time_format: Option<String>,
    #[serde(default)]
    types: BTreeMap<String, FieldType>,
}

impl ParseJson {
    pub fn from_value(body: serde_yaml::Value) -> Result<Self, LoggingError> {
        let cfg: ParseJsonConfig = serde_yaml::from_value(body)?;
        let shared = ParserShared {
            time_key: cfg.time_key,
            time_format: cfg.time_format,
            types: cfg.types,
        };
        shared.validate()?;
        Ok(Self {
            field: cfg.field,
            shared,
        })
    }
}

impl LoggingProcessor for ParseJson {
    fn components(&self, _ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        let name = format!("{tag}.{uid}");
        let mut parser = self.shared.parser_component(&name);
        parser.set("Format", "json");
        vec![
            parser_filter(tag, self.field.as_deref(), &[name], false),
            parser,
        ]
    }
}

/// 필드에 정규식을 적용해 명명된 캡처를 레코드 키로 저장
#[derive(Debug, Clone)]
pub struct ParseRegex {
    pub field: Option<String>,
    pub parser: RegexParser,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseRegexConfig {
    #[serde(default)]
    field: Option<String>,
    regex: String,
    #[serde(default)]
    time_key: Option<String>,
    #[serde(default)]
    time_format: Option<String>,
    #[serde(default)]
    types: BTreeMap<String, FieldType>,
}

impl ParseRegex {
    pub fn new(regex: &str, shared: ParserShared) -> Result<Self, LoggingError> {
        Ok(Self {
            field: None,
            parser: RegexParser::new(regex, shared)?,
        })
    }

    pub fn from_value(body: serde_yaml::Value) -> Result<Self, LoggingError> {
        let cfg: ParseRegexConfig = serde_yaml::from_value(body)?;
        let shared = ParserShared {
            time_key: cfg.time_key,
            time_format: cfg.time_format,
            types: cfg.types,
        };
        Ok(Self {
            field: cfg.field,
            parser: RegexParser::new(&cfg.regex, shared)?,
        })
    }
}

impl LoggingProcessor for ParseRegex {
    fn components(&self, _ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        let name = format!("{tag}.{uid}");
        vec![
            parser_filter(tag, self.field.as_deref(), std::slice::from_ref(&name), false),
            self.parser.component(&name),
        ]
    }

    fn inspect(&self) -> Inspect<'_> {
        Inspect {
            parsers: vec![&self.parser],
            ..Inspect::default()
        }
    }
}

/// 여러 정규식을 순서대로 시도하는 파서 (처음 매칭된 것이 적용됨)
#[derive(Debug, Clone, Default)]
pub struct ParseRegexComplex {
    pub field: Option<String>,
    pub parsers: Vec<RegexParser>,
}

impl ParseRegexComplex {
    pub fn new(parsers: Vec<RegexParser>) -> Self {
        Self {
            field: None,
            parsers,
        }
    }
}

impl LoggingProcessor for ParseRegexComplex {
    fn components(&self, _ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        if self.parsers.is_empty() {
            return Vec::new();
        }
        let names: Vec<String> = (0..self.parsers.len())
            .map(|idx| format!("{tag}.{uid}.{idx}"))
            .collect();
        let mut components = vec![parser_filter(tag, self.field.as_deref(), &names, true)];
        components.extend(
            self.parsers
                .iter()
                .zip(&names)
                .map(|(parser, name)| parser.component(name)),
        );
        components
    }

    fn inspect(&self) -> Inspect<'_> {
        Inspect {
            parsers: self.parsers.iter().collect(),
            ..Inspect::default()
        }
    }
}

/// 멀티라인 결합 후 복합 정규식 파싱
#[derive(Debug, Clone)]
pub struct ParseMultilineRegex {
    pub complex: ParseRegexComplex,
    pub rules: MultilineRules,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseMultilineConfig {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    rules: Vec<MultilineRule>,
    #[serde(default)]
    start_state: Option<String>,
    #[serde(default)]
    parsers: Vec<ParserConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParserConfig {
    regex: String,
    #[serde(default)]
    time_key: Option<String>,
    #[serde(default)]
    time_format: Option<String>,
    #[serde(default)]
    types: BTreeMap<String, FieldType>,
}

impl ParseMultilineRegex {
    pub fn new(rules: Vec<MultilineRule>, parsers: Vec<RegexParser>) -> Result<Self, LoggingError> {
        Ok(Self {
            complex: ParseRegexComplex::new(parsers),
            rules: MultilineRules::compile(rules, MultilineFallback::default())?,
        })
    }

    /// `start_state` 축약형으로 만듭니다.
    pub fn with_start_pattern(pattern: &str, parsers: Vec<RegexParser>) -> Result<Self, LoggingError> {
        Self::new(start_state_rules(pattern), parsers)
    }

    /// `rules`와 `start_state` 중 정확히 하나를 받습니다.
    pub fn from_value(body: serde_yaml::Value) -> Result<Self, LoggingError> {
        let cfg: ParseMultilineConfig = serde_yaml::from_value(body)?;
        let rules = match (cfg.rules.is_empty(), cfg.start_state) {
            (false, None) => cfg.rules,
            (true, Some(pattern)) => start_state_rules(&pattern),
            (true, None) => {
                return Err(LoggingError::field(
                    "rules",
                    "either rules or start_state is required",
                ));
            }
            (false, Some(_)) => {
                return Err(LoggingError::field(
                    "start_state",
                    "cannot be combined with rules",
                ));
            }
        };
        let parsers = cfg
            .parsers
            .into_iter()
            .map(|p| {
                RegexParser::new(
                    &p.regex,
                    ParserShared {
                        time_key: p.time_key,
                        time_format: p.time_format,
                        types: p.types,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut processor = Self::new(rules, parsers)?;
        processor.complex.field = cfg.field;
        Ok(processor)
    }

    /// 멀티라인 규칙과 나머지 파서를 분리합니다.
    ///
    /// 파일 수신기가 규칙을 INPUT에 직접 붙일 때 사용합니다.
    pub fn split(self) -> (MultilineRules, ParseRegexComplex) {
        (self.rules, self.complex)
    }
}

impl LoggingProcessor for ParseMultilineRegex {
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        let parser_name = format!("multiline.{tag}.{uid}");
        let key = self.complex.field.as_deref().unwrap_or(DEFAULT_KEY);
        let mut components = vec![
            Component::new(Kind::Filter)
                .with("Name", "multiline")
                .with("Match", tag)
                .with("Multiline.Key_Content", key)
                .with("Multiline.Parser", parser_name.clone()),
            self.rules
                .parser_component(&parser_name, ctx.flush_timeout_ms),
        ];
        components.extend(self.complex.components(ctx, tag, uid));
        components
    }

    fn inspect(&self) -> Inspect<'_> {
        Inspect {
            multiline: Some(&self.rules),
            ..self.complex.inspect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GenContext {
        GenContext::default()
    }

    #[test]
    fn time_format_accepts_millisecond_token() {
        let shared = ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L");
        assert!(shared.validate().is_ok());
    }

    #[test]
    fn time_format_rejects_unknown_directive() {
        let shared = ParserShared::new("time", "%Y-%Q");
        assert!(matches!(
            shared.validate(),
            Err(LoggingError::InvalidTimeFormat { .. })
        ));
    }

    #[test]
    fn time_key_requires_time_format() {
        let shared = ParserShared {
            time_key: Some("time".to_owned()),
            ..ParserShared::default()
        };
        assert!(shared.validate().is_err());
    }

    #[test]
    fn regex_parser_rejects_bad_pattern() {
        let err = RegexParser::plain("^(?<x>").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidRegex { .. }));
    }

    #[test]
    fn parser_component_sorts_types() {
        let shared = ParserShared::new("time", "%s")
            .with_type("pid", FieldType::Integer)
            .with_type("elapsed", FieldType::Float);
        let parser = RegexParser::new(r"^(?<pid>\d+)", shared).unwrap();
        let c = parser.component("t.u");
        assert_eq!(c.get("Name"), Some("t.u"));
        assert_eq!(c.get("Format"), Some("regex"));
        assert_eq!(c.get("Types"), Some("elapsed:float pid:integer"));
        assert_eq!(c.get("Time_Key"), Some("time"));
    }

    #[test]
    fn preview_coerces_types_and_parses_time() {
        let shared = ParserShared::new("time", "%Y-%m-%d %H:%M:%S %z")
            .with_type("code", FieldType::Integer)
            .with_type("ratio", FieldType::Float)
            .with_type("bad", FieldType::Integer);
        let parser = RegexParser::new(
            r"^(?<time>\S+ \S+ \S+) (?<code>\d+) (?<ratio>[\d.]+) (?<bad>\w+)$",
            shared,
        )
        .unwrap();

        let record = parser
            .preview("2024-03-01 10:00:00 +0900 200 0.5 abc")
            .unwrap();
        assert_eq!(record.fields["code"], Value::from(200));
        assert_eq!(record.fields["ratio"], Value::from(0.5));
        assert_eq!(record.fields["bad"], Value::from("abc"));
        assert!(!record.fields.contains_key("time"));
        let ts = record.timestamp.unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn preview_treats_naive_time_as_utc() {
        let parser = RegexParser::new(
            r"^(?<time>\S+ \S+)",
            ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L"),
        )
        .unwrap();
        let record = parser.preview("2021-10-07 09:00:00,123").unwrap();
        let ts = record.timestamp.unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn preview_accepts_any_fraction_width() {
        let parser = RegexParser::new(
            r"^(?<time>\S+)",
            ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%z"),
        )
        .unwrap();

        let millis = parser.preview("2020-08-06T14:25:02.936+0000").unwrap();
        assert_eq!(millis.timestamp.unwrap().timestamp_subsec_millis(), 936);

        let micros = parser.preview("2023-03-09T19:19:28.284512+0000").unwrap();
        assert_eq!(micros.timestamp.unwrap().timestamp_subsec_micros(), 284_512);

        let nanos = parser.preview("2023-03-09T19:19:28.284512001+0100").unwrap();
        let ts = nanos.timestamp.unwrap();
        assert_eq!(ts.timestamp_subsec_nanos(), 284_512_001);
        assert_eq!(ts.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn preview_reads_trailing_z_as_utc() {
        let parser = RegexParser::new(
            r"^(?<time>\S+)",
            ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%z"),
        )
        .unwrap();
        for line in ["2020-08-06T14:25:02.936146Z", "2020-08-06T14:25:02.936Z"] {
            let record = parser.preview(line).unwrap();
            let ts = record.timestamp.unwrap_or_else(|| panic!("{line} should parse"));
            assert_eq!(ts.offset().local_minus_utc(), 0);
            assert_eq!(ts.timestamp_subsec_millis(), 936);
            assert!(!record.fields.contains_key("time"));
        }
    }

    #[test]
    fn preview_keeps_unparseable_time_as_field() {
        let parser = RegexParser::new(
            r"^(?<time>\S+)",
            ParserShared::new("time", "%Y-%m-%d"),
        )
        .unwrap();
        let record = parser.preview("yesterday").unwrap();
        assert!(record.timestamp.is_none());
        assert_eq!(record.fields["time"], Value::from("yesterday"));
    }

    #[test]
    fn preview_maps_yes_no_booleans() {
        let parser = RegexParser::new(
            r"^(?<a>\w+) (?<b>\w+) (?<c>\w+)$",
            ParserShared::default()
                .with_type("a", FieldType::YesNoBoolean)
                .with_type("b", FieldType::YesNoBoolean)
                .with_type("c", FieldType::YesNoBoolean),
        )
        .unwrap();
        let record = parser.preview("Yes No Maybe").unwrap();
        assert_eq!(record.fields["a"], Value::Bool(true));
        assert_eq!(record.fields["b"], Value::Bool(false));
        assert_eq!(record.fields["c"], Value::from("Maybe"));
    }

    #[test]
    fn preview_returns_none_without_match() {
        let parser = RegexParser::plain(r"^\d+$").unwrap();
        assert!(parser.preview("abc").is_none());
    }

    #[test]
    fn parse_regex_emits_filter_and_parser() {
        let p = ParseRegex::new(r"^(?<message>.*)$", ParserShared::default()).unwrap();
        let c = p.components(&ctx(), "pipe.recv", "pipe_0");
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].kind, Kind::Filter);
        assert_eq!(c[0].get("Key_Name"), Some("message"));
        assert_eq!(c[0].get("Reserve_Data"), Some("True"));
        assert_eq!(c[0].get("Preserve_Key"), None);
        assert_eq!(
            c[0].ordered_config,
            vec![("Parser".to_owned(), "pipe.recv.pipe_0".to_owned())]
        );
        assert_eq!(c[1].get("Name"), Some("pipe.recv.pipe_0"));
    }

    #[test]
    fn parse_json_from_value() {
        let body: serde_yaml::Value =
            serde_yaml::from_str("field: payload\ntime_key: ts\ntime_format: \"%s\"").unwrap();
        let p = ParseJson::from_value(body).unwrap();
        let c = p.components(&ctx(), "t", "u");
        assert_eq!(c[0].get("Key_Name"), Some("payload"));
        assert_eq!(c[1].get("Format"), Some("json"));
        assert_eq!(c[1].get("Time_Key"), Some("ts"));
    }

    #[test]
    fn parse_regex_from_value_rejects_unknown_fields() {
        let body: serde_yaml::Value = serde_yaml::from_str("regex: a\nbogus: 1").unwrap();
        assert!(ParseRegex::from_value(body).is_err());
    }

    #[test]
    fn complex_parser_names_each_regex_by_index() {
        let p = ParseRegexComplex::new(vec![
            RegexParser::plain("^a").unwrap(),
            RegexParser::plain("^b").unwrap(),
        ]);
        let c = p.components(&ctx(), "t", "u");
        assert_eq!(c.len(), 3);
        assert_eq!(c[0].get("Preserve_Key"), Some("True"));
        let parsers: Vec<&str> = c[0].ordered_config.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(parsers, vec!["t.u.0", "t.u.1"]);
        assert_eq!(c[2].get("Regex"), Some("^b"));
    }

    #[test]
    fn multiline_processor_emits_filter_parser_and_rules() {
        let p = ParseMultilineRegex::with_start_pattern(
            r"^\d{4}",
            vec![RegexParser::plain(r"^(?<message>[\s\S]*)$").unwrap()],
        )
        .unwrap();
        let c = p.components(&ctx(), "t", "u");
        assert_eq!(c[0].get("Name"), Some("multiline"));
        assert_eq!(c[0].get("Multiline.Key_Content"), Some("message"));
        assert_eq!(c[0].get("Multiline.Parser"), Some("multiline.t.u"));
        assert_eq!(c[1].kind, Kind::MultilineParser);
        assert_eq!(c[1].get("flush_timeout"), Some("5000"));
        assert_eq!(c[1].ordered_config.len(), 2);
        assert_eq!(c.len(), 4);

        let inspect = p.inspect();
        assert!(inspect.multiline.is_some());
        assert_eq!(inspect.parsers.len(), 1);
    }

    #[test]
    fn multiline_from_value_requires_exactly_one_rule_source() {
        let neither: serde_yaml::Value = serde_yaml::from_str("field: message").unwrap();
        assert!(ParseMultilineRegex::from_value(neither).is_err());

        let both: serde_yaml::Value = serde_yaml::from_str(
            "start_state: '^a'\nrules:\n  - {state_name: start_state, regex: '^a', next_state: start_state}",
        )
        .unwrap();
        assert!(ParseMultilineRegex::from_value(both).is_err());

        let shorthand: serde_yaml::Value = serde_yaml::from_str("start_state: '^\\d+'").unwrap();
        let p = ParseMultilineRegex::from_value(shorthand).unwrap();
        assert_eq!(p.rules.rules().len(), 2);
    }

    #[test]
    fn split_separates_rules_from_parsers() {
        let p = ParseMultilineRegex::with_start_pattern("^a", vec![RegexParser::plain("^a").unwrap()])
            .unwrap();
        let (rules, complex) = p.split();
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(complex.parsers.len(), 1);
    }
}
