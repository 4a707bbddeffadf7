//! fluent-bit 설정 모델 -- 섹션 컴포넌트와 파일 생성
//!
//! 로그 파이프라인 디스크립터는 [`Component`] 목록을 만들고,
//! [`ModularConfig::generate`]가 이를 메인 설정 파일, 파서 설정 파일,
//! Lua 스크립트 파일로 렌더링합니다.
//!
//! # 섹션 형식
//! ```text
//! [FILTER]
//!     Match tag
//!     Name  lua
//!     call  process
//! ```
//! 정렬된 `config` 항목이 먼저 오고, 순서가 중요한 `ordered_config`
//! 항목(멀티라인 `rule`, 반복되는 `Parser`)이 뒤에 옵니다.

use std::collections::BTreeMap;
use std::fmt;


use crate::error::OpsconfError;

// ─── Kind ────────────────────────────────────────────────────────────

/// fluent-bit 설정 섹션 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Service,
    Input,
    Filter,
    Output,
    Parser,
    MultilineParser,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "SERVICE",
            Self::Input => "INPUT",
            Self::Filter => "FILTER",
            Self::Output => "OUTPUT",
            Self::Parser => "PARSER",
            Self::MultilineParser => "MULTILINE_PARSER",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Component ───────────────────────────────────────────────────────

/// Lua 스크립트 첨부 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// 내용의 md5 해시로 만든 파일 이름 (`<hash>.lua`)
    pub file_name: String,
    pub contents: String,
}

/// fluent-bit 설정 섹션 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub kind: Kind,
    /// 키가 한 번만 나오는 항목 (렌더링 시 정렬)
    pub config: BTreeMap<String, String>,
    /// 같은 키가 반복되거나 순서가 중요한 항목 (선언 순서 유지)
    pub ordered_config: Vec<(String, String)>,
    /// `script` 키가 가리키는 Lua 파일
    pub script: Option<Script>,
}

impl Component {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            config: BTreeMap::new(),
            ordered_config: Vec::new(),
            script: None,
        }
    }

    /// `config` 항목을 추가합니다 (builder).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// `ordered_config` 항목을 추가합니다 (builder).
    pub fn with_ordered(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ordered_config.push((key.into(), value.into()));
        self
    }

    /// `config` 항목을 설정합니다.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    /// `config`에서 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// 섹션 텍스트를 렌더링합니다.
    pub fn render_section(&self) -> String {
        let width = self
            .config
            .keys()
            .map(String::len)
            .chain(self.ordered_config.iter().map(|(k, _)| k.len()))
            .max()
            .unwrap_or(0);

        let mut out = format!("[{}]\n", self.kind);
        for (k, v) in &self.config {
            out.push_str(&format!("    {k:<width$} {v}\n"));
        }
        for (k, v) in &self.ordered_config {
            out.push_str(&format!("    {k:<width$} {v}\n"));
        }
        out
    }
}

// ─── ModularConfig ───────────────────────────────────────────────────

/// fluent-bit 전체 설정
#[derive(Debug, Clone, Default)]
pub struct ModularConfig {
    /// `@SET key=value` 변수
    pub variables: BTreeMap<String, String>,
    pub components: Vec<Component>,
}

impl ModularConfig {
    /// 파일 이름 → 내용 맵을 생성합니다.
    ///
    /// - `main_file`: `@SET` 변수, SERVICE, INPUT, FILTER, OUTPUT 섹션
    /// - `parser_file`: PARSER, MULTILINE_PARSER 섹션
    /// - `<md5>.lua`: 서로 다른 Lua 스크립트마다 하나
    ///
    /// 같은 종류 안에서는 컴포넌트의 상대 순서가 유지됩니다.
    pub fn generate(
        &self,
        main_file: &str,
        parser_file: &str,
    ) -> Result<BTreeMap<String, String>, OpsconfError> {
        let mut files = BTreeMap::new();

        let mut main_parts: Vec<String> = self
            .variables
            .iter()
            .map(|(k, v)| format!("@SET {k}={v}"))
            .collect();
        main_parts.push(String::new());

        for kind in [Kind::Service, Kind::Input, Kind::Filter, Kind::Output] {
            main_parts.extend(self.sections_of(kind));
        }

        let mut parser_parts = self.sections_of(Kind::Parser);
        parser_parts.extend(self.sections_of(Kind::MultilineParser));

        for script in self.components.iter().filter_map(|c| c.script.as_ref()) {
            files.insert(script.file_name.clone(), script.contents.clone());
        }

        files.insert(main_file.to_owned(), main_parts.join("\n"));
        files.insert(parser_file.to_owned(), parser_parts.join("\n"));
        Ok(files)
    }

    fn sections_of(&self, kind: Kind) -> Vec<String> {
        self.components
            .iter()
            .filter(|c| c.kind == kind)
            .map(Component::render_section)
            .collect()
    }
}

// ─── 헬퍼 ────────────────────────────────────────────────────────────

/// 태그별 tail DB 경로: `${buffers_dir}/<tag의 '.'와 '/'를 '_'로 치환>`
pub fn db_path(tag: &str) -> String {
    format!("${{buffers_dir}}/{}", tag.replace(['.', '/'], "_"))
}

/// Lua 스크립트를 실행하는 FILTER를 만듭니다.
///
/// 스크립트 파일 이름은 내용의 md5 해시이므로 같은 스크립트는 한 파일로 합쳐집니다.
pub fn lua_filter(tag: &str, function: &str, src: &str) -> Component {
    let file_name = format!("{:x}.lua", md5::compute(src.as_bytes()));
    let mut c = Component::new(Kind::Filter)
        .with("Name", "lua")
        .with("Match", tag)
        .with("script", file_name.clone())
        .with("call", function);
    c.script = Some(Script {
        file_name,
        contents: src.to_owned(),
    });
    c
}

/// `src` 필드 값에 따라 `dest` 필드를 추가하는 modify FILTER 목록
pub fn translation_filters(tag: &str, src: &str, dest: &str, table: &[(&str, &str)]) -> Vec<Component> {
    table
        .iter()
        .map(|(from, to)| {
            ModifyOptions::new(ModifyRule::Add, format!("{dest} {to}"))
                .when(Condition::KeyValueEquals(src.to_owned(), (*from).to_owned()))
                .component(tag)
        })
        .collect()
}

// ─── modify 필터 ─────────────────────────────────────────────────────

/// modify 필터 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyRule {
    Add,
    Set,
    Remove,
    Rename,
    HardRename,
    Copy,
}

impl ModifyRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Set => "Set",
            Self::Remove => "Remove",
            Self::Rename => "Rename",
            Self::HardRename => "Hard_rename",
            Self::Copy => "Copy",
        }
    }
}

/// modify 필터 조건
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    KeyExists(String),
    KeyDoesNotExist(String),
    KeyValueEquals(String, String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyExists(k) => write!(f, "Key_exists {k}"),
            Self::KeyDoesNotExist(k) => write!(f, "Key_does_not_exist {k}"),
            Self::KeyValueEquals(k, v) => write!(f, "Key_value_equals {k} {v}"),
        }
    }
}

/// modify 필터 하나 (규칙 하나 + 선택 조건)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyOptions {
    pub rule: ModifyRule,
    pub parameters: String,
    pub condition: Option<Condition>,
}

impl ModifyOptions {
    pub fn new(rule: ModifyRule, parameters: impl Into<String>) -> Self {
        Self {
            rule,
            parameters: parameters.into(),
            condition: None,
        }
    }

    pub fn rename(field: &str, to: &str) -> Self {
        Self::new(ModifyRule::Rename, format!("{field} {to}"))
    }

    pub fn hard_rename(field: &str, to: &str) -> Self {
        Self::new(ModifyRule::HardRename, format!("{field} {to}"))
    }

    pub fn set(field: &str, value: &str) -> Self {
        Self::new(ModifyRule::Set, format!("{field} {value}"))
    }

    pub fn remove(field: &str) -> Self {
        Self::new(ModifyRule::Remove, field)
    }

    /// 조건을 붙입니다 (builder).
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn component(&self, tag: &str) -> Component {
        let mut c = Component::new(Kind::Filter)
            .with("Name", "modify")
            .with("Match", tag)
            .with(self.rule.as_str(), self.parameters.clone());
        if let Some(cond) = &self.condition {
            c.set("Condition", cond.to_string());
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_pads_keys_to_longest() {
        let c = Component::new(Kind::Input)
            .with("Name", "tail")
            .with("Read_from_Head", "True");
        assert_eq!(
            c.render_section(),
            "[INPUT]\n    Name           tail\n    Read_from_Head True\n"
        );
    }

    #[test]
    fn ordered_entries_follow_sorted_entries() {
        let c = Component::new(Kind::MultilineParser)
            .with("type", "regex")
            .with("name", "ml")
            .with_ordered("rule", "\"start_state\" \"^a\" \"cont\"")
            .with_ordered("rule", "\"cont\" \"^b\" \"cont\"");
        let text = c.render_section();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[MULTILINE_PARSER]");
        assert!(lines[1].trim_start().starts_with("name"));
        assert!(lines[2].trim_start().starts_with("type"));
        assert!(lines[3].contains("start_state"));
        assert!(lines[4].contains("\"cont\" \"^b\""));
    }

    #[test]
    fn db_path_sanitizes_tag() {
        assert_eq!(db_path("pipe.mysql/error"), "${buffers_dir}/pipe_mysql_error");
    }

    #[test]
    fn lua_filter_names_script_by_md5() {
        let c = lua_filter("t", "process", "");
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(c.get("script"), Some("d41d8cd98f00b204e9800998ecf8427e.lua"));
        assert_eq!(c.get("call"), Some("process"));
        assert!(c.script.is_some());
    }

    #[test]
    fn generate_splits_main_and_parser_files() {
        let mut cfg = ModularConfig::default();
        cfg.variables
            .insert("buffers_dir".to_owned(), "/var/buf".to_owned());
        cfg.components.push(Component::new(Kind::Parser).with("Name", "p"));
        cfg.components.push(Component::new(Kind::Output).with("Name", "stackdriver"));
        cfg.components.push(Component::new(Kind::Input).with("Name", "tail"));
        cfg.components.push(lua_filter("t", "f", "return 1"));
        cfg.components
            .push(Component::new(Kind::Service).with("Flush", "1"));

        let files = cfg.generate("main.conf", "parser.conf").unwrap();
        assert_eq!(files.len(), 3);

        let main = &files["main.conf"];
        assert!(main.starts_with("@SET buffers_dir=/var/buf\n"));
        let service = main.find("[SERVICE]").unwrap();
        let input = main.find("[INPUT]").unwrap();
        let filter = main.find("[FILTER]").unwrap();
        let output = main.find("[OUTPUT]").unwrap();
        assert!(service < input && input < filter && filter < output);

        let parser = &files["parser.conf"];
        assert!(parser.contains("[PARSER]"));
        assert!(!parser.contains("[INPUT]"));
    }

    #[test]
    fn identical_scripts_share_one_file() {
        let mut cfg = ModularConfig::default();
        cfg.components.push(lua_filter("a", "f", "x = 1"));
        cfg.components.push(lua_filter("b", "f", "x = 1"));
        let files = cfg.generate("m", "p").unwrap();
        assert_eq!(files.keys().filter(|k| k.ends_with(".lua")).count(), 1);
    }

    #[test]
    fn modify_with_condition() {
        let c = ModifyOptions::remove("host")
            .when(Condition::KeyValueEquals("host".to_owned(), "-".to_owned()))
            .component("tag");
        assert_eq!(c.get("Remove"), Some("host"));
        assert_eq!(c.get("Condition"), Some("Key_value_equals host -"));
        assert_eq!(c.get("Name"), Some("modify"));
    }

    #[test]
    fn translation_filters_one_per_entry() {
        let filters = translation_filters(
            "tag",
            "EventType",
            "logging.googleapis.com/severity",
            &[("Error", "ERROR"), ("Warning", "WARNING")],
        );
        assert_eq!(filters.len(), 2);
        assert_eq!(
            filters[1].get("Add"),
            Some("logging.googleapis.com/severity WARNING")
        );
        assert_eq!(
            filters[1].get("Condition"),
            Some("Key_value_equals EventType Warning")
        );
    }
}
