//! 멀티라인 분류 상태 기계
//!
//! 규칙 집합은 `(상태, 정규식, 다음 상태)` 목록입니다. 물리적인 한 줄이 새
//! 레코드의 시작인지, 직전 레코드의 연속인지를 상태 전이로 결정합니다.
//!
//! # 분류 규칙
//! 1. 현재 상태의 규칙을 선언 순서대로 시도합니다. 처음 매칭된 규칙으로
//!    전이하며, 현재 상태가 `start_state`면 [`LineClass::Start`],
//!    아니면 [`LineClass::Continuation`]입니다.
//! 2. 시작 상태가 아닌데 매칭이 없으면 열린 레코드를 닫고 시작 상태에서
//!    다시 시도합니다. 매칭되면 `Start`입니다.
//! 3. 그래도 매칭이 없으면 [`MultilineFallback`] 정책을 따릅니다.
//!
//! 다운스트림 엔진이 실제 버퍼링을 담당하며, 여기의 [`classify`](MultilineRules::classify)와
//! [`Assembler`]는 미리보기와 테스트용 로컬 평가입니다.

use std::collections::HashMap;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use opsconf_core::fluentbit::{Component, Kind};
use opsconf_core::metrics::REGEX_COMPILED_TOTAL;
use opsconf_core::types::MultilineFallback;

use crate::error::LoggingError;

/// 모든 규칙 집합의 시작 상태 이름
pub const START_STATE: &str = "start_state";

/// 상태 인덱스 (`0`은 항상 `start_state`)
pub type StateId = usize;

// ─── 규칙 ────────────────────────────────────────────────────────────

/// 멀티라인 규칙 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultilineRule {
    pub state_name: String,
    pub regex: String,
    pub next_state: String,
}

impl MultilineRule {
    pub fn new(
        state_name: impl Into<String>,
        regex: impl Into<String>,
        next_state: impl Into<String>,
    ) -> Self {
        Self {
            state_name: state_name.into(),
            regex: regex.into(),
            next_state: next_state.into(),
        }
    }

    /// fluent-bit `rule` 항목 값: `"state"    "/regex/"    "next"`
    pub fn rule_line(&self) -> String {
        format!(
            "\"{}\"    \"/{}/\"    \"{}\"",
            escape_quotes(&self.state_name),
            escape_quotes(&self.regex),
            escape_quotes(&self.next_state)
        )
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// `start_state` 축약형을 규칙 두 개로 펼칩니다.
///
/// `P` → `start_state -> cont on P`, `cont -> cont on ^(?!P)`
pub fn start_state_rules(pattern: &str) -> Vec<MultilineRule> {
    vec![
        MultilineRule::new(START_STATE, pattern, "cont"),
        MultilineRule::new("cont", format!("^(?!{pattern})"), "cont"),
    ]
}

// ─── 분류 결과 ───────────────────────────────────────────────────────

/// 한 줄의 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    /// 새 레코드의 첫 줄
    Start,
    /// 직전 레코드에 이어지는 줄
    Continuation,
}

/// 상태 전이 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: StateId,
    pub class: LineClass,
}

// ─── 컴파일된 규칙 집합 ──────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CompiledRule {
    state: StateId,
    next: StateId,
    regex: Regex,
}

/// 검증과 컴파일을 마친 멀티라인 규칙 집합
#[derive(Debug, Clone)]
pub struct MultilineRules {
    rules: Vec<MultilineRule>,
    compiled: Vec<CompiledRule>,
    states: Vec<String>,
    fallback: MultilineFallback,
}

impl MultilineRules {
    /// 규칙을 검증하고 컴파일합니다.
    ///
    /// - `start_state`에서 출발하는 규칙이 하나 이상 있어야 합니다.
    /// - 모든 `next_state`는 규칙이 정의된 상태이거나 `start_state`여야 합니다.
    /// - 모든 정규식이 컴파일되어야 합니다.
    pub fn compile(
        rules: Vec<MultilineRule>,
        fallback: MultilineFallback,
    ) -> Result<Self, LoggingError> {
        if !rules.iter().any(|r| r.state_name == START_STATE) {
            return Err(LoggingError::MissingStartState);
        }

        let mut states = vec![START_STATE.to_owned()];
        let mut index: HashMap<String, StateId> = HashMap::new();
        index.insert(START_STATE.to_owned(), 0);
        for rule in &rules {
            if !index.contains_key(&rule.state_name) {
                index.insert(rule.state_name.clone(), states.len());
                states.push(rule.state_name.clone());
            }
        }

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in &rules {
            let next = *index
                .get(&rule.next_state)
                .ok_or_else(|| LoggingError::UndefinedState {
                    state: rule.next_state.clone(),
                })?;
            let regex = Regex::new(&rule.regex).map_err(|e| LoggingError::InvalidRegex {
                pattern: rule.regex.clone(),
                reason: e.to_string(),
            })?;
            metrics::counter!(REGEX_COMPILED_TOTAL).increment(1);
            compiled.push(CompiledRule {
                state: index[&rule.state_name],
                next,
                regex,
            });
        }

        Ok(Self {
            rules,
            compiled,
            states,
            fallback,
        })
    }

    /// 폴백 정책만 바꾼 사본을 반환합니다.
    pub fn with_fallback(mut self, fallback: MultilineFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn start(&self) -> StateId {
        0
    }

    pub fn fallback(&self) -> MultilineFallback {
        self.fallback
    }

    /// 선언된 규칙 (선언 순서)
    pub fn rules(&self) -> &[MultilineRule] {
        &self.rules
    }

    pub fn state_name(&self, id: StateId) -> Option<&str> {
        self.states.get(id).map(String::as_str)
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states.iter().position(|s| s == name)
    }

    /// fluent-bit `rule` 항목 값 목록
    pub fn rule_lines(&self) -> Vec<String> {
        self.rules.iter().map(MultilineRule::rule_line).collect()
    }

    /// 현재 상태에서 다음 줄을 분류합니다.
    pub fn classify(&self, state: StateId, line: &str) -> Transition {
        if let Some(next) = self.first_match(state, line) {
            let class = if state == self.start() {
                LineClass::Start
            } else {
                LineClass::Continuation
            };
            return Transition { next, class };
        }

        if state != self.start() {
            if let Some(next) = self.first_match(self.start(), line) {
                return Transition {
                    next,
                    class: LineClass::Start,
                };
            }
        }

        match self.fallback {
            MultilineFallback::Continue => Transition {
                next: state,
                class: LineClass::Continuation,
            },
            MultilineFallback::Standalone => Transition {
                next: self.start(),
                class: LineClass::Start,
            },
        }
    }

    fn first_match(&self, state: StateId, line: &str) -> Option<StateId> {
        for rule in self.compiled.iter().filter(|r| r.state == state) {
            match rule.regex.is_match(line) {
                Ok(true) => return Some(rule.next),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        state = self.states[state].as_str(),
                        pattern = rule.regex.as_str(),
                        error = %e,
                        "multiline regex evaluation failed, treating as no match"
                    );
                }
            }
        }
        None
    }

    /// MULTILINE_PARSER 섹션을 만듭니다.
    pub fn parser_component(&self, name: &str, flush_timeout_ms: u64) -> Component {
        let mut c = Component::new(Kind::MultilineParser)
            .with("name", name)
            .with("type", "regex")
            .with("flush_timeout", flush_timeout_ms.to_string());
        for line in self.rule_lines() {
            c = c.with_ordered("rule", line);
        }
        c
    }
}

// ─── Assembler ───────────────────────────────────────────────────────

/// 줄 스트림을 레코드로 묶는 로컬 조립기
///
/// 각 레코드는 원래 줄들의 목록입니다.
#[derive(Debug)]
pub struct Assembler<'a> {
    rules: &'a MultilineRules,
    state: StateId,
    current: Vec<String>,
}

impl<'a> Assembler<'a> {
    pub fn new(rules: &'a MultilineRules) -> Self {
        Self {
            rules,
            state: rules.start(),
            current: Vec::new(),
        }
    }

    /// 한 줄을 넣고, 이 줄 때문에 닫힌 레코드가 있으면 반환합니다.
    pub fn push(&mut self, line: &str) -> Option<Vec<String>> {
        let transition = self.rules.classify(self.state, line);
        self.state = transition.next;

        match transition.class {
            LineClass::Start if !self.current.is_empty() => {
                let done = std::mem::replace(&mut self.current, vec![line.to_owned()]);
                Some(done)
            }
            _ => {
                self.current.push(line.to_owned());
                None
            }
        }
    }

    /// 현재 상태 이름
    pub fn state(&self) -> &str {
        self.rules.state_name(self.state).unwrap_or(START_STATE)
    }

    /// 열린 레코드를 닫아 반환합니다.
    pub fn finish(self) -> Option<Vec<String>> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }
}

/// 전체 줄 목록을 레코드로 묶습니다.
pub fn assemble<'l>(
    rules: &MultilineRules,
    lines: impl IntoIterator<Item = &'l str>,
) -> Vec<Vec<String>> {
    let mut assembler = Assembler::new(rules);
    let mut records = Vec::new();
    for line in lines {
        if let Some(record) = assembler.push(line) {
            records.push(record);
        }
    }
    records.extend(assembler.finish());
    records
}
