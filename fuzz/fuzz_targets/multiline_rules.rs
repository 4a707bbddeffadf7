#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use opsconf_core::types::MultilineFallback;
use opsconf_logging::multiline::assemble;
use opsconf_logging::{MultilineRule, MultilineRules};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 8개로 제한)
    rules: Vec<FuzzRule>,
    lines: Vec<String>,
    standalone: bool,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    state: FuzzState,
    regex: String,
    next: FuzzState,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzState {
    Start,
    Cont,
    Other,
}

impl FuzzState {
    fn as_str(&self) -> &'static str {
        match self {
            FuzzState::Start => "start_state",
            FuzzState::Cont => "cont",
            FuzzState::Other => "other",
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let rules: Vec<MultilineRule> = input
        .rules
        .iter()
        .take(8)
        .map(|r| MultilineRule::new(r.state.as_str(), r.regex.clone(), r.next.as_str()))
        .collect();
    let fallback = if input.standalone {
        MultilineFallback::Standalone
    } else {
        MultilineFallback::Continue
    };

    // 잘못된 규칙은 에러로 거부되어야 하며 패닉하면 안 됨
    let Ok(compiled) = MultilineRules::compile(rules, fallback) else {
        return;
    };
    let lines: Vec<&str> = input.lines.iter().take(64).map(String::as_str).collect();
    let records = assemble(&compiled, lines.iter().copied());
    let total: usize = records.iter().map(Vec::len).sum();
    assert_eq!(total, lines.len());
});
