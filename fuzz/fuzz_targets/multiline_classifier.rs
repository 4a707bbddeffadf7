#![no_main]

use libfuzzer_sys::fuzz_target;

use opsconf_core::types::MultilineFallback;
use opsconf_logging::MultilineRules;
use opsconf_logging::multiline::{START_STATE, assemble};
use opsconf_logging::MultilineRule;

// Java 스택 트레이스 규칙: 시작, 예외 줄, at 줄
fn rules() -> MultilineRules {
    let rules = vec![
        MultilineRule::new(START_STATE, r"^[A-Z]+\s+\[[^\]]+\] \d+", "exception"),
        MultilineRule::new("exception", r"^[\w.]+(Exception|Error)(:.*)?$", "trace"),
        MultilineRule::new("trace", r"^\s+at ", "trace"),
        MultilineRule::new("trace", r"^(?!\s+at )", "trace"),
    ];
    match MultilineRules::compile(rules, MultilineFallback::Continue) {
        Ok(rules) => rules,
        Err(e) => panic!("fixed rules must compile: {e}"),
    }
}

fuzz_target!(|data: &[u8]| {
    // 분류기는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(text) = std::str::from_utf8(data) {
        let rules = rules();
        let records = assemble(&rules, text.lines());
        // 모든 줄이 정확히 한 레코드에 들어가야 함
        let total: usize = records.iter().map(Vec::len).sum();
        assert_eq!(total, text.lines().count());

        let standalone = rules.with_fallback(MultilineFallback::Standalone);
        let mut state = standalone.start();
        for line in text.lines() {
            state = standalone.classify(state, line).next;
            assert!(standalone.state_name(state).is_some());
        }
    }
});
