//! 로컬 평가 속성 테스트
//!
//! - 심각도 테이블: 선언된 값은 정확히 하나의 심각도로 매핑
//! - 멀티라인: 시작 패턴에 맞는 줄은 선언된 다음 상태로 전이
//! - 분류기/미리보기: 임의 입력에 패닉하지 않음

use opsconf_core::types::{MultilineFallback, Severity, SeverityPolicy};
use opsconf_logging::multiline::{START_STATE, assemble, start_state_rules};
use opsconf_logging::severity::Outcome;
use opsconf_logging::{LineClass, MultilineRule, MultilineRules, RegexParser, SeverityTable};
use proptest::prelude::*;

fn any_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

fn any_policy() -> impl Strategy<Value = SeverityPolicy> {
    prop::sample::select(vec![
        SeverityPolicy::Declared,
        SeverityPolicy::Exclusive,
        SeverityPolicy::Passthrough,
    ])
}

fn any_fallback() -> impl Strategy<Value = MultilineFallback> {
    prop::sample::select(vec![MultilineFallback::Continue, MultilineFallback::Standalone])
}

fn timestamped_rules(fallback: MultilineFallback) -> MultilineRules {
    MultilineRules::compile(start_state_rules(r"^\d{4}-\d{2}-\d{2} "), fallback).unwrap()
}

proptest! {
    #[test]
    fn declared_values_map_to_their_first_entry(
        entries in prop::collection::vec(("[A-Za-z]{1,8}", any_severity()), 1..12),
        exclusive in any::<bool>(),
        policy in any_policy(),
    ) {
        let borrowed: Vec<(&str, Severity)> =
            entries.iter().map(|(v, s)| (v.as_str(), *s)).collect();
        let table = SeverityTable::new("level", &borrowed, exclusive);

        for (value, _) in &entries {
            let first = entries.iter().find(|(v, _)| v == value).map(|(_, s)| *s).unwrap();
            prop_assert_eq!(table.normalize(value, policy), Outcome::Mapped(first));
        }
    }

    #[test]
    fn renormalizing_output_never_panics(
        entries in prop::collection::vec(("[A-Za-z]{1,8}", any_severity()), 0..12),
        policy in any_policy(),
    ) {
        let borrowed: Vec<(&str, Severity)> =
            entries.iter().map(|(v, s)| (v.as_str(), *s)).collect();
        let table = SeverityTable::new("level", &borrowed, true);
        for sev in Severity::ALL {
            let _ = table.normalize(sev.as_str(), policy);
        }
    }

    #[test]
    fn start_pattern_transitions_to_declared_next_state(
        date in "[0-9]{4}-[0-9]{2}-[0-9]{2}",
        rest in "[ -~]{0,40}",
        fallback in any_fallback(),
    ) {
        let rules = timestamped_rules(fallback);
        let line = format!("{date} {rest}");
        let t = rules.classify(rules.start(), &line);
        prop_assert_eq!(t.class, LineClass::Start);
        prop_assert_eq!(rules.state_name(t.next), Some("cont"));
    }

    #[test]
    fn classify_never_panics_on_arbitrary_input(
        lines in prop::collection::vec(".{0,200}", 0..30),
        fallback in any_fallback(),
    ) {
        let rules = MultilineRules::compile(
            vec![
                MultilineRule::new(START_STATE, r"^\[\w+\]", "cont"),
                MultilineRule::new("cont", r"^\s+", "cont"),
                MultilineRule::new("cont", r"^(?!\[\w+\])", "cont"),
            ],
            fallback,
        )
        .unwrap();
        let records = assemble(&rules, lines.iter().map(String::as_str));
        let total: usize = records.iter().map(Vec::len).sum();
        prop_assert_eq!(total, lines.len());
    }

    #[test]
    fn preview_never_panics(line in ".{0,300}") {
        let parser = RegexParser::plain(
            r"^(?<level>[A-Z]+)\s+\[(?<module>[^\]]+)\]\s+(?<message>[\s\S]*)$",
        )
        .unwrap();
        let _ = parser.preview(&line);
    }
}
