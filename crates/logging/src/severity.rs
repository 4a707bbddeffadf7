//! 심각도 정규화 테이블
//!
//! 벤더 로그 레벨 토큰을 [`Severity`]로 바꾸는 정적 테이블입니다.
//! 조회는 대소문자를 구분하는 완전 일치이며, 선언 순서상 처음 일치한 항목이
//! 이깁니다.
//!
//! 테이블에 없는 값의 처리는 테이블의 `exclusive` 플래그와 생성기 설정의
//! [`SeverityPolicy`]가 함께 결정합니다.

use serde::Serialize;

use opsconf_core::types::{Severity, SeverityPolicy};

use crate::modify::ModifyField;

/// 심각도 매핑 테이블
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityTable {
    /// 원본 레벨이 들어 있는 `jsonPayload` 필드 이름
    pub source_field: String,
    pub entries: Vec<(String, Severity)>,
    /// 매핑되지 않은 값을 버리는지 여부 (선언값)
    pub exclusive: bool,
}

/// 로컬 정규화 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Mapped(Severity),
    /// exclusive 테이블에서 매핑되지 않아 심각도가 비워짐
    Dropped,
    /// 매핑되지 않은 원래 값이 그대로 남음
    PassedThrough(String),
}

impl SeverityTable {
    pub fn new(source_field: &str, entries: &[(&str, Severity)], exclusive: bool) -> Self {
        Self {
            source_field: source_field.to_owned(),
            entries: entries
                .iter()
                .map(|(value, severity)| ((*value).to_owned(), *severity))
                .collect(),
            exclusive,
        }
    }

    /// 처음 일치하는 항목의 심각도
    pub fn lookup(&self, value: &str) -> Option<Severity> {
        self.entries
            .iter()
            .find(|(source, _)| source == value)
            .map(|(_, severity)| *severity)
    }

    /// 정책을 반영한 실제 exclusive 여부
    pub fn effective_exclusive(&self, policy: SeverityPolicy) -> bool {
        match policy {
            SeverityPolicy::Declared => self.exclusive,
            SeverityPolicy::Exclusive => true,
            SeverityPolicy::Passthrough => false,
        }
    }

    /// `severity` 목적지에 대한 필드 수정 지시로 바꿉니다.
    ///
    /// 원본 필드는 복사되므로 `jsonPayload`에 그대로 남습니다.
    pub fn into_modify_field(self, policy: SeverityPolicy) -> ModifyField {
        let exclusive = self.effective_exclusive(policy);
        let mut field = ModifyField::copy_from(format!("jsonPayload.{}", self.source_field));
        // 같은 원본 값이 두 번 선언되면 먼저 선언된 쪽이 남도록 역순 삽입
        for (value, severity) in self.entries.into_iter().rev() {
            field.map_values.insert(value, severity.as_str().to_owned());
        }
        field.map_values_exclusive = exclusive;
        field
    }

    /// 값 하나를 로컬에서 정규화합니다.
    pub fn normalize(&self, value: &str, policy: SeverityPolicy) -> Outcome {
        match self.lookup(value) {
            Some(severity) => Outcome::Mapped(severity),
            None if self.effective_exclusive(policy) => Outcome::Dropped,
            None => Outcome::PassedThrough(value.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(exclusive: bool) -> SeverityTable {
        SeverityTable::new(
            "level",
            &[
                ("WARN", Severity::Warning),
                ("ERROR", Severity::Error),
                ("WARN", Severity::Critical),
            ],
            exclusive,
        )
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let t = table(true);
        assert_eq!(t.lookup("ERROR"), Some(Severity::Error));
        assert_eq!(t.lookup("error"), None);
        assert_eq!(t.lookup("ERROR "), None);
    }

    #[test]
    fn lookup_first_declared_wins() {
        assert_eq!(table(true).lookup("WARN"), Some(Severity::Warning));
    }

    #[test]
    fn effective_exclusive_follows_policy() {
        let t = table(false);
        assert!(!t.effective_exclusive(SeverityPolicy::Declared));
        assert!(t.effective_exclusive(SeverityPolicy::Exclusive));
        assert!(!table(true).effective_exclusive(SeverityPolicy::Passthrough));
        assert!(table(true).effective_exclusive(SeverityPolicy::Declared));
    }

    #[test]
    fn normalize_outcomes() {
        let t = table(true);
        assert_eq!(
            t.normalize("WARN", SeverityPolicy::Declared),
            Outcome::Mapped(Severity::Warning)
        );
        assert_eq!(t.normalize("TRACE", SeverityPolicy::Declared), Outcome::Dropped);
        assert_eq!(
            t.normalize("TRACE", SeverityPolicy::Passthrough),
            Outcome::PassedThrough("TRACE".to_owned())
        );
    }

    #[test]
    fn normalized_values_can_be_fed_back() {
        let t = table(false);
        for sev in Severity::ALL {
            let _ = t.normalize(sev.as_str(), SeverityPolicy::Declared);
        }
        assert_eq!(
            t.normalize("WARNING", SeverityPolicy::Declared),
            Outcome::PassedThrough("WARNING".to_owned())
        );
    }

    #[test]
    fn into_modify_field_copies_source_and_keeps_first_entry() {
        let field = table(true).into_modify_field(SeverityPolicy::Declared);
        assert_eq!(field.copy_from.as_deref(), Some("jsonPayload.level"));
        assert!(field.move_from.is_none());
        assert_eq!(field.map_values["WARN"], "WARNING");
        assert_eq!(field.map_values["ERROR"], "ERROR");
        assert!(field.map_values_exclusive);

        let passthrough = table(true).into_modify_field(SeverityPolicy::Passthrough);
        assert!(!passthrough.map_values_exclusive);
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_string(&Outcome::Mapped(Severity::Info)).unwrap();
        assert_eq!(json, r#"{"outcome":"mapped","value":"INFO"}"#);
        let json = serde_json::to_string(&Outcome::Dropped).unwrap();
        assert_eq!(json, r#"{"outcome":"dropped"}"#);
    }
}
