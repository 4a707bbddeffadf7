//! 로그 디스크립터 에러 타입
//!
//! [`LoggingError`]는 설정 생성 시점에 발견되는 로그 쪽 설정 오류를 표현합니다.
//! `From<LoggingError> for OpsconfError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use opsconf_core::error::{ConfigError, OpsconfError};

/// 로그 디스크립터 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoggingError {
    /// 정규식 컴파일 실패
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// 문제가 된 패턴
        pattern: String,
        /// 컴파일러 메시지
        reason: String,
    },

    /// 멀티라인 규칙이 정의되지 않은 상태로 전이
    #[error("multiline state {state:?}: no rules are defined for this state")]
    UndefinedState { state: String },

    /// `start_state` 규칙이 없음
    #[error("multiline rules: at least one rule must start from \"start_state\"")]
    MissingStartState,

    /// 시간 형식 문자열 오류
    #[error("invalid time_format {format:?}: {reason}")]
    InvalidTimeFormat { format: String, reason: String },

    /// 필드 경로 문법 오류
    #[error("invalid field path {path:?}: {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// 그 밖의 필드 값 오류
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl LoggingError {
    pub fn field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for LoggingError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::InvalidField {
            field: "body".to_owned(),
            reason: err.to_string(),
        }
    }
}

impl From<LoggingError> for OpsconfError {
    fn from(err: LoggingError) -> Self {
        OpsconfError::Config(ConfigError::Validation {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_regex_display_names_pattern() {
        let err = LoggingError::InvalidRegex {
            pattern: "^(".to_owned(),
            reason: "unclosed group".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"^(\""));
        assert!(msg.contains("unclosed group"));
    }

    #[test]
    fn undefined_state_display() {
        let err = LoggingError::UndefinedState {
            state: "cont".to_owned(),
        };
        assert!(err.to_string().contains("\"cont\""));
    }

    #[test]
    fn converts_to_config_validation_error() {
        let err: OpsconfError = LoggingError::MissingStartState.into();
        assert!(matches!(
            err,
            OpsconfError::Config(ConfigError::Validation { .. })
        ));
        assert!(err.to_string().contains("start_state"));
    }

    #[test]
    fn yaml_error_becomes_invalid_field() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{a: 1}").unwrap_err();
        let err: LoggingError = yaml_err.into();
        assert!(matches!(err, LoggingError::InvalidField { .. }));
    }
}
