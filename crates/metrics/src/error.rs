//! 메트릭 디스크립터 에러 타입
//!
//! `From<MetricsError> for OpsconfError` 변환으로 상위 레이어에서 `?`로
//! 전파합니다.

use opsconf_core::error::{ConfigError, OpsconfError};

/// 메트릭 디스크립터 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    /// 메트릭 이름 패턴이 RE2 문법으로 컴파일되지 않음
    #[error("invalid metric pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// 리시버/프로세서 파라미터 오류
    #[error("invalid parameter \"{parameter}\": {reason}")]
    InvalidParameter { parameter: String, reason: String },
}

impl MetricsError {
    pub fn parameter(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for MetricsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::parameter("body", err.to_string())
    }
}

impl From<MetricsError> for OpsconfError {
    fn from(err: MetricsError) -> Self {
        OpsconfError::Config(ConfigError::Validation {
            reason: err.to_string(),
        })
    }
}
