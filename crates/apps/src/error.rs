//! 카탈로그/통합 설정 에러 타입
//!
//! [`AppsError`]는 사용자 설정을 해석하고 검증하는 단계의 오류입니다.
//! 레지스트리와 도메인 크레이트 에러는 이미 [`OpsconfError`]로 변환되므로
//! 여기에는 설정 구조 자체의 오류만 둡니다.

use opsconf_core::error::{ConfigError, OpsconfError};

/// 통합 설정 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppsError {
    /// 컴포넌트 본문에 `type`이 없거나 문자열이 아님
    #[error("{subagent} {kind} \"{id}\": {reason}")]
    UnknownComponent {
        subagent: String,
        kind: String,
        id: String,
        reason: String,
    },

    /// 레지스트리에서 만들 수 없는 컴포넌트 (지원하지 않는 타입, 잘못된 필드)
    #[error("{subagent} {kind} \"{id}\" is invalid: {reason}")]
    InvalidComponent {
        subagent: String,
        kind: String,
        id: String,
        reason: String,
    },

    /// 파이프라인이 정의되지 않은 컴포넌트를 참조
    #[error("{subagent} {kind} \"{id}\" from pipeline \"{pipeline}\" is not defined.")]
    UndefinedReference {
        subagent: String,
        kind: String,
        id: String,
        pipeline: String,
    },

    /// 그 밖의 설정 검증 실패
    #[error("{0}")]
    Validation(String),

    /// YAML 문법/구조 오류
    #[error("failed to parse config: {0}")]
    Yaml(String),
}

impl From<serde_yaml::Error> for AppsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

impl From<AppsError> for OpsconfError {
    fn from(err: AppsError) -> Self {
        match err {
            AppsError::Yaml(reason) => OpsconfError::Config(ConfigError::ParseFailed { reason }),
            other => OpsconfError::Config(ConfigError::Validation {
                reason: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_reference_display_matches_agent_wording() {
        let err = AppsError::UndefinedReference {
            subagent: "logging".to_owned(),
            kind: "receiver".to_owned(),
            id: "x".to_owned(),
            pipeline: "p".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            r#"logging receiver "x" from pipeline "p" is not defined."#
        );
    }

    #[test]
    fn yaml_error_becomes_parse_failed() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{a: 1}").unwrap_err();
        let err: OpsconfError = AppsError::from(yaml_err).into();
        assert!(matches!(err, OpsconfError::Config(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn validation_becomes_config_validation() {
        let err: OpsconfError = AppsError::Validation("bad".to_owned()).into();
        assert!(matches!(
            err,
            OpsconfError::Config(ConfigError::Validation { .. })
        ));
        assert_eq!(err.to_string(), "config error: bad");
    }
}
