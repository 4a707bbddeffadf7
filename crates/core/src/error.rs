//! 에러 타입 -- 도메인별 에러 정의

/// opsconf 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum OpsconfError {
    /// 설정 관련 에러 (생성기 설정, 사용자 설정, 컴포넌트 검증)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컴포넌트 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 출력 렌더링 에러
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 컴포넌트 검증 실패 (도메인 크레이트 에러가 변환되어 들어옴)
    #[error("{reason}")]
    Validation { reason: String },
}

/// 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 같은 타입 ID가 이미 등록됨
    #[error("{subagent} {kind} with type \"{type_id}\" is already registered")]
    AlreadyRegistered {
        subagent: String,
        kind: String,
        type_id: String,
    },

    /// 등록되지 않았거나 현재 플랫폼에서 지원하지 않는 타입
    #[error(
        "{subagent} {kind} with type \"{type_id}\" is not supported. Supported {subagent} {kind} types: [{}].",
        supported.join(", ")
    )]
    Unsupported {
        subagent: String,
        kind: String,
        type_id: String,
        supported: Vec<String>,
    },
}

/// 출력 렌더링 에러
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// YAML 직렬화 실패
    #[error("failed to serialize {what}: {reason}")]
    Serialize { what: String, reason: String },
}
