#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod error;
pub mod fluentbit;
pub mod metrics;
pub mod otel;
pub mod registry;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, OpsconfError, RegistryError, RenderError};

// 설정
pub use config::OpsconfConfig;
pub use context::GenContext;

// 레지스트리
pub use registry::ComponentRegistry;

// 도메인 타입
pub use types::{
    FieldType, MultilineFallback, Platform, PlatformFilter, Secret, Severity, SeverityPolicy,
    parse_duration,
};
