//! 설정 관리 -- opsconf.toml 파싱 및 생성기 설정
//!
//! [`OpsconfConfig`]는 설정 생성기 자체의 동작을 결정하는 최상위 구조체입니다.
//! 사용자가 작성하는 통합 설정(`config.yaml`)은 `opsconf-apps`가 다룹니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`OPSCONF_GENERATOR_PLATFORM=windows` 형식)
//! 3. 설정 파일 (`opsconf.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), opsconf_core::error::OpsconfError> {
//! use opsconf_core::config::OpsconfConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = OpsconfConfig::load("opsconf.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = OpsconfConfig::parse("[generator]\nplatform = \"windows\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, OpsconfError};
use crate::types::{MultilineFallback, Platform, SeverityPolicy};

/// fluent-bit 메인 설정 파일 기본 이름
pub const DEFAULT_FLUENT_BIT_MAIN: &str = "fluent_bit_main.conf";
/// fluent-bit 파서 설정 파일 기본 이름
pub const DEFAULT_FLUENT_BIT_PARSER: &str = "fluent_bit_parser.conf";
/// OTel collector 설정 파일 기본 이름
pub const DEFAULT_OTEL: &str = "otel.yaml";

/// opsconf 생성기 설정
///
/// `opsconf.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsconfConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 생성기 동작 설정
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// 출력 파일 이름
    #[serde(default)]
    pub output: OutputConfig,
}

impl OpsconfConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OpsconfError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하는 [`load`](Self::load)입니다.
    ///
    /// 파싱 실패 등 다른 에러는 그대로 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, OpsconfError> {
        let path = path.as_ref();
        match Self::from_file(path).await {
            Ok(mut config) => {
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            Err(OpsconfError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, OpsconfError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsconfError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                OpsconfError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, OpsconfError> {
        toml::from_str(toml_str).map_err(|e| {
            OpsconfError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `OPSCONF_{SECTION}_{FIELD}`
    /// 예: `OPSCONF_GENERATOR_SEVERITY_POLICY=exclusive`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "OPSCONF_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "OPSCONF_GENERAL_LOG_FORMAT");

        // Generator
        override_parse(&mut self.generator.platform, "OPSCONF_GENERATOR_PLATFORM");
        override_string(
            &mut self.generator.buffers_dir,
            "OPSCONF_GENERATOR_BUFFERS_DIR",
        );
        override_string(&mut self.generator.logs_dir, "OPSCONF_GENERATOR_LOGS_DIR");
        override_string(&mut self.generator.state_dir, "OPSCONF_GENERATOR_STATE_DIR");
        override_option_string(&mut self.generator.jar_path, "OPSCONF_GENERATOR_JAR_PATH");
        override_parse(
            &mut self.generator.severity_policy,
            "OPSCONF_GENERATOR_SEVERITY_POLICY",
        );
        override_parse(
            &mut self.generator.multiline_fallback,
            "OPSCONF_GENERATOR_MULTILINE_FALLBACK",
        );
        override_parse(
            &mut self.generator.flush_timeout_ms,
            "OPSCONF_GENERATOR_FLUSH_TIMEOUT_MS",
        );

        // Output
        override_string(
            &mut self.output.fluent_bit_main,
            "OPSCONF_OUTPUT_FLUENT_BIT_MAIN",
        );
        override_string(
            &mut self.output.fluent_bit_parser,
            "OPSCONF_OUTPUT_FLUENT_BIT_PARSER",
        );
        override_string(&mut self.output.otel, "OPSCONF_OUTPUT_OTEL");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), OpsconfError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 디렉토리는 다운스트림 설정에 그대로 기록되므로 비어 있으면 안 됨
        for (field, value) in [
            ("generator.buffers_dir", &self.generator.buffers_dir),
            ("generator.logs_dir", &self.generator.logs_dir),
            ("generator.state_dir", &self.generator.state_dir),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                }
                .into());
            }
        }

        if self.generator.flush_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generator.flush_timeout_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.generator.jar_path.as_deref() == Some("") {
            return Err(ConfigError::InvalidValue {
                field: "generator.jar_path".to_owned(),
                reason: "must not be empty when set".to_owned(),
            }
            .into());
        }

        // 출력 파일 이름은 서로 달라야 함
        let names = [
            ("output.fluent_bit_main", &self.output.fluent_bit_main),
            ("output.fluent_bit_parser", &self.output.fluent_bit_parser),
            ("output.otel", &self.output.otel),
        ];
        for (i, (field, value)) in names.iter().enumerate() {
            if value.is_empty() || value.contains('/') || value.contains('\\') {
                return Err(ConfigError::InvalidValue {
                    field: (*field).to_owned(),
                    reason: "must be a plain, non-empty file name".to_owned(),
                }
                .into());
            }
            if names[..i].iter().any(|(_, other)| other == value) {
                return Err(ConfigError::InvalidValue {
                    field: (*field).to_owned(),
                    reason: format!("duplicates another output file name: {value}"),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 생성기 동작 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 생성 대상 플랫폼 (linux, windows)
    pub platform: Platform,
    /// fluent-bit 버퍼/DB 디렉토리 (`@SET buffers_dir`)
    pub buffers_dir: String,
    /// 에이전트 로그 디렉토리 (`@SET logs_dir`)
    pub logs_dir: String,
    /// 에이전트 상태 디렉토리
    pub state_dir: String,
    /// JMX 메트릭 jar 경로 (지정하지 않으면 실행 파일 기준으로 탐색)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jar_path: Option<String>,
    /// 심각도 테이블 정책 (declared, exclusive, passthrough)
    pub severity_policy: SeverityPolicy,
    /// 멀티라인 규칙 불일치 정책 (continue, standalone)
    pub multiline_fallback: MultilineFallback,
    /// 멀티라인 파서 flush 타임아웃 (밀리초)
    pub flush_timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            buffers_dir: "/var/lib/opsconf/buffers".to_owned(),
            logs_dir: "/var/log/opsconf".to_owned(),
            state_dir: "/var/lib/opsconf".to_owned(),
            jar_path: None,
            severity_policy: SeverityPolicy::default(),
            multiline_fallback: MultilineFallback::default(),
            flush_timeout_ms: 5000,
        }
    }
}

/// 출력 파일 이름 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub fluent_bit_main: String,
    pub fluent_bit_parser: String,
    pub otel: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fluent_bit_main: DEFAULT_FLUENT_BIT_MAIN.to_owned(),
            fluent_bit_parser: DEFAULT_FLUENT_BIT_PARSER.to_owned(),
            otel: DEFAULT_OTEL.to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_option_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_parse<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
