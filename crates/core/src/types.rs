//! 도메인 타입 -- 심각도, 플랫폼, 필드 타입, 비밀값, 정책
//!
//! 모든 크레이트가 공유하는 작은 값 타입들입니다.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─── Severity ────────────────────────────────────────────────────────

/// 정규화된 로그 심각도
///
/// 다운스트림 로그 엔진이 `logging.googleapis.com/severity` 필드로 받는 값입니다.
/// 와이어 형식은 대문자 문자열입니다 (`"WARNING"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Default,
    Trace,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
    Fatal,
}

impl Severity {
    /// 모든 심각도 값 (선언 순서)
    pub const ALL: [Severity; 11] = [
        Self::Default,
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
        Self::Fatal,
    ];

    /// 와이어 형식 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    /// 대소문자를 구분합니다. 와이어 형식(대문자)만 허용합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "severity".to_owned(),
                reason: format!("unknown severity {s:?}"),
            })
    }
}

// ─── Platform ────────────────────────────────────────────────────────

/// 설정 생성 대상 플랫폼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
}

impl Platform {
    /// 현재 빌드 대상 플랫폼을 반환합니다.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            _ => Err(ConfigError::InvalidValue {
                field: "platform".to_owned(),
                reason: "must be one of: linux, windows".to_owned(),
            }),
        }
    }
}

/// 레지스트리 항목의 플랫폼 필터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFilter {
    /// 모든 플랫폼에서 사용 가능
    #[default]
    All,
    LinuxOnly,
    WindowsOnly,
}

impl PlatformFilter {
    /// 주어진 플랫폼에서 사용 가능한지 확인합니다.
    pub fn allows(&self, platform: Platform) -> bool {
        match self {
            Self::All => true,
            Self::LinuxOnly => platform == Platform::Linux,
            Self::WindowsOnly => platform == Platform::Windows,
        }
    }
}

impl fmt::Display for PlatformFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::LinuxOnly => write!(f, "linux"),
            Self::WindowsOnly => write!(f, "windows"),
        }
    }
}

// ─── FieldType ───────────────────────────────────────────────────────

/// 파서 타입 변환 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string")]
    String,
    /// `Yes`/`No` 문자열을 bool로 변환 (modify_fields 전용)
    YesNoBoolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::YesNoBoolean => "YesNoBoolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Secret ──────────────────────────────────────────────────────────

/// 비밀번호 등 민감한 값
///
/// `Debug`/`Display`에서는 가려지며, 생성된 설정에 기록할 때만
/// [`Secret::expose`]로 원문을 꺼냅니다.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 원문 값을 반환합니다.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ─── 정책 ────────────────────────────────────────────────────────────

/// 심각도 테이블에 없는 값의 처리 정책
///
/// - `Declared`: 테이블마다 선언된 `exclusive` 플래그를 따름
/// - `Exclusive`: 모든 테이블을 exclusive로 취급 (매핑 안 된 값은 버림)
/// - `Passthrough`: 매핑 안 된 값은 원래 값 그대로 남김
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityPolicy {
    #[default]
    Declared,
    Exclusive,
    Passthrough,
}

impl SeverityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::Exclusive => "exclusive",
            Self::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for SeverityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declared" => Ok(Self::Declared),
            "exclusive" => Ok(Self::Exclusive),
            "passthrough" => Ok(Self::Passthrough),
            _ => Err(ConfigError::InvalidValue {
                field: "generator.severity_policy".to_owned(),
                reason: "must be one of: declared, exclusive, passthrough".to_owned(),
            }),
        }
    }
}

/// 멀티라인 분류기에서 어떤 규칙에도 맞지 않는 줄의 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultilineFallback {
    /// 직전 레코드의 연속으로 취급, 상태 유지
    #[default]
    Continue,
    /// 독립 레코드로 취급, 시작 상태로 복귀
    Standalone,
}

impl MultilineFallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Standalone => "standalone",
        }
    }
}

impl fmt::Display for MultilineFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MultilineFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "standalone" => Ok(Self::Standalone),
            _ => Err(ConfigError::InvalidValue {
                field: "generator.multiline_fallback".to_owned(),
                reason: "must be one of: continue, standalone".to_owned(),
            }),
        }
    }
}

// ─── 기간 ────────────────────────────────────────────────────────────

/// `"60s"`, `"1m30s"`, `"1.5h"` 형식의 기간 문자열을 파싱합니다.
///
/// 단위: `ns`, `us`, `ms`, `s`, `m`, `h`. 단위 없는 값은 `"0"`만 허용하며
/// 음수는 허용하지 않습니다.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: "duration".to_owned(),
        reason: format!("invalid duration {s:?}: {reason}"),
    };

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid("empty string"));
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_len);
        if num.is_empty() {
            return Err(invalid("expected a number"));
        }
        let value: f64 = num.parse().map_err(|_| invalid("malformed number"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };
        total_nanos += value * scale;
        rest = next;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_roundtrips_through_wire_form() {
        for sev in Severity::ALL {
            let parsed: Severity = sev.as_str().parse().unwrap();
            assert_eq!(parsed, sev);
        }
    }

    #[test]
    fn severity_parse_is_case_sensitive() {
        assert!("warning".parse::<Severity>().is_err());
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Emergency).unwrap();
        assert_eq!(json, "\"EMERGENCY\"");
    }

    #[test]
    fn platform_filter_allows() {
        assert!(PlatformFilter::All.allows(Platform::Windows));
        assert!(PlatformFilter::LinuxOnly.allows(Platform::Linux));
        assert!(!PlatformFilter::LinuxOnly.allows(Platform::Windows));
        assert!(!PlatformFilter::WindowsOnly.allows(Platform::Linux));
    }

    #[test]
    fn platform_from_str_ignores_case() {
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("solaris".parse::<Platform>().is_err());
    }

    #[test]
    fn field_type_wire_names() {
        assert_eq!(FieldType::Integer.as_str(), "integer");
        assert_eq!(FieldType::YesNoBoolean.as_str(), "YesNoBoolean");
        let parsed: FieldType = serde_json::from_str("\"float\"").unwrap();
        assert_eq!(parsed, FieldType::Float);
    }

    #[test]
    fn secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "***");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn secret_deserializes_from_plain_string() {
        let secret: Secret = serde_yaml::from_str("pa55").unwrap();
        assert_eq!(secret.expose(), "pa55");
    }

    #[test]
    fn policies_parse_from_lowercase() {
        assert_eq!(
            "passthrough".parse::<SeverityPolicy>().unwrap(),
            SeverityPolicy::Passthrough
        );
        assert_eq!(
            "standalone".parse::<MultilineFallback>().unwrap(),
            MultilineFallback::Standalone
        );
        assert!("sometimes".parse::<SeverityPolicy>().is_err());
    }

    #[test]
    fn parse_duration_accepts_compound_values() {
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for bad in ["", "10", "s", "-5s", "10 s", "3d", "1.2.3s"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
