//! 생성 컨텍스트 -- 디스크립터가 컴포넌트를 만들 때 참조하는 값
//!
//! [`GenContext`]는 생성기 설정에서 한 번 만들어져 모든 디스크립터에
//! 읽기 전용으로 전달됩니다.

use crate::config::GeneratorConfig;
use crate::types::{MultilineFallback, Platform, SeverityPolicy};

/// JMX 메트릭 jar 기본 파일 이름
pub const JMX_JAR_NAME: &str = "opentelemetry-java-contrib-jmx-metrics.jar";

/// 설정 생성 컨텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenContext {
    pub platform: Platform,
    pub severity_policy: SeverityPolicy,
    pub multiline_fallback: MultilineFallback,
    /// 멀티라인 파서 flush 타임아웃 (밀리초)
    pub flush_timeout_ms: u64,
    /// JMX 수신기가 사용할 jar 경로
    pub jmx_jar: String,
}

impl GenContext {
    /// 생성기 설정과 이미 찾아 둔 jar 경로로 컨텍스트를 만듭니다.
    pub fn new(settings: &GeneratorConfig, jmx_jar: impl Into<String>) -> Self {
        Self {
            platform: settings.platform,
            severity_policy: settings.severity_policy,
            multiline_fallback: settings.multiline_fallback,
            flush_timeout_ms: settings.flush_timeout_ms,
            jmx_jar: jmx_jar.into(),
        }
    }

    /// 플랫폼만 바꾼 컨텍스트를 반환합니다.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

impl Default for GenContext {
    fn default() -> Self {
        Self::new(&GeneratorConfig::default(), JMX_JAR_NAME)
    }
}
