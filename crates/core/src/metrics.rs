//! 메트릭 상수 및 설명 등록
//!
//! 설정 생성 과정에서 올리는 카운터의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//!
//! opsconf는 익스포터를 설치하지 않습니다. 호스트 프로그램이 레코더를
//! 설치하지 않으면 카운터는 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `opsconf_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(opsconf_core::metrics::REGEX_COMPILED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 출력 엔진 레이블 키 (fluent_bit, otel)
pub const LABEL_ENGINE: &str = "engine";

/// 리소스 레이블 키 (jmx_jar)
pub const LABEL_RESOURCE: &str = "resource";

// ─── 레이블 값 상수 ────────────────────────────────────────────────

pub const ENGINE_FLUENT_BIT: &str = "fluent_bit";
pub const ENGINE_OTEL: &str = "otel";
pub const RESOURCE_JMX_JAR: &str = "jmx_jar";

// ─── 카운터 ─────────────────────────────────────────────────────────

/// 생성된 다운스트림 컴포넌트 수 (counter, label: engine)
pub const COMPONENTS_GENERATED_TOTAL: &str = "opsconf_components_generated_total";

/// 컴파일된 정규식 수 (counter)
pub const REGEX_COMPILED_TOTAL: &str = "opsconf_regex_compiled_total";

/// 기본값으로 대체된 보조 리소스 수 (counter, label: resource)
pub const DEGRADED_RESOURCES_TOTAL: &str = "opsconf_degraded_resources_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        COMPONENTS_GENERATED_TOTAL,
        "Total number of downstream config components generated per engine"
    );
    describe_counter!(
        REGEX_COMPILED_TOTAL,
        "Total number of regular expressions compiled during validation"
    );
    describe_counter!(
        DEGRADED_RESOURCES_TOTAL,
        "Total number of optional resources replaced by a default value"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        COMPONENTS_GENERATED_TOTAL,
        REGEX_COMPILED_TOTAL,
        DEGRADED_RESOURCES_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_opsconf_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("opsconf_"),
                "Metric '{}' does not start with 'opsconf_' prefix",
                name
            );
            assert!(name.ends_with("_total"), "Counter '{}' should end with _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_ENGINE, LABEL_RESOURCE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
