//! 메트릭 디스크립터 trait

use std::fmt;

use opsconf_core::context::GenContext;
use opsconf_core::otel::{Component, ReceiverPipeline};

use crate::error::MetricsError;

/// 메트릭 리시버 디스크립터
pub trait MetricsReceiver: fmt::Debug + Send + Sync {
    /// 리시버 하나와 그 고정 프로세서 목록을 만듭니다.
    ///
    /// 대부분 하나를 반환하며, 여러 개면 이름 뒤에 `_<i>`가 붙습니다.
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError>;
}

/// 사용자 파이프라인에 추가되는 메트릭 프로세서 디스크립터
pub trait MetricsProcessor: fmt::Debug + Send + Sync {
    fn processors(&self) -> Result<Vec<Component>, MetricsError>;
}
