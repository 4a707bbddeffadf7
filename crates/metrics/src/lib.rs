#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`component`]: 리시버/프로세서 trait
//! - [`transform`]: 변환 지시와 이름 투영
//! - [`processors`]: collector 프로세서 생성 함수
//! - [`shared`]: 공유 리시버 설정 조각, jar 탐색
//! - [`error`]: 도메인 에러 타입

pub mod component;
pub mod error;
pub mod processors;
pub mod shared;
pub mod transform;

// --- 주요 타입 re-export ---

// trait
pub use component::{MetricsProcessor, MetricsReceiver};

// 에러
pub use error::MetricsError;

// 변환
pub use transform::{Action, Aggregation, MatchType, Operation, Transform, project_name};

// 프로세서
pub use processors::{ExcludeMetrics, Polarity, QueryContext, TransformQuery};

// 공유 조각
pub use shared::{
    JarLocator, ReceiverShared, SharedCluster, SharedCollectJvm, SharedJvm, SharedTls,
    SharedVersion,
};
