#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`catalog`]: 레지스트리 초기화, 제품 디스크립터, 내장 `lib:` 프로세서
//! - [`config`]: 통합 사용자 설정 파싱, 해석, 검증
//! - [`generate`]: fluent-bit / collector 설정 생성과 파일 쓰기
//! - [`error`]: 도메인 에러 타입
//!
//! # 흐름
//!
//! ```text
//! config.yaml ─► UnifiedConfig ─► resolve(Registries) ─► ResolvedConfig
//!                                                            │
//!                                       generate ◄───────────┘
//!                                          │
//!                       fluent_bit_main.conf, fluent_bit_parser.conf, *.lua, otel.yaml
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod generate;

// --- 주요 타입 re-export ---

pub use catalog::{Registries, build_registries};
pub use config::{ResolvedConfig, UnifiedConfig};
pub use error::AppsError;
pub use generate::{Generated, generate};
