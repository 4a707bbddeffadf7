#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`component`]: 수신기/프로세서 trait, 단계 체인, [`Inspect`]
//! - [`multiline`]: 멀티라인 분류 상태 기계와 로컬 조립기
//! - [`parser`]: 정규식/JSON 파서 디스크립터와 미리보기
//! - [`severity`]: 심각도 정규화 테이블
//! - [`modify`]: 필드 수정 Lua 생성기
//! - [`receiver`]: 파일(tail), Windows 이벤트 로그 수신기
//! - [`access_log`]: Common/Combined 접근 로그 파서
//! - [`filters`]: nest, grep, 고정 Lua, modify FILTER 단계
//! - [`error`]: 도메인 에러 타입
//!
//! # 흐름
//!
//! ```text
//! LoggingReceiver ──► INPUT (+ MULTILINE_PARSER)
//!        │
//! LoggingProcessor ─► FILTER / PARSER / Lua
//!        │
//!   Inspect ───────► classify / preview / normalize (로컬 평가)
//! ```

pub mod access_log;
pub mod component;
pub mod error;
pub mod filters;
pub mod modify;
pub mod multiline;
pub mod parser;
pub mod receiver;
pub mod severity;

// --- 주요 타입 re-export ---

// trait
pub use component::{Inspect, LoggingProcessor, LoggingReceiver, ProcessorChain};

// 에러
pub use error::LoggingError;

// 멀티라인
pub use multiline::{Assembler, LineClass, MultilineRule, MultilineRules, Transition};

// 파서
pub use parser::{
    ParseJson, ParseMultilineRegex, ParseRegex, ParseRegexComplex, ParserShared, Record,
    RegexParser,
};

// 필드 수정 / 심각도
pub use filters::{GrepExclude, LuaScript, ModifySteps, NestWildcard};
pub use modify::{ModifyField, ModifyFields, ModifyFieldsFilter};
pub use severity::{Outcome, SeverityTable};

// 수신기
pub use access_log::{AccessLog, HttpRequestNest};
pub use receiver::{FilesReceiver, ProductFilesReceiver, WindowsEventLogReceiver};
