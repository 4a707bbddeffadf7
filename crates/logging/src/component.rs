//! 로그 디스크립터 trait
//!
//! 수신기는 태그 하나에 대한 INPUT 계열 컴포넌트를, 프로세서는 `(tag, uid)`에
//! 대한 FILTER/PARSER 컴포넌트를 만듭니다. [`Inspect`]는 CLI 미리보기와
//! 테스트가 디스크립터 안의 규칙/파서/심각도 테이블을 꺼내 보는 창구입니다.

use std::fmt;

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::Component;

use crate::multiline::MultilineRules;
use crate::parser::{Record, RegexParser};
use crate::severity::SeverityTable;

/// 디스크립터 내부 들여다보기
#[derive(Debug, Clone, Default)]
pub struct Inspect<'a> {
    pub multiline: Option<&'a MultilineRules>,
    pub parsers: Vec<&'a RegexParser>,
    pub severity: Option<&'a SeverityTable>,
}

impl<'a> Inspect<'a> {
    /// 두 결과를 합칩니다. 멀티라인과 심각도는 먼저 나온 쪽이 이깁니다.
    pub fn merge(mut self, other: Inspect<'a>) -> Self {
        self.multiline = self.multiline.or(other.multiline);
        self.severity = self.severity.or(other.severity);
        self.parsers.extend(other.parsers);
        self
    }

    /// 처음 매칭되는 파서로 미리보기합니다.
    pub fn preview(&self, line: &str) -> Option<Record> {
        self.parsers.iter().find_map(|p| p.preview(line))
    }

    pub fn is_empty(&self) -> bool {
        self.multiline.is_none() && self.parsers.is_empty() && self.severity.is_none()
    }
}

/// 로그 프로세서 디스크립터
pub trait LoggingProcessor: fmt::Debug + Send + Sync {
    /// `tag`로 라우팅되는 레코드에 적용할 컴포넌트를 만듭니다.
    ///
    /// `uid`는 같은 태그 안에서 컴포넌트 이름을 구분합니다.
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component>;

    fn inspect(&self) -> Inspect<'_> {
        Inspect::default()
    }
}

/// 로그 수신기 디스크립터
pub trait LoggingReceiver: fmt::Debug + Send + Sync {
    fn components(&self, ctx: &GenContext, tag: &str) -> Vec<Component>;

    /// 수신기에 묶인 프로세서 (파일 수신기 + 제품 프로세서 조합)
    fn builtin_processor(&self) -> Option<&dyn LoggingProcessor> {
        None
    }

    fn inspect(&self) -> Inspect<'_> {
        match self.builtin_processor() {
            Some(p) => p.inspect(),
            None => Inspect::default(),
        }
    }
}

/// 순서대로 적용되는 프로세서 목록
///
/// 제품 프로세서는 파서 + 필드 수정 등 여러 단계로 구성되며,
/// 모든 단계가 같은 `uid`를 공유합니다.
#[derive(Debug, Default)]
pub struct ProcessorChain {
    steps: Vec<Box<dyn LoggingProcessor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 단계를 추가합니다 (builder).
    pub fn then(mut self, step: impl LoggingProcessor + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl LoggingProcessor for ProcessorChain {
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        self.steps
            .iter()
            .flat_map(|step| step.components(ctx, tag, uid))
            .collect()
    }

    fn inspect(&self) -> Inspect<'_> {
        self.steps
            .iter()
            .fold(Inspect::default(), |acc, step| acc.merge(step.inspect()))
    }
}
