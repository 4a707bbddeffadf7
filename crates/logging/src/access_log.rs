//! Common/Combined 형식 접근 로그 파서
//!
//! Apache, nginx, Varnish 등의 접근 로그를 `httpRequest` 구조로 바꿉니다.
//! 값이 없는 필드는 `-`로 기록되므로 해당 필드를 제거합니다.

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::{Component, Condition, ModifyOptions};
use opsconf_core::types::FieldType;

use crate::component::{Inspect, LoggingProcessor};
use crate::error::LoggingError;
use crate::filters::NestWildcard;
use crate::parser::{ParseRegex, ParserShared};

/// 접근 로그 정규식
///
/// - common: `127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /a.gif HTTP/1.0" 200 2326`
/// - combined: 위 형식 + `"referer" "user-agent"`
pub const ACCESS_LOG_REGEX: &str = r#"^(?<http_request_remoteIp>[^ ]*) (?<host>[^ ]*) (?<user>[^ ]*) \[(?<time>[^\]]*)\] "(?<http_request_requestMethod>\S+)(?: +(?<http_request_requestUrl>[^\"]*?)(?: +(?<http_request_protocol>\S+))?)?" (?<http_request_status>[^ ]*) (?<http_request_responseSize>[^ ]*)(?: "(?<http_request_referer>[^\"]*)" "(?<http_request_userAgent>[^\"]*)")?$"#;

/// 접근 로그 시간 형식
pub const ACCESS_LOG_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// 접근 로그 프로세서
#[derive(Debug, Clone)]
pub struct AccessLog {
    parse: ParseRegex,
}

impl AccessLog {
    pub fn new() -> Result<Self, LoggingError> {
        // responseSize는 정수를 담은 문자열로 남겨 둡니다.
        let shared = ParserShared::new("time", ACCESS_LOG_TIME_FORMAT)
            .with_type("http_request_status", FieldType::Integer);
        Ok(Self {
            parse: ParseRegex::new(ACCESS_LOG_REGEX, shared)?,
        })
    }
}

/// `(tag, uid)`에 대한 접근 로그 파싱 컴포넌트
pub fn generic_access_log(
    ctx: &GenContext,
    tag: &str,
    uid: &str,
) -> Result<Vec<Component>, LoggingError> {
    Ok(AccessLog::new()?.components(ctx, tag, uid))
}

/// `http_request_*` 필드를 `httpRequest` 구조로 묶는 nest FILTER
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpRequestNest;

impl LoggingProcessor for HttpRequestNest {
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        NestWildcard::new(
            "http_request_*",
            "logging.googleapis.com/http_request",
            "http_request_",
        )
        .components(ctx, tag, uid)
    }
}

impl LoggingProcessor for AccessLog {
    fn components(&self, ctx: &GenContext, tag: &str, uid: &str) -> Vec<Component> {
        let mut components = self.parse.components(ctx, tag, uid);
        for field in ["host", "user", "http_request_referer"] {
            components.push(
                ModifyOptions::remove(field)
                    .when(Condition::KeyValueEquals(field.to_owned(), "-".to_owned()))
                    .component(tag),
            );
        }
        components.extend(HttpRequestNest.components(ctx, tag, uid));
        components
    }

    fn inspect(&self) -> Inspect<'_> {
        self.parse.inspect()
    }
}
