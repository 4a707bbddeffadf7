//! 내장 `lib:` 프로세서
//!
//! 사용자가 정의하지 않아도 파이프라인에서 바로 참조할 수 있는 파서입니다.
//! 레지스트리와 별도로 관리되며, 사용자 컴포넌트 ID는 `lib:`로 시작할 수
//! 없습니다.

use opsconf_logging::{LoggingError, ParseRegex, ParserShared};

/// 내장 프로세서 ID 접두어
pub const BUILTIN_PREFIX: &str = "lib:";

/// 내장 프로세서 ID 목록
pub const BUILTIN_PROCESSORS: [&str; 8] = [
    "lib:apache",
    "lib:apache2",
    "lib:apache_error",
    "lib:mongodb",
    "lib:nginx",
    "lib:syslog-rfc3164",
    "lib:syslog-rfc5424",
    "lib:default_message_parser",
];

const ACCESS_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// 내장 프로세서를 만듭니다. 알 수 없는 ID면 `None`입니다.
pub fn builtin(id: &str) -> Result<Option<ParseRegex>, LoggingError> {
    let (regex, shared) = match id {
        "lib:apache" => (
            r#"^(?<host>[^ ]*) [^ ]* (?<user>[^ ]*) \[(?<time>[^\]]*)\] "(?<method>\S+)(?: +(?<path>[^\"]*?)(?: +\S*)?)?" (?<code>[^ ]*) (?<size>[^ ]*)(?: "(?<referer>[^\"]*)" "(?<agent>[^\"]*)")?$"#,
            ParserShared::new("time", ACCESS_TIME_FORMAT),
        ),
        "lib:apache2" => (
            r#"^(?<host>[^ ]*) [^ ]* (?<user>[^ ]*) \[(?<time>[^\]]*)\] "(?<method>\S+)(?: +(?<path>[^ ]*) +\S*)?" (?<code>[^ ]*) (?<size>[^ ]*)(?: "(?<referer>[^\"]*)" "(?<agent>.*)")?$"#,
            ParserShared::new("time", ACCESS_TIME_FORMAT),
        ),
        "lib:apache_error" => (
            r"^\[[^ ]* (?<time>[^\]]*)\] \[(?<level>[^\]]*)\](?: \[pid (?<pid>[^\]]*)\])?( \[client (?<client>[^\]]*)\])? (?<message>.*)$",
            ParserShared::default(),
        ),
        "lib:mongodb" => (
            r"^(?<time>[^ ]*)\s+(?<severity>\w)\s+(?<component>[^ ]+)\s+\[(?<context>[^\]]+)]\s+(?<message>.*?) *(?<ms>(\d+))?(:?ms)?$",
            ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L"),
        ),
        "lib:nginx" => (
            r#"^(?<remote>[^ ]*) (?<host>[^ ]*) (?<user>[^ ]*) \[(?<time>[^\]]*)\] "(?<method>\S+)(?: +(?<path>[^\"]*?)(?: +\S*)?)?" (?<code>[^ ]*) (?<size>[^ ]*)(?: "(?<referer>[^\"]*)" "(?<agent>[^\"]*)")"#,
            ParserShared::new("time", ACCESS_TIME_FORMAT),
        ),
        "lib:syslog-rfc3164" => (
            r"^<(?<pri>[0-9]+)>(?<time>[^ ]* {1,2}[^ ]* [^ ]*) (?<host>[^ ]*) (?<ident>[a-zA-Z0-9_\/\.\-]*)(?:\[(?<pid>[0-9]+)\])?(?:[^\:]*\:)? *(?<message>.*)$",
            ParserShared::new("time", "%b %d %H:%M:%S"),
        ),
        "lib:syslog-rfc5424" => (
            r"^<(?<pri>[0-9]{1,5})>1 (?<time>[^ ]+) (?<host>[^ ]+) (?<ident>[^ ]+) (?<pid>[-0-9]+) (?<msgid>[^ ]+) (?<extradata>(\[(.*?)\]|-)) (?<message>.+)$",
            ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%Z"),
        ),
        "lib:default_message_parser" => (r"^(?<message>.*)$", ParserShared::default()),
        _ => return Ok(None),
    };
    ParseRegex::new(regex, shared).map(Some)
}

/// 내장 프로세서 ID인지 확인합니다.
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_PROCESSORS.contains(&id)
}
