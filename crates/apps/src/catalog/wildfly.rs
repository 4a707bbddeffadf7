//! WildFly 서버 로그

use opsconf_core::error::OpsconfError;
use opsconf_core::types::Severity;
use opsconf_logging::multiline::START_STATE;
use opsconf_logging::{
    LoggingError, MultilineRule, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};

use super::{FilesProduct, ProductProcessor, Registries, register_files_product, severity_fields};

// 2022-01-18 13:44:35,372 INFO  [org.wildfly.security] (ServerService Thread Pool -- 27) ELY00001: WildFly Elytron version 1.18.1.Final
const LOG_REGEX: &str = r"^(?<time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}.\d{3,})\s+(?<level>\w+)(?:\s+\[(?<source>.+?)\])?(?:\s+\((?<thread>.+?)\))?\s+(?<message>(?:(?<messageCode>[\d\w]+):)?[\s\S]*)";
const LINE_START: &str = r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{3,}";

struct WildflyServer;

impl FilesProduct for WildflyServer {
    const TYPE: &'static str = "wildfly_server";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/wildfly/standalone/log/server.log",
        "/opt/wildfly/domain/servers/*/log/server.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(LOG_REGEX, ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L"))?;
        // 시작 규칙은 줄 중간의 타임스탬프도 받아들입니다.
        let rules = vec![
            MultilineRule::new(START_STATE, LINE_START, "cont"),
            MultilineRule::new("cont", format!("^(?!{LINE_START})"), "cont"),
        ];
        // 매핑되지 않은 수준은 원래 값을 유지합니다.
        let severity = SeverityTable::new(
            "level",
            &[
                ("TRACE", Severity::Trace),
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("ERROR", Severity::Error),
                ("WARN", Severity::Warning),
            ],
            false,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(rules, vec![parser])?)
                .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_files_product::<WildflyServer>(registries)
}
