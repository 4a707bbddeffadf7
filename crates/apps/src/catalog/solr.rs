//! Apache Solr (JMX, 시스템 로그)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::Severity;
use opsconf_logging::{
    LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable,
};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedJvm};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, workload_prefix,
};

const TYPE: &str = "solr";
const DEFAULT_ENDPOINT: &str = "localhost:18983";

#[derive(Debug, Clone, Deserialize)]
struct Solr {
    #[serde(flatten)]
    jvm: SharedJvm,
}

impl ProductMetrics for Solr {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Solr {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                TYPE,
                vec![normalize_sums(), workload_prefix(), scope(TYPE)],
                &ctx.jmx_jar,
            ))
    }
}

// 2021-10-21 15:51:36.339 INFO  (qtp1-17) [   x:gettingstarted] o.a.s.c.S.Request [gettingstarted]  webapp=/solr path=/select params={} hits=0 status=0 QTime=0
const SYSTEM_REGEX: &str = r"^(?<timestamp>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3,6})\s(?<level>[A-z]+)\s{1,5}\((?<thread>[^\)]+)\)\s\[c?:?(?<collection>[^\s]*)\ss?:?(?<shard>[^\s]*)\sr?:?(?<replica>[^\s]*)\sx?:?(?<core>[^\]]*)\]\s(?<source>[^\s]+)\s(?<message>(?:(?!\s=>)[\s\S])+)\s?=?>?(?<exception>[\s\S]*)";

struct SolrSystem;

impl FilesProduct for SolrSystem {
    const TYPE: &'static str = "solr_system";
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/solr/logs/solr.log"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(
            SYSTEM_REGEX,
            ParserShared::new("timestamp", "%Y-%m-%d %H:%M:%S.%L"),
        )?;
        let rules = anchored_rules(r"\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3}\s[A-z]+\s{1,5}");
        let severity = SeverityTable::new(
            "level",
            &[
                ("TRACE", Severity::Debug),
                ("DEBUG", Severity::Debug),
                ("INFO", Severity::Info),
                ("WARN", Severity::Warning),
                ("ERROR", Severity::Error),
                ("FATAL", Severity::Critical),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(rules, vec![parser])?)
                .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Solr>(registries)?;
    register_files_product::<SolrSystem>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use serde_json::Value;

    #[test]
    fn system_line_preview() {
        let p = SolrSystem::processor().unwrap();
        let record = p
            .inspect()
            .preview("2021-10-21 15:51:36.339 INFO  (qtp1-17) [   x:gettingstarted] o.a.s.c.S.Request [gettingstarted]  webapp=/solr path=/select status=0 QTime=0")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("INFO"));
        assert_eq!(record.fields["thread"], Value::from("qtp1-17"));
        assert_eq!(record.fields["core"], Value::from("gettingstarted"));
        assert_eq!(record.fields["source"], Value::from("o.a.s.c.S.Request"));
        assert!(record.timestamp.is_some());
    }
}
