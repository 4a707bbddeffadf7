//! Apache Tomcat (JMX, catalina/접근 로그)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::{
    AccessLog, LoggingError, ModifyFields, ParseMultilineRegex, ParserShared, RegexParser,
    SeverityTable,
};
use opsconf_metrics::processors::{metrics_remove_service_attributes, normalize_sums};
use opsconf_metrics::{MetricsError, MetricsReceiver, SharedCollectJvm, SharedJvm};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields, workload_prefix,
};

const TYPE: &str = "tomcat";
const DEFAULT_ENDPOINT: &str = "localhost:8050";

#[derive(Debug, Clone, Deserialize)]
struct Tomcat {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Tomcat {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Tomcat {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![
                    normalize_sums(),
                    workload_prefix(),
                    scope(TYPE),
                    metrics_remove_service_attributes(),
                ],
                &ctx.jmx_jar,
            ))
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 13-Jan-2022 16:10:27.715 INFO [main] org.apache.catalina.startup.Catalina.start Server startup in [1090] milliseconds
const SYSTEM_REGEX: &str = r"^(?<time>\d{2}-[A-Z]{1}[a-z]{2}-\d{4}\s\d{2}:\d{2}:\d{2}.\d{3})\s(?<level>[A-Z]+)\s\[(?<module>[^\]]+)\]\s(?<message>(?<source>[\w\.]+)[\S\s]+)";

struct TomcatSystem;

impl FilesProduct for TomcatSystem {
    const TYPE: &'static str = "tomcat_system";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/tomcat/logs/catalina.out",
        "/var/log/tomcat*/catalina.out",
        "/var/log/tomcat*/catalina.*.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(
            SYSTEM_REGEX,
            ParserShared::new("time", "%d-%b-%Y %H:%M:%S.%L")
                .with_type("lineNumber", FieldType::Integer),
        )?;
        // java.util.logging 수준
        let severity = SeverityTable::new(
            "level",
            &[
                ("FINEST", Severity::Debug),
                ("FINER", Severity::Debug),
                ("FINE", Severity::Debug),
                ("INFO", Severity::Info),
                ("WARNING", Severity::Warning),
                ("SEVERE", Severity::Critical),
            ],
            true,
        );
        Ok(
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(r"\d{2}-[A-Z]{1}[a-z]{2}-\d{4}\s\d{2}:\d{2}:\d{2}.\d{3}"),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

struct TomcatAccess;

impl FilesProduct for TomcatAccess {
    const TYPE: &'static str = "tomcat_access";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/tomcat/logs/localhost_access_log*.txt",
        "/var/log/tomcat*/localhost_access_log*.txt",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        Ok(ProductProcessor::new(AccessLog::new()?)
            .then(ModifyFields::new().with_instrumentation_source(Self::TYPE).build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Tomcat>(registries)?;
    register_files_product::<TomcatSystem>(registries)?;
    register_files_product::<TomcatAccess>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn metrics_drop_service_attributes_last() {
        let r: Tomcat = parse_strict(serde_yaml::Value::Null, Tomcat::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        let processors = &pipelines[0].processors["metrics"];
        assert_eq!(processors.len(), 4);
        assert_eq!(
            processors[3].config["metric_statements"][0]["context"],
            "resource"
        );
    }

    #[test]
    fn catalina_line_preview() {
        let p = TomcatSystem::processor().unwrap();
        let record = p
            .inspect()
            .preview("13-Jan-2022 16:10:27.715 INFO [main] org.apache.catalina.startup.Catalina.start Server startup in [1090] milliseconds")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("INFO"));
        assert_eq!(record.fields["module"], Value::from("main"));
        assert_eq!(
            record.fields["source"],
            Value::from("org.apache.catalina.startup.Catalina.start")
        );
        assert!(record.timestamp.is_some());
    }
}
