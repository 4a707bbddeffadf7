//! Apache HBase (JMX)

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::ReceiverPipeline;
use opsconf_core::types::Severity;
use opsconf_logging::{LoggingError, ParseMultilineRegex, ParserShared, RegexParser, SeverityTable};
use opsconf_metrics::processors::{metrics_transform, normalize_sums};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{
    Aggregation, MetricsError, MetricsReceiver, Operation, SharedCollectJvm, SharedJvm, Transform,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, anchored_rules,
    register_files_product, register_metrics, scope, severity_fields,
};

const TYPE: &str = "hbase";
const DEFAULT_ENDPOINT: &str = "localhost:10101";

#[derive(Debug, Clone, Deserialize)]
struct Hbase {
    #[serde(flatten)]
    jvm: SharedJvm,
    #[serde(flatten)]
    collect_jvm: SharedCollectJvm,
}

impl ProductMetrics for Hbase {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.jvm.validate()
    }
}

impl MetricsReceiver for Hbase {
    fn pipelines(&self, ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let transforms = vec![
            Transform::add_prefix(WORKLOAD_PREFIX),
            Transform::update_metric("hbase.region_server.*")
                .with_operations(vec![Operation::aggregate_labels(Aggregation::Max, &["state"])]),
        ];
        Ok(self
            .jvm
            .clone()
            .with_default_endpoint(DEFAULT_ENDPOINT)
            .configure_pipelines(
                &self.collect_jvm.target_system_string(TYPE),
                vec![normalize_sums(), metrics_transform(transforms), scope(TYPE)],
                &ctx.jmx_jar,
            ))
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// 2022-01-20 20:38:18,856 INFO  [main] master.HMaster: STARTING service HMaster
const LOG_REGEX: &str = r"^(?<time>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\,\d{3,6})\s(?<level>[A-Z]+)\s{2}\[(?<module>[^\]]+)\]\s(?<message>(?<source>[\w\.]+)[^\n]+)";
const LOG_START: &str = r"\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\,\d{3,6}";

struct HbaseSystem;

impl FilesProduct for HbaseSystem {
    const TYPE: &'static str = "hbase_system";
    const DEFAULT_PATHS: &'static [&'static str] = &[
        "/opt/hbase/logs/hbase-*-regionserver-*.log",
        "/opt/hbase/logs/hbase-*-master-*.log",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parser = RegexParser::new(LOG_REGEX, ParserShared::new("time", "%Y-%m-%d %H:%M:%S,%L"))?;
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
            ProductProcessor::multiline(ParseMultilineRegex::new(
                anchored_rules(LOG_START),
                vec![parser],
            )?)
            .then(severity_fields(Self::TYPE, severity).build()?),
        )
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Hbase>(registries)?;
    register_files_product::<HbaseSystem>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;
    use serde_json::Value;

    #[test]
    fn region_server_state_aggregated_by_max() {
        let r: Hbase = parse_strict(serde_yaml::Value::Null, Hbase::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        assert_eq!(pipelines[0].receiver.config["target_system"], "hbase,jvm");
        let transforms = &pipelines[0].processors["metrics"][1].config["transforms"];
        assert_eq!(transforms[1]["include"], "hbase.region_server.*");
        assert_eq!(transforms[1]["operations"][0]["aggregation_type"], "max");
        assert_eq!(transforms[1]["operations"][0]["label_set"][0], "state");
    }

    #[test]
    fn warn_line_preview() {
        let p = HbaseSystem::processor().unwrap();
        let record = p
            .inspect()
            .preview("2022-01-20 20:38:20,385 WARN  [main] util.NativeCodeLoader: Unable to load native-hadoop library for your platform")
            .unwrap();
        assert_eq!(record.fields["level"], Value::from("WARN"));
        assert_eq!(record.fields["module"], Value::from("main"));
        assert_eq!(record.fields["source"], Value::from("util.NativeCodeLoader"));
        assert_eq!(record.timestamp.unwrap().timestamp_subsec_millis(), 385);
    }
}
