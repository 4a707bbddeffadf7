//! SAP HANA 트레이스 로그

use opsconf_core::error::OpsconfError;
use opsconf_core::fluentbit::{Condition, ModifyOptions};
use opsconf_core::types::{FieldType, Severity};
use opsconf_logging::{LoggingError, ModifySteps, MultilineRule, ParseRegex, ParserShared, SeverityTable};

use super::{
    FilesProduct, ProductProcessor, Registries, anchored_rules, register_files_product,
    severity_fields,
};

// [thread_id]{connection_id}[transaction_id/update_transaction_id] timestamp severity_flag component source_file : message
// [7893]{200068}[20/40637286] 2021-11-04 13:13:25.025767 w FileIO           FileSystem.cpp(00085) : Unsupported file system "ext4"
const TRACE_REGEX: &str = r"^\[(?<thread_id>\d+)\]\{(?<connection_id>-?\d+)\}\[(?<transaction_id>-?\d+)\/(?<update_transaction_id>-?\d+)\]\s+(?<time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3,6}\d+)\s+(?<severity_flag>\w+)\s+(?<component>\w+)\s+(?<source_file>\S+)\s+:\s+(?<message>[\s\S]+)";

/// 연결/트랜잭션이 없으면 `-1`로 기록되는 필드
const UNASSOCIATED_FIELDS: [&str; 3] = ["connection_id", "transaction_id", "update_transaction_id"];

struct SapHanaTrace;

impl FilesProduct for SapHanaTrace {
    const TYPE: &'static str = "saphana_trace";
    const DEFAULT_PATHS: &'static [&'static str] = &["/usr/sap/*/HDB*/${HOSTNAME}/trace/*.trc"];
    const DEFAULT_EXCLUDE_PATHS: &'static [&'static str] = &[
        "/usr/sap/*/HDB*/${HOSTNAME}/trace/nameserver_history*.trc",
        "/usr/sap/*/HDB*/${HOSTNAME}/trace/nameserver*loads*.trc",
        "/usr/sap/*/HDB*/${HOSTNAME}/trace/nameserver*executed_statements*.trc",
    ];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let mut shared = ParserShared::new("time", "%Y-%m-%d %H:%M:%S.%L")
            .with_type("thread_id", FieldType::Integer);
        for field in UNASSOCIATED_FIELDS {
            shared = shared.with_type(field, FieldType::Integer);
        }
        let parse = ParseRegex::new(TRACE_REGEX, shared)?;
        let severity = SeverityTable::new(
            "severity_flag",
            &[
                ("d", Severity::Debug),
                ("i", Severity::Info),
                ("w", Severity::Warning),
                ("e", Severity::Error),
                ("f", Severity::Alert),
            ],
            false,
        );
        let cleanup = UNASSOCIATED_FIELDS.iter().fold(ModifySteps::new(), |steps, field| {
            steps.then(
                ModifyOptions::remove(field)
                    .when(Condition::KeyValueEquals((*field).to_owned(), "-1".to_owned())),
            )
        });
        Ok(ProductProcessor::new(parse)
            .then(severity_fields(Self::TYPE, severity).build()?)
            .then(cleanup))
    }

    fn receiver_rules() -> Option<Vec<MultilineRule>> {
        Some(anchored_rules(r"\[\d+\]\{-?\d+\}"))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_files_product::<SapHanaTrace>(registries)
}
