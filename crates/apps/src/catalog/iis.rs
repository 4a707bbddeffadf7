//! Internet Information Services (Windows 전용)
//!
//! 메트릭은 `receiver_version`으로 세대를 고릅니다.
//! - 1: `windowsperfcounters`의 `Web Service` 카운터, `agent.googleapis.com/iis/*`
//! - 2: `iis` 리시버, `workload.googleapis.com/iis.*`

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, PlatformFilter};
use opsconf_logging::{LoggingError, LuaScript, ModifyField, ModifyFields, ParseRegex, ParserShared};
use opsconf_metrics::processors::{
    cast_to_sum, condense_resource_metrics, flatten_resource_attribute, metrics_transform,
    normalize_sums, retain_resource, set_scope_name, set_scope_version, transformation_metrics,
    AGENT_SCOPE_PREFIX,
};
use opsconf_metrics::transform::WORKLOAD_PREFIX;
use opsconf_metrics::{
    Aggregation, MetricsError, MetricsReceiver, Operation, ReceiverShared, SharedVersion, Transform,
};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope,
};

const TYPE: &str = "iis";
const LATEST_VERSION: u64 = 2;
const AGENT_PREFIX: &str = "agent.googleapis.com";

const WEB_SERVICE_COUNTERS: [&str; 11] = [
    "Current Connections",
    "Total Bytes Received",
    "Total Bytes Sent",
    "Total Connection Attempts (all instances)",
    "Total Delete Requests",
    "Total Get Requests",
    "Total Head Requests",
    "Total Options Requests",
    "Total Post Requests",
    "Total Put Requests",
    "Total Trace Requests",
];

#[derive(Debug, Clone, Deserialize)]
struct Iis {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    version: SharedVersion,
}

impl Iis {
    fn perf_counter_pipeline(&self) -> Result<ReceiverPipeline, MetricsError> {
        let counters: Vec<_> = WEB_SERVICE_COUNTERS
            .iter()
            .map(|name| json!({ "name": name }))
            .collect();
        let config = json!({
            "collection_interval": self.shared.collection_interval_string(),
            "perfcounters": [{
                "object": "Web Service",
                "instances": ["_Total"],
                "counters": counters,
            }],
        });
        // metricstransform 치환 문법 때문에 `$`는 `$$`로 씁니다.
        let transforms = vec![
            Transform::rename_metric(
                r"\Web Service(_Total)\Current Connections",
                "iis/current_connections",
            ),
            Transform::combine_metrics(
                r"^\\Web Service\(_Total\)\\Total Bytes (?P<direction>.*)$$",
                "iis/network/transferred_bytes_count",
            )?
            .with_operations(vec![Operation::ToggleScalarDataType]),
            Transform::rename_metric(
                r"\Web Service(_Total)\Total Connection Attempts (all instances)",
                "iis/new_connection_count",
            )
            .with_operations(vec![Operation::ToggleScalarDataType]),
            Transform::combine_metrics(
                r"^\\Web Service\(_Total\)\\Total (?P<http_method>.*) Requests$$",
                "iis/request_count",
            )?
            .with_operations(vec![Operation::ToggleScalarDataType]),
            Transform::add_prefix(AGENT_PREFIX),
        ];

        Ok(ReceiverPipeline::metrics(
            Component::new("windowsperfcounters", config),
            vec![
                metrics_transform(transforms),
                cast_to_sum(&[
                    "agent.googleapis.com/iis/network/transferred_bytes_count",
                    "agent.googleapis.com/iis/new_connection_count",
                    "agent.googleapis.com/iis/request_count",
                ]),
                normalize_sums(),
                scope(TYPE),
            ],
        ))
    }

    fn iis_receiver_pipeline(&self) -> Result<ReceiverPipeline, MetricsError> {
        Ok(ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({ "collection_interval": self.shared.collection_interval_string() }),
            ),
            vec![
                transformation_metrics([
                    flatten_resource_attribute("iis.site", "site"),
                    flatten_resource_attribute("iis.application_pool", "app_pool"),
                    set_scope_name(&format!("{AGENT_SCOPE_PREFIX}{TYPE}")),
                    set_scope_version("2.0"),
                ]),
                // 같은 transform 안에서 지우면 첫 데이터포인트만 속성이 내려갑니다.
                transformation_metrics([retain_resource(&[])]),
                condense_resource_metrics(),
                metrics_transform(vec![
                    Transform::update_metric_regexp("^iis")?.with_operations(vec![
                        Operation::aggregate_labels(Aggregation::Sum, &["direction", "request"]),
                    ]),
                    Transform::add_prefix(WORKLOAD_PREFIX),
                ]),
                normalize_sums(),
            ],
        ))
    }
}

impl ProductMetrics for Iis {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::WindowsOnly;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS, SharedVersion::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.version.validate(LATEST_VERSION)
    }
}

impl MetricsReceiver for Iis {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let pipeline = match self.version.version() {
            2 => self.iis_receiver_pipeline()?,
            _ => self.perf_counter_pipeline()?,
        };
        Ok(vec![pipeline])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// W3C 확장 로그 형식
// 2022-03-10 17:26:30 ::1 GET /iisstart.png - 80 - ::1 Mozilla/5.0+(Windows+NT+10.0) http://localhost/ 200 0 0 18
const ACCESS_REGEX: &str = r"^(?<timestamp>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2})\s(?<http_request_serverIp>[^\s]+)\s(?<http_request_requestMethod>[^\s]+)\s(?<cs_uri_stem>\/[^\s]*)\s(?<cs_uri_query>[^\s]*)\s(?<s_port>\d*)\s(?<user>[^\s]+)\s(?<http_request_remoteIp>[^\s]+)\s(?<http_request_userAgent>[^\s]+)\s(?<http_request_referer>[^\s]+)\s(?<http_request_status>\d{3})\s(?<sc_substatus>\d+)\s(?<sc_win32_status>\d+)\s(?<time_taken>\d+)$";

/// `-` 자리 표시자를 지우고 서버 주소와 요청 URL을 조립합니다.
const MERGE_FIELDS: LuaScript = LuaScript::new(
    "iis_merge_fields",
    r#"function iis_merge_fields(tag, timestamp, record)
  for _, key in ipairs({"cs_uri_query", "http_request_referer", "user"}) do
    if record[key] == "-" then
      record[key] = nil
    end
  end

  if record["http_request_serverIp"] ~= nil and record["s_port"] ~= nil then
    record["http_request_serverIp"] = record["http_request_serverIp"] .. ":" .. record["s_port"]
  end
  local query = record["cs_uri_query"]
  if query == nil or query == "" then
    record["http_request_requestUrl"] = record["cs_uri_stem"]
  else
    record["http_request_requestUrl"] = record["cs_uri_stem"] .. "?" .. query
  end

  record["cs_uri_query"] = nil
  record["cs_uri_stem"] = nil
  record["s_port"] = nil
  return 2, timestamp, record
end
"#,
);

const HTTP_REQUEST_FIELDS: [&str; 7] = [
    "serverIp",
    "requestUrl",
    "remoteIp",
    "requestMethod",
    "status",
    "referer",
    "userAgent",
];

struct IisAccess;

impl FilesProduct for IisAccess {
    const TYPE: &'static str = "iis_access";
    const DEFAULT_PATHS: &'static [&'static str] = &[r"C:\inetpub\logs\LogFiles\W3SVC1\u_ex*"];
    const PLATFORMS: PlatformFilter = PlatformFilter::WindowsOnly;

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseRegex::new(
            ACCESS_REGEX,
            ParserShared::new("timestamp", "%Y-%m-%d %H:%M:%S")
                .with_type("http_request_status", FieldType::Integer),
        )?;
        let http_request = HTTP_REQUEST_FIELDS.iter().fold(
            ModifyFields::new().with_instrumentation_source(Self::TYPE),
            |fields, name| {
                fields.field(
                    format!("httpRequest.{name}"),
                    ModifyField::move_from(format!("jsonPayload.http_request_{name}")),
                )
            },
        );
        Ok(ProductProcessor::new(parse)
            .then(MERGE_FIELDS)
            .then(http_request.build()?))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Iis>(registries)?;
    register_files_product::<IisAccess>(registries)
}
