//! Active Directory Domain Services (Windows 전용)

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::PlatformFilter;
use opsconf_logging::{LoggingError, LoggingReceiver, WindowsEventLogReceiver};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared};

use super::{ProductMetrics, Registries, body_or_empty, register_metrics, scope, workload_prefix};

const TYPE: &str = "active_directory_ds";

/// 채널을 지정하지 않았을 때 읽는 이벤트 로그 채널
pub const DEFAULT_CHANNELS: [&str; 2] = ["Directory Service", "Active Directory Web Services"];

// ─── 메트릭 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct ActiveDirectoryDs {
    #[serde(flatten)]
    shared: ReceiverShared,
}

impl ProductMetrics for ActiveDirectoryDs {
    const TYPE: &'static str = TYPE;
    const PLATFORMS: PlatformFilter = PlatformFilter::WindowsOnly;
    const FIELDS: &'static [&'static [&'static str]] = &[ReceiverShared::FIELDS];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()
    }
}

impl MetricsReceiver for ActiveDirectoryDs {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({ "collection_interval": self.shared.collection_interval_string() }),
            ),
            vec![normalize_sums(), workload_prefix(), scope(TYPE)],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActiveDirectoryDsLogs {
    #[serde(default)]
    channels: Vec<String>,
}

fn logging_receiver(body: serde_yaml::Value) -> Result<Box<dyn LoggingReceiver>, OpsconfError> {
    let config: ActiveDirectoryDsLogs =
        serde_yaml::from_value(body_or_empty(body)).map_err(LoggingError::from)?;
    let receiver = if config.channels.is_empty() {
        WindowsEventLogReceiver::new(&DEFAULT_CHANNELS)
    } else {
        let channels: Vec<&str> = config.channels.iter().map(String::as_str).collect();
        WindowsEventLogReceiver::new(&channels)
    };
    Ok(Box::new(receiver))
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<ActiveDirectoryDs>(registries)?;
    registries
        .logging_receivers
        .register(TYPE, PlatformFilter::WindowsOnly, logging_receiver)
}
