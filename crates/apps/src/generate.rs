//! 설정 생성 -- 검증된 통합 설정을 fluent-bit 파일과 collector YAML로 변환
//!
//! # 로그 (fluent-bit)
//! - 파이프라인 `p`의 수신기 `r`로 들어온 레코드는 태그 `p.r`을 가집니다.
//! - 수신기 컴포넌트, 수신기에 묶인 제품 프로세서(uid = 타입),
//!   파이프라인 프로세서(uid = `p_<index>`) 순서로 이어집니다.
//! - 모든 태그는 마지막 `stackdriver` OUTPUT으로 모입니다.
//!
//! # 메트릭 (OTel collector)
//! - 수신기 `r`은 리시버 파이프라인 `r` (여러 개면 `r_<i>`)이 됩니다.
//! - 파이프라인 이름은 `<p>_<리시버 파이프라인 이름>`이며, 리시버 고정
//!   프로세서 뒤에 사용자 프로세서가 붙습니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, info};

use opsconf_core::config::OpsconfConfig;
use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::fluentbit::{self, Component, Kind};
use opsconf_core::metrics::{
    COMPONENTS_GENERATED_TOTAL, ENGINE_FLUENT_BIT, ENGINE_OTEL, LABEL_ENGINE,
};
use opsconf_core::otel::{self, SIGNAL_METRICS};
use opsconf_core::types::Platform;
use opsconf_metrics::processors::gcp_resource_detector;

use crate::config::{ResolvedConfig, ResolvedLogging, ResolvedMetrics};

/// fluent-bit 내장 HTTP 서버 포트
pub const FLUENT_BIT_HTTP_PORT: u16 = 20202;

/// 출력 플러그인에 기록되는 user agent
pub const USER_AGENT: &str = concat!("opsconf/", env!("CARGO_PKG_VERSION"));

/// 생성된 파일 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// 파일 이름 → 내용 (메인, 파서, Lua 스크립트)
    pub fluent_bit: BTreeMap<String, String>,
    pub otel: String,
    /// collector 설정 파일 이름
    pub otel_file: String,
}

impl Generated {
    /// 모든 파일을 `dir`에 씁니다. 디렉토리가 없으면 만듭니다.
    ///
    /// 쓴 파일 경로를 이름순으로 반환합니다.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, OpsconfError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let mut written = Vec::with_capacity(self.fluent_bit.len() + 1);
        for (name, contents) in self.files() {
            let path = dir.join(name);
            tokio::fs::write(&path, contents).await?;
            debug!(path = %path.display(), bytes = contents.len(), "file written");
            written.push(path);
        }
        written.sort();
        info!(dir = %dir.display(), files = written.len(), "generated config written");
        Ok(written)
    }

    /// `(파일 이름, 내용)` 목록. fluent-bit 파일 다음에 collector 설정이 옵니다.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fluent_bit
            .iter()
            .map(|(name, contents)| (name.as_str(), contents.as_str()))
            .chain(std::iter::once((self.otel_file.as_str(), self.otel.as_str())))
    }
}

/// 두 엔진의 설정을 생성합니다.
pub fn generate(
    resolved: &ResolvedConfig,
    settings: &OpsconfConfig,
    ctx: &GenContext,
) -> Result<Generated, OpsconfError> {
    let fluent_bit = fluent_bit_config(&resolved.logging, settings, ctx).generate(
        &settings.output.fluent_bit_main,
        &settings.output.fluent_bit_parser,
    )?;
    let otel = otel_config(&resolved.metrics, ctx)?.generate()?;
    Ok(Generated {
        fluent_bit,
        otel,
        otel_file: settings.output.otel.clone(),
    })
}

// ─── fluent-bit ──────────────────────────────────────────────────────

/// 로그 섹션에서 fluent-bit 모델을 만듭니다.
pub fn fluent_bit_config(
    logging: &ResolvedLogging,
    settings: &OpsconfConfig,
    ctx: &GenContext,
) -> fluentbit::ModularConfig {
    let mut config = fluentbit::ModularConfig::default();
    config.variables.insert(
        "buffers_dir".to_owned(),
        settings.generator.buffers_dir.clone(),
    );
    config
        .variables
        .insert("logs_dir".to_owned(), settings.generator.logs_dir.clone());

    config.components.push(service_section(&logging.log_level, settings));

    for (pipeline_id, pipeline) in &logging.pipelines {
        for receiver_id in &pipeline.receivers {
            let Some(receiver) = logging.receivers.get(receiver_id) else {
                continue;
            };
            let tag = format!("{pipeline_id}.{receiver_id}");
            config
                .components
                .extend(receiver.descriptor.components(ctx, &tag));
            if let Some(processor) = receiver.descriptor.builtin_processor() {
                config
                    .components
                    .extend(processor.components(ctx, &tag, &receiver.type_id));
            }
            for (i, processor_id) in pipeline.processors.iter().enumerate() {
                let Some(processor) = logging.processors.get(processor_id) else {
                    continue;
                };
                let uid = format!("{pipeline_id}_{i}");
                config
                    .components
                    .extend(processor.descriptor.components(ctx, &tag, &uid));
            }
        }
    }

    config.components.push(stackdriver_output(ctx.platform));

    let count = config.components.len();
    metrics::counter!(COMPONENTS_GENERATED_TOTAL, LABEL_ENGINE => ENGINE_FLUENT_BIT)
        .increment(count as u64);
    debug!(components = count, "fluent-bit components generated");
    config
}

fn service_section(log_level: &str, settings: &OpsconfConfig) -> Component {
    Component::new(Kind::Service)
        .with("Flush", "1")
        .with("Daemon", "off")
        .with("Log_Level", log_level)
        .with("HTTP_Server", "On")
        .with("HTTP_Listen", "0.0.0.0")
        .with("HTTP_PORT", FLUENT_BIT_HTTP_PORT.to_string())
        .with("storage.path", format!("{}/fluent-bit", settings.generator.state_dir))
        .with("storage.sync", "normal")
        .with("storage.checksum", "on")
        .with("storage.backlog.mem_limit", "50M")
        .with("storage.max_chunks_up", "128")
        .with("storage.metrics", "on")
}

fn stackdriver_output(platform: Platform) -> Component {
    let workers = match platform {
        Platform::Linux => "8",
        Platform::Windows => "1",
    };
    Component::new(Kind::Output)
        .with("Name", "stackdriver")
        .with("Match", "*")
        .with("resource", "gce_instance")
        .with("stackdriver_agent", USER_AGENT)
        .with("Retry_Limit", "3")
        .with("tls", "On")
        .with("tls.verify", "Off")
        .with("workers", workers)
}

// ─── OTel collector ──────────────────────────────────────────────────

/// 메트릭 섹션에서 collector 모델을 만듭니다.
pub fn otel_config(
    section: &ResolvedMetrics,
    ctx: &GenContext,
) -> Result<otel::ModularConfig, OpsconfError> {
    let mut receiver_pipelines = BTreeMap::new();
    let mut pipelines = BTreeMap::new();

    for (pipeline_id, pipeline) in &section.pipelines {
        let mut user_processors = Vec::new();
        for processor_id in &pipeline.processors {
            if let Some(processor) = section.processors.get(processor_id) {
                user_processors.extend(processor.descriptor.processors()?);
            }
        }

        for receiver_id in &pipeline.receivers {
            let Some(receiver) = section.receivers.get(receiver_id) else {
                continue;
            };
            let built = receiver.descriptor.pipelines(ctx)?;
            let several = built.len() > 1;
            for (i, rp) in built.into_iter().enumerate() {
                let name = if several {
                    format!("{receiver_id}_{i}")
                } else {
                    receiver_id.clone()
                };
                pipelines.insert(
                    format!("{pipeline_id}_{name}"),
                    otel::Pipeline {
                        signal: SIGNAL_METRICS.to_owned(),
                        receiver_pipeline_name: name.clone(),
                        processors: user_processors.clone(),
                    },
                );
                receiver_pipelines.insert(name, rp);
            }
        }
    }

    let count: usize = receiver_pipelines
        .values()
        .map(|rp: &otel::ReceiverPipeline| {
            1 + rp.processors.values().map(Vec::len).sum::<usize>()
        })
        .sum::<usize>()
        + pipelines
            .values()
            .map(|p: &otel::Pipeline| p.processors.len())
            .sum::<usize>();
    metrics::counter!(COMPONENTS_GENERATED_TOTAL, LABEL_ENGINE => ENGINE_OTEL)
        .increment(count as u64);
    debug!(
        receiver_pipelines = receiver_pipelines.len(),
        pipelines = pipelines.len(),
        "otel pipelines generated"
    );

    Ok(otel::ModularConfig {
        log_level: section.log_level.clone(),
        receiver_pipelines,
        pipelines,
        exporter: otel::Component::new("googlecloud", json!({ "user_agent": USER_AGENT })),
        resource_detector: Some(gcp_resource_detector(true)),
    })
}
