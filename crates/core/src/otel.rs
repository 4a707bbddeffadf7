//! OpenTelemetry collector 설정 모델
//!
//! 메트릭 디스크립터는 [`ReceiverPipeline`]을 만들고, 사용자 파이프라인마다
//! [`Pipeline`]이 이를 참조합니다. [`ModularConfig::generate`]는 두 목록을
//! collector YAML 한 문서로 렌더링합니다.
//!
//! # 이름 규칙
//! - 리시버: `<type>/<receiver_pipeline_name>`
//! - 리시버 프로세서: `<type>/<receiver_pipeline_name>_<index>`
//! - 파이프라인 프로세서: `<type>/<prefix>_<index>`
//! - 파이프라인: `<signal>/<prefix>`
//!
//! 컴포넌트 설정은 `serde_json::Value`로 보관합니다. 맵 키는 정렬된 순서로
//! 직렬화되므로 출력이 결정적입니다.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::error::{OpsconfError, RenderError};

/// 에이전트 자체 메트릭 포트
pub const METRICS_PORT: u16 = 20201;

/// 메트릭 시그널 이름
pub const SIGNAL_METRICS: &str = "metrics";

/// collector 컴포넌트 하나 (리시버, 프로세서, 익스포터)
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// collector 컴포넌트 타입 (예: `"jmx"`, `"metricstransform"`)
    pub type_name: String,
    pub config: Value,
}

impl Component {
    pub fn new(type_name: impl Into<String>, config: Value) -> Self {
        Self {
            type_name: type_name.into(),
            config,
        }
    }

    /// `type` 또는 `type/suffix`
    pub fn name(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}/{}", self.type_name, suffix)
        }
    }
}

/// 리시버 하나와 그 뒤에 반드시 붙는 프로세서 목록
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverPipeline {
    pub receiver: Component,
    /// 시그널별 프로세서. 키가 없으면 그 시그널에는 사용되지 않습니다.
    pub processors: BTreeMap<String, Vec<Component>>,
}

impl ReceiverPipeline {
    /// 메트릭 전용 리시버 파이프라인
    pub fn metrics(receiver: Component, processors: Vec<Component>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(SIGNAL_METRICS.to_owned(), processors);
        Self {
            receiver,
            processors: map,
        }
    }
}

/// 리시버 파이프라인을 소비하는 파이프라인
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub signal: String,
    pub receiver_pipeline_name: String,
    pub processors: Vec<Component>,
}

/// collector 전체 설정
#[derive(Debug, Clone)]
pub struct ModularConfig {
    pub log_level: String,
    pub receiver_pipelines: BTreeMap<String, ReceiverPipeline>,
    /// 파이프라인 prefix → 파이프라인
    pub pipelines: BTreeMap<String, Pipeline>,
    pub exporter: Component,
    /// 모든 파이프라인 끝에 붙는 리소스 감지 프로세서
    pub resource_detector: Option<Component>,
}

impl ModularConfig {
    /// collector YAML을 생성합니다.
    pub fn generate(&self) -> Result<String, OpsconfError> {
        let mut receivers = Map::new();
        let mut processors = Map::new();
        let mut exporters = Map::new();
        let mut pipelines = Map::new();

        let exporter_name = self.exporter.name("");
        let detector_name = self
            .resource_detector
            .as_ref()
            .map(|d| d.name("_global_0"));

        for (prefix, pipeline) in &self.pipelines {
            let Some(rp) = self.receiver_pipelines.get(&pipeline.receiver_pipeline_name) else {
                continue;
            };
            let Some(rp_processors) = rp.processors.get(&pipeline.signal) else {
                // 이 리시버 파이프라인은 해당 시그널용이 아님
                continue;
            };

            let receiver_name = rp.receiver.name(&pipeline.receiver_pipeline_name);
            receivers.insert(receiver_name.clone(), rp.receiver.config.clone());

            let mut names = Vec::new();
            for (i, p) in rp_processors.iter().enumerate() {
                let name = p.name(&format!("{}_{}", pipeline.receiver_pipeline_name, i));
                processors.insert(name.clone(), p.config.clone());
                names.push(name);
            }
            for (i, p) in pipeline.processors.iter().enumerate() {
                let name = p.name(&format!("{prefix}_{i}"));
                processors.insert(name.clone(), p.config.clone());
                names.push(name);
            }
            if let (Some(detector), Some(name)) = (&self.resource_detector, &detector_name) {
                processors.insert(name.clone(), detector.config.clone());
                names.push(name.clone());
            }

            exporters.insert(exporter_name.clone(), self.exporter.config.clone());
            pipelines.insert(
                format!("{}/{}", pipeline.signal, prefix),
                json!({
                    "receivers": [receiver_name],
                    "processors": names,
                    "exporters": [exporter_name],
                }),
            );
        }

        let mut telemetry = Map::new();
        telemetry.insert(
            "metrics".to_owned(),
            json!({
                "readers": [{
                    "pull": {
                        "exporter": {
                            "prometheus": {
                                "host": "0.0.0.0",
                                "port": METRICS_PORT,
                                "without_scope_info": true,
                                "without_type_suffix": true,
                                "without_units": true,
                            }
                        }
                    }
                }]
            }),
        );
        if self.log_level != "info" {
            telemetry.insert("logs".to_owned(), json!({ "level": self.log_level }));
        }

        let doc = json!({
            "receivers": receivers,
            "processors": processors,
            "exporters": exporters,
            "service": {
                "pipelines": pipelines,
                "telemetry": telemetry,
            },
        });

        serde_yaml::to_string(&doc).map_err(|e| {
            RenderError::Serialize {
                what: "otel config".to_owned(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
