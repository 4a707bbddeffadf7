//! Aerospike

use serde::Deserialize;
use serde_json::json;

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{Secret, parse_duration};
use opsconf_metrics::processors::{
    flatten_resource_attribute, modify_instrumentation_scope, normalize_sums,
    transformation_metrics,
};
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, SharedCluster};

use super::{
    ProductMetrics, Registries, register_metrics, validate_credentials, validate_endpoint,
    workload_prefix,
};

const TYPE: &str = "aerospike";
const DEFAULT_ENDPOINT: &str = "localhost:3000";
const DEFAULT_TIMEOUT: &str = "20s";

#[derive(Debug, Clone, Deserialize)]
struct Aerospike {
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(flatten)]
    cluster: SharedCluster,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
    #[serde(default)]
    timeout: Option<String>,
}

impl ProductMetrics for Aerospike {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        ReceiverShared::FIELDS,
        SharedCluster::FIELDS,
        &["endpoint", "username", "password", "timeout"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())?;
        validate_credentials(self.username.as_deref(), &self.password)?;
        if let Some(timeout) = &self.timeout {
            parse_duration(timeout).map_err(|e| MetricsError::parameter("timeout", e.to_string()))?;
        }
        Ok(())
    }
}

impl MetricsReceiver for Aerospike {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        // 에이전트가 노드마다 돌기 때문에 클러스터 메트릭은 기본으로 끕니다.
        let collect_cluster = self.cluster.collect_cluster_metrics.unwrap_or(false);

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(
                TYPE,
                json!({
                    "collection_interval": self.shared.collection_interval_string(),
                    "endpoint": endpoint,
                    "collect_cluster_metrics": collect_cluster,
                    "username": self.username.as_deref().unwrap_or_default(),
                    "password": self.password.expose(),
                    "timeout": self.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT),
                }),
            ),
            vec![
                normalize_sums(),
                workload_prefix(),
                transformation_metrics([
                    flatten_resource_attribute("aerospike.node.name", "node_name"),
                    flatten_resource_attribute("aerospike.namespace", "namespace_name"),
                ]),
                modify_instrumentation_scope(TYPE, "1.0"),
            ],
        )])
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Aerospike>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_metrics::shared::parse_strict;

    #[test]
    fn cluster_metrics_off_by_default() {
        let r: Aerospike = parse_strict(serde_yaml::Value::Null, Aerospike::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["collect_cluster_metrics"], false);
        assert_eq!(config["endpoint"], DEFAULT_ENDPOINT);
        assert_eq!(config["timeout"], DEFAULT_TIMEOUT);
    }

    #[test]
    fn resource_attributes_flattened_before_scope() {
        let r: Aerospike = parse_strict(serde_yaml::Value::Null, Aerospike::FIELDS).unwrap();
        let pipelines = r.pipelines(&GenContext::default()).unwrap();
        let processors = &pipelines[0].processors["metrics"];
        assert_eq!(processors[2].type_name, "transform");
        assert_eq!(processors[3].type_name, "modifyscope");
        assert_eq!(
            processors[3].config["override_scope_name"],
            "agent.googleapis.com/aerospike"
        );
    }

    #[test]
    fn bad_timeout_rejected() {
        let body = serde_yaml::from_str("timeout: soon").unwrap();
        let r: Aerospike = parse_strict(body, Aerospike::FIELDS).unwrap();
        assert!(r.validate().is_err());
    }
}
