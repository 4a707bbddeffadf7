//! MongoDB

use serde::Deserialize;
use serde_json::{Map, Value, json};

use opsconf_core::context::GenContext;
use opsconf_core::error::OpsconfError;
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{FieldType, Secret, Severity};
use opsconf_logging::{LoggingError, ModifyField, ModifyFields, ParseJson, ParserShared, SeverityTable};
use opsconf_metrics::processors::normalize_sums;
use opsconf_metrics::{MetricsError, MetricsReceiver, ReceiverShared, SharedTls};

use super::{
    FilesProduct, ProductMetrics, ProductProcessor, Registries, register_files_product,
    register_metrics, scope, severity_fields, validate_credentials, validate_endpoint,
    workload_prefix,
};

const TYPE: &str = "mongodb";
const DEFAULT_ENDPOINT: &str = "localhost:27017";

#[derive(Debug, Clone, Deserialize)]
struct Mongodb {
    #[serde(flatten)]
    tls: SharedTls,
    #[serde(flatten)]
    shared: ReceiverShared,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Secret,
}

impl ProductMetrics for Mongodb {
    const TYPE: &'static str = TYPE;
    const FIELDS: &'static [&'static [&'static str]] = &[
        SharedTls::FIELDS,
        ReceiverShared::FIELDS,
        &["endpoint", "username", "password"],
    ];

    fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        self.tls.validate()?;
        validate_endpoint("endpoint", self.endpoint.as_deref())?;
        validate_credentials(self.username.as_deref(), &self.password)
    }
}

impl MetricsReceiver for Mongodb {
    fn pipelines(&self, _ctx: &GenContext) -> Result<Vec<ReceiverPipeline>, MetricsError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT);
        let transport = if endpoint.ends_with(".sock") { "unix" } else { "tcp" };

        let mut config = Map::new();
        config.insert(
            "hosts".to_owned(),
            json!([{ "endpoint": endpoint, "transport": transport }]),
        );
        config.insert(
            "username".to_owned(),
            json!(self.username.as_deref().unwrap_or_default()),
        );
        config.insert("password".to_owned(), json!(self.password.expose()));
        config.insert(
            "collection_interval".to_owned(),
            json!(self.shared.collection_interval_string()),
        );
        // 유닉스 소켓에는 TLS를 붙이지 않습니다.
        if transport != "unix" {
            config.insert("tls".to_owned(), self.tls.tls_config(false));
        }

        Ok(vec![ReceiverPipeline::metrics(
            Component::new(TYPE, Value::Object(config)),
            vec![normalize_sums(), workload_prefix(), scope(TYPE)],
        )])
    }
}

// ─── 로그 ────────────────────────────────────────────────────────────

// {"t":{"$date":"2022-01-10T18:08:16.392+00:00"},"s":"I","c":"NETWORK","id":22943,"ctx":"listener","msg":"Connection accepted"}
struct MongodbLogs;

impl FilesProduct for MongodbLogs {
    const TYPE: &'static str = TYPE;
    const DEFAULT_PATHS: &'static [&'static str] = &["/var/log/mongodb/mongod.log*"];

    fn processor() -> Result<ProductProcessor, LoggingError> {
        let parse = ParseJson {
            field: None,
            shared: ParserShared::new("time", "%Y-%m-%dT%H:%M:%S.%L%z")
                .with_type("id", FieldType::Integer)
                .with_type("message", FieldType::String),
        };
        // 속성 안의 메시지가 있으면 본문 메시지로 씁니다.
        let attr_message = ModifyFields::new()
            .field("jsonPayload.msg", ModifyField::move_from("jsonPayload.attr.message"))
            .build()?;
        let renames = ModifyFields::new()
            .field("jsonPayload.component", ModifyField::move_from("jsonPayload.c"))
            .field("jsonPayload.context", ModifyField::move_from("jsonPayload.ctx"))
            .field("jsonPayload.message", ModifyField::move_from("jsonPayload.msg"))
            .build()?;
        let severity = SeverityTable::new(
            "s",
            &[
                ("D", Severity::Debug),
                ("D1", Severity::Debug),
                ("D2", Severity::Debug),
                ("D3", Severity::Debug),
                ("D4", Severity::Debug),
                ("D5", Severity::Debug),
                ("I", Severity::Info),
                ("E", Severity::Error),
                ("F", Severity::Fatal),
                ("W", Severity::Warning),
            ],
            true,
        );
        let severity = severity_fields(Self::TYPE, severity)
            .field("jsonPayload.severity", ModifyField::move_from("jsonPayload.s"))
            .build()?;
        Ok(ProductProcessor::new(parse)
            .then(attr_message)
            .then(renames)
            .then(severity))
    }
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    register_metrics::<Mongodb>(registries)?;
    register_files_product::<MongodbLogs>(registries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_logging::LoggingProcessor;
    use opsconf_metrics::shared::parse_strict;

    fn receiver(body: &str) -> Mongodb {
        let body = if body.is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(body).unwrap()
        };
        parse_strict(body, Mongodb::FIELDS).unwrap()
    }

    #[test]
    fn tcp_host_gets_tls_block() {
        let pipelines = receiver("").pipelines(&GenContext::default()).unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["hosts"][0]["endpoint"], DEFAULT_ENDPOINT);
        assert_eq!(config["hosts"][0]["transport"], "tcp");
        assert_eq!(config["tls"]["insecure"], false);
    }

    #[test]
    fn socket_endpoint_skips_tls() {
        let pipelines = receiver("endpoint: /tmp/mongodb-27017.sock")
            .pipelines(&GenContext::default())
            .unwrap();
        let config = &pipelines[0].receiver.config;
        assert_eq!(config["hosts"][0]["transport"], "unix");
        assert!(config.get("tls").is_none());
    }

    #[test]
    fn severity_letter_moves_and_maps() {
        let p = MongodbLogs::processor().unwrap();
        let table = p.inspect().severity.unwrap();
        assert_eq!(table.lookup("D3"), Some(Severity::Debug));
        assert_eq!(table.lookup("F"), Some(Severity::Fatal));

        let c = p.components(&GenContext::default(), "p.mongodb", "mongodb");
        // JSON 파서 2 + 수정 단계 3
        assert_eq!(c.len(), 5);
        let script = &c[4].script.as_ref().unwrap().contents;
        assert!(script.contains("\"s\""));
        assert!(script.contains("\"severity\""));
    }
}
