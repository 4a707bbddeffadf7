//! 리시버 공유 설정 조각
//!
//! 여러 제품 리시버가 같은 필드 묶음(수집 주기, TLS, JVM, JVM 메트릭 수집,
//! 클러스터 메트릭 수집)을 공유합니다. 각 묶음은 이름 있는 구조체이며 제품
//! 리시버는 `#[serde(flatten)]`으로 끼워 넣고 접근자로 값을 읽습니다.
//!
//! `flatten`은 `deny_unknown_fields`와 함께 쓸 수 없으므로, 허용 필드 목록은
//! 각 조각의 `FIELDS` 상수로 모아 [`parse_strict`]에서 검사합니다.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::warn;

use opsconf_core::context::JMX_JAR_NAME;
use opsconf_core::metrics::{DEGRADED_RESOURCES_TOTAL, LABEL_RESOURCE, RESOURCE_JMX_JAR};
use opsconf_core::otel::{Component, ReceiverPipeline};
use opsconf_core::types::{Platform, Secret, parse_duration};

use crate::error::MetricsError;

/// 기본 수집 주기
pub const DEFAULT_COLLECTION_INTERVAL: &str = "60s";

/// 허용되는 최소 수집 주기
pub const MIN_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// 허용 필드 목록을 검사한 뒤 본문을 역직렬화합니다.
pub fn parse_strict<T: DeserializeOwned>(
    body: serde_yaml::Value,
    fields: &[&[&str]],
) -> Result<T, MetricsError> {
    let body = match body {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    };
    if let serde_yaml::Value::Mapping(map) = &body {
        for key in map.keys() {
            let name = key.as_str().unwrap_or("<non-string key>");
            if !fields.iter().any(|set| set.contains(&name)) {
                return Err(MetricsError::parameter(name, "unknown field"));
            }
        }
    }
    Ok(serde_yaml::from_value(body)?)
}

// ─── 수집 주기 ──────────────────────────────────────────────────────

/// 모든 메트릭 리시버가 공유하는 필드
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReceiverShared {
    #[serde(default)]
    pub collection_interval: Option<String>,
}

impl ReceiverShared {
    pub const FIELDS: &'static [&'static str] = &["collection_interval"];

    /// 설정된 값 또는 `"60s"`
    pub fn collection_interval_string(&self) -> String {
        self.collection_interval
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLECTION_INTERVAL.to_owned())
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        let Some(interval) = &self.collection_interval else {
            return Ok(());
        };
        let parsed = parse_duration(interval)
            .map_err(|e| MetricsError::parameter("collection_interval", e.to_string()))?;
        if parsed < MIN_COLLECTION_INTERVAL {
            return Err(MetricsError::parameter(
                "collection_interval",
                format!("{interval:?} is below the minimum of 10s"),
            ));
        }
        Ok(())
    }
}

// ─── TLS ────────────────────────────────────────────────────────────

/// TLS 클라이언트 설정
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SharedTls {
    #[serde(default)]
    pub insecure: Option<bool>,
    #[serde(default)]
    pub insecure_skip_verify: Option<bool>,
    #[serde(default)]
    pub cert_file: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub ca_file: Option<String>,
}

/// `insecure: true`와 함께 쓸 수 없는 TLS 필드
const TLS_SECURE_ONLY_FIELDS: [&str; 4] = ["insecure_skip_verify", "cert_file", "ca_file", "key_file"];

impl SharedTls {
    pub const FIELDS: &'static [&'static str] =
        &["insecure", "insecure_skip_verify", "cert_file", "key_file", "ca_file"];

    /// collector `tls` 설정. `insecure`가 없으면 `default_insecure`를 씁니다.
    pub fn tls_config(&self, default_insecure: bool) -> Value {
        let mut tls = Map::new();
        tls.insert(
            "insecure".to_owned(),
            json!(self.insecure.unwrap_or(default_insecure)),
        );
        if let Some(skip) = self.insecure_skip_verify {
            tls.insert("insecure_skip_verify".to_owned(), json!(skip));
        }
        for (key, value) in [
            ("cert_file", &self.cert_file),
            ("ca_file", &self.ca_file),
            ("key_file", &self.key_file),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                tls.insert(key.to_owned(), json!(v));
            }
        }
        Value::Object(tls)
    }

    /// `cert_file`과 `key_file`은 함께 지정해야 합니다.
    pub fn validate(&self) -> Result<(), MetricsError> {
        let cert = self.cert_file.as_deref().is_some_and(|v| !v.is_empty());
        let key = self.key_file.as_deref().is_some_and(|v| !v.is_empty());
        match (cert, key) {
            (true, false) => Err(MetricsError::parameter("key_file", "required with cert_file")),
            (false, true) => Err(MetricsError::parameter("cert_file", "required with key_file")),
            _ => Ok(()),
        }
    }
}

/// 생성된 `tls` 설정에서 `insecure: true`와 충돌하는 필드 이름
pub fn tls_conflicts(tls: &Value) -> Vec<&'static str> {
    if tls.get("insecure") != Some(&Value::Bool(true)) {
        return Vec::new();
    }
    TLS_SECURE_ONLY_FIELDS
        .into_iter()
        .filter(|field| match tls.get(*field) {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        })
        .collect()
}

// ─── JVM ────────────────────────────────────────────────────────────

/// JMX 기반 리시버 공통 필드
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SharedJvm {
    #[serde(flatten)]
    pub shared: ReceiverShared,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Secret,
    #[serde(default)]
    pub additional_jars: Vec<String>,
}

/// JMX 서비스 URL 접두어
const JMX_SERVICE_PREFIX: &str = "service:jmx:";

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

impl SharedJvm {
    pub const FIELDS: &'static [&'static str] = &[
        "collection_interval",
        "endpoint",
        "username",
        "password",
        "additional_jars",
    ];

    /// 엔드포인트가 비어 있으면 기본값으로 채웁니다.
    pub fn with_default_endpoint(mut self, endpoint: &str) -> Self {
        if self.endpoint.as_deref().is_none_or(str::is_empty) {
            self.endpoint = Some(endpoint.to_owned());
        }
        self
    }

    /// 추가 jar가 없으면 기본 목록으로 채웁니다.
    pub fn with_default_additional_jars(mut self, jars: &[&str]) -> Self {
        if self.additional_jars.is_empty() {
            self.additional_jars = jars.iter().map(|j| (*j).to_owned()).collect();
        }
        self
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        self.shared.validate()?;
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with(JMX_SERVICE_PREFIX) && !is_host_port(endpoint) {
                return Err(MetricsError::parameter(
                    "endpoint",
                    format!("{endpoint:?} must be host:port or start with \"service:jmx:\""),
                ));
            }
        }
        let has_user = self.username.as_deref().is_some_and(|u| !u.is_empty());
        match (has_user, self.password.is_empty()) {
            (true, true) => Err(MetricsError::parameter("password", "required with username")),
            (false, false) => Err(MetricsError::parameter("username", "required with password")),
            _ => Ok(()),
        }
    }

    /// JMX 서비스 URL 형태의 엔드포인트
    ///
    /// `host:port`는 `service:jmx:rmi:///jndi/rmi://host:port/jmxrmi`가 됩니다.
    pub fn jmx_endpoint(&self) -> String {
        let endpoint = self.endpoint.as_deref().unwrap_or_default();
        if endpoint.starts_with(JMX_SERVICE_PREFIX) {
            endpoint.to_owned()
        } else {
            format!("service:jmx:rmi:///jndi/rmi://{endpoint}/jmxrmi")
        }
    }

    /// `jmx` 리시버 하나와 주어진 프로세서로 리시버 파이프라인을 만듭니다.
    pub fn configure_pipelines(
        &self,
        target_system: &str,
        processors: Vec<Component>,
        jar_path: &str,
    ) -> Vec<ReceiverPipeline> {
        let mut config = Map::new();
        config.insert("target_system".to_owned(), json!(target_system));
        config.insert(
            "collection_interval".to_owned(),
            json!(self.shared.collection_interval_string()),
        );
        config.insert("endpoint".to_owned(), json!(self.jmx_endpoint()));
        config.insert("jar_path".to_owned(), json!(jar_path));
        if !self.additional_jars.is_empty() {
            config.insert("additional_jars".to_owned(), json!(self.additional_jars));
        }
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            config.insert("username".to_owned(), json!(username));
        }
        if !self.password.is_empty() {
            config.insert("password".to_owned(), json!(self.password.expose()));
        }

        vec![ReceiverPipeline::metrics(
            Component::new("jmx", Value::Object(config)),
            processors,
        )]
    }
}

/// JVM 메트릭을 함께 수집할지 여부 (기본 true)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SharedCollectJvm {
    #[serde(default)]
    pub collect_jvm_metrics: Option<bool>,
}

impl SharedCollectJvm {
    pub const FIELDS: &'static [&'static str] = &["collect_jvm_metrics"];

    pub fn should_collect_jvm_metrics(&self) -> bool {
        self.collect_jvm_metrics.unwrap_or(true)
    }

    /// 수집 대상이면 `<target>,jvm`
    pub fn target_system_string(&self, target_system: &str) -> String {
        if self.should_collect_jvm_metrics() {
            format!("{target_system},jvm")
        } else {
            target_system.to_owned()
        }
    }
}

/// 클러스터 메트릭을 수집할지 여부 (기본 true)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SharedCluster {
    #[serde(default)]
    pub collect_cluster_metrics: Option<bool>,
}

impl SharedCluster {
    pub const FIELDS: &'static [&'static str] = &["collect_cluster_metrics"];

    pub fn should_collect_cluster_metrics(&self) -> bool {
        self.collect_cluster_metrics.unwrap_or(true)
    }
}

// ─── 리시버 세대 ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum VersionValue {
    Number(u64),
    Text(String),
}

/// 같은 제품의 수집 방식 세대 (`receiver_version`, 기본 1)
///
/// 숫자와 문자열 둘 다 받습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SharedVersion {
    #[serde(default)]
    receiver_version: Option<VersionValue>,
}

impl SharedVersion {
    pub const FIELDS: &'static [&'static str] = &["receiver_version"];

    fn parsed(&self) -> Option<u64> {
        match &self.receiver_version {
            None => Some(1),
            Some(VersionValue::Number(n)) => Some(*n),
            Some(VersionValue::Text(t)) => t.trim().parse().ok(),
        }
    }

    /// 1부터 `latest`까지만 허용합니다.
    pub fn validate(&self, latest: u64) -> Result<(), MetricsError> {
        match self.parsed() {
            Some(v) if (1..=latest).contains(&v) => Ok(()),
            _ => Err(MetricsError::parameter(
                "receiver_version",
                format!("must be between 1 and {latest}"),
            )),
        }
    }

    /// 검증된 세대 번호. 검증 전에 읽으면 잘못된 값은 1로 봅니다.
    pub fn version(&self) -> u64 {
        self.parsed().unwrap_or(1)
    }
}

// ─── jar 위치 ───────────────────────────────────────────────────────

/// JMX 메트릭 jar 경로 탐색기
///
/// 설정의 경로가 있으면 그대로 쓰고, 없으면 실행 파일 위치를 기준으로
/// 계산합니다. 실행 파일 위치를 알 수 없으면 경고를 남기고 jar 파일 이름만
/// 반환합니다.
#[derive(Debug, Clone)]
pub struct JarLocator {
    override_path: Option<String>,
    platform: Platform,
}

impl JarLocator {
    pub fn new(override_path: Option<String>, platform: Platform) -> Self {
        Self {
            override_path,
            platform,
        }
    }

    pub fn locate(&self) -> String {
        if let Some(path) = &self.override_path {
            return path.clone();
        }
        self.locate_from(std::env::current_exe())
    }

    /// 실행 파일 경로 조회 결과로부터 jar 경로를 계산합니다.
    pub fn locate_from(&self, exe: io::Result<PathBuf>) -> String {
        let dir = match &exe {
            Ok(path) => path.parent().map(Path::to_path_buf),
            Err(e) => {
                warn!(error = %e, "could not determine binary path for jvm receiver");
                None
            }
        };
        let Some(dir) = dir else {
            metrics::counter!(DEGRADED_RESOURCES_TOTAL, LABEL_RESOURCE => RESOURCE_JMX_JAR)
                .increment(1);
            warn!(jar = JMX_JAR_NAME, "falling back to bare jmx metrics jar name");
            return JMX_JAR_NAME.to_owned();
        };
        let path = match self.platform {
            Platform::Windows => dir.join(JMX_JAR_NAME),
            Platform::Linux => dir
                .join("../subagents/opentelemetry-collector")
                .join(JMX_JAR_NAME),
        };
        path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[derive(Debug, Deserialize)]
    struct Product {
        #[serde(flatten)]
        jvm: SharedJvm,
        #[serde(flatten)]
        collect_jvm: SharedCollectJvm,
    }

    fn product(s: &str) -> Result<Product, MetricsError> {
        parse_strict(yaml(s), &[SharedJvm::FIELDS, SharedCollectJvm::FIELDS])
    }

    #[test]
    fn parse_strict_rejects_unknown_fields() {
        let err = product("endpoint: localhost:7199\nbogus: 1").unwrap_err();
        assert_eq!(
            err,
            MetricsError::parameter("bogus", "unknown field")
        );
    }

    #[test]
    fn parse_strict_accepts_null_body() {
        let p = product("~").unwrap();
        assert!(p.jvm.endpoint.is_none());
        assert!(p.collect_jvm.should_collect_jvm_metrics());
    }

    #[test]
    fn flattened_fragments_share_one_mapping() {
        let p = product(
            "collection_interval: 30s\nendpoint: db:7199\nusername: u\npassword: p\ncollect_jvm_metrics: false",
        )
        .unwrap();
        assert_eq!(p.jvm.shared.collection_interval_string(), "30s");
        assert_eq!(p.jvm.password.expose(), "p");
        assert_eq!(p.collect_jvm.target_system_string("cassandra"), "cassandra");
        assert!(p.jvm.validate().is_ok());
    }

    #[test]
    fn collection_interval_default_and_minimum() {
        assert_eq!(ReceiverShared::default().collection_interval_string(), "60s");
        let short = ReceiverShared {
            collection_interval: Some("5s".to_owned()),
        };
        assert!(short.validate().is_err());
        let garbage = ReceiverShared {
            collection_interval: Some("soon".to_owned()),
        };
        assert!(garbage.validate().is_err());
        let ok = ReceiverShared {
            collection_interval: Some("1m".to_owned()),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn tls_config_uses_default_insecure() {
        let tls = SharedTls::default().tls_config(true);
        assert_eq!(tls, json!({ "insecure": true }));

        let tls = SharedTls {
            insecure: Some(false),
            cert_file: Some("/c.pem".to_owned()),
            key_file: Some("/k.pem".to_owned()),
            ..Default::default()
        };
        let v = tls.tls_config(true);
        assert_eq!(v["insecure"], false);
        assert_eq!(v["cert_file"], "/c.pem");
        assert!(v.get("ca_file").is_none());
        assert!(tls.validate().is_ok());
    }

    #[test]
    fn tls_cert_and_key_required_together() {
        let tls = SharedTls {
            cert_file: Some("/c.pem".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            tls.validate(),
            Err(MetricsError::parameter("key_file", "required with cert_file"))
        );
    }

    #[test]
    fn tls_conflicts_only_when_insecure() {
        let tls = SharedTls {
            ca_file: Some("/ca.pem".to_owned()),
            insecure_skip_verify: Some(false),
            ..Default::default()
        };
        assert_eq!(
            tls_conflicts(&tls.tls_config(true)),
            vec!["insecure_skip_verify", "ca_file"]
        );
        assert!(tls_conflicts(&tls.tls_config(false)).is_empty());
    }

    #[test]
    fn jvm_endpoint_rewrite() {
        let jvm = SharedJvm::default().with_default_endpoint("localhost:7199");
        assert_eq!(
            jvm.jmx_endpoint(),
            "service:jmx:rmi:///jndi/rmi://localhost:7199/jmxrmi"
        );

        let url = "service:jmx:rmi:///jndi/rmi://db:9010/jmxrmi";
        let jvm = SharedJvm {
            endpoint: Some(url.to_owned()),
            ..Default::default()
        }
        .with_default_endpoint("localhost:7199");
        assert_eq!(jvm.jmx_endpoint(), url);
        assert!(jvm.validate().is_ok());
    }

    #[test]
    fn jvm_validation() {
        let bad_endpoint = SharedJvm {
            endpoint: Some("not an endpoint".to_owned()),
            ..Default::default()
        };
        assert!(bad_endpoint.validate().is_err());

        let user_only = SharedJvm {
            username: Some("admin".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            user_only.validate(),
            Err(MetricsError::parameter("password", "required with username"))
        );
    }

    #[test]
    fn configure_pipelines_builds_jmx_receiver() {
        let jvm = SharedJvm {
            username: Some("u".to_owned()),
            password: Secret::new("p"),
            ..Default::default()
        }
        .with_default_endpoint("localhost:1099")
        .with_default_additional_jars(&["/opt/extra.jar"]);

        let pipelines = jvm.configure_pipelines("activemq,jvm", vec![], "/opt/jmx.jar");
        assert_eq!(pipelines.len(), 1);
        let receiver = &pipelines[0].receiver;
        assert_eq!(receiver.type_name, "jmx");
        assert_eq!(receiver.config["target_system"], "activemq,jvm");
        assert_eq!(receiver.config["collection_interval"], "60s");
        assert_eq!(receiver.config["jar_path"], "/opt/jmx.jar");
        assert_eq!(receiver.config["additional_jars"], json!(["/opt/extra.jar"]));
        assert_eq!(receiver.config["password"], "p");
        assert!(pipelines[0].processors.contains_key("metrics"));
    }

    #[test]
    fn configure_pipelines_omits_empty_credentials() {
        let pipelines = SharedJvm::default()
            .with_default_endpoint("localhost:9999")
            .configure_pipelines("jvm", vec![], "jmx.jar");
        let config = &pipelines[0].receiver.config;
        assert!(config.get("username").is_none());
        assert!(config.get("password").is_none());
        assert!(config.get("additional_jars").is_none());
    }

    #[test]
    fn cluster_default_true() {
        assert!(SharedCluster::default().should_collect_cluster_metrics());
        let off = SharedCluster {
            collect_cluster_metrics: Some(false),
        };
        assert!(!off.should_collect_cluster_metrics());
    }

    #[test]
    fn receiver_version_accepts_number_or_text() {
        let v: SharedVersion = serde_yaml::from_value(yaml("receiver_version: 2")).unwrap();
        assert!(v.validate(2).is_ok());
        assert_eq!(v.version(), 2);

        let v: SharedVersion = serde_yaml::from_value(yaml("receiver_version: \"2\"")).unwrap();
        assert_eq!(v.version(), 2);

        assert_eq!(SharedVersion::default().version(), 1);

        let v: SharedVersion = serde_yaml::from_value(yaml("receiver_version: 3")).unwrap();
        let err = v.validate(2).unwrap_err();
        assert!(err.to_string().contains("receiver_version"));
        let v: SharedVersion = serde_yaml::from_value(yaml("receiver_version: two")).unwrap();
        assert!(v.validate(2).is_err());
    }

    #[test]
    fn jar_locator_override_wins() {
        let locator = JarLocator::new(Some("/custom/jmx.jar".to_owned()), Platform::Linux);
        assert_eq!(locator.locate(), "/custom/jmx.jar");
    }

    #[test]
    fn jar_locator_relative_to_executable() {
        let linux = JarLocator::new(None, Platform::Linux);
        let path = linux.locate_from(Ok(PathBuf::from("/opt/agent/bin/opsconf")));
        assert_eq!(
            path,
            "/opt/agent/bin/../subagents/opentelemetry-collector/opentelemetry-java-contrib-jmx-metrics.jar"
        );

        let windows = JarLocator::new(None, Platform::Windows);
        let path = windows.locate_from(Ok(PathBuf::from("/opt/agent/bin/opsconf")));
        assert!(path.ends_with("bin/opentelemetry-java-contrib-jmx-metrics.jar"));
    }

    #[test]
    fn jar_locator_degrades_to_bare_name() {
        let locator = JarLocator::new(None, Platform::Linux);
        let path = locator.locate_from(Err(io::Error::other("no /proc")));
        assert_eq!(path, JMX_JAR_NAME);
    }
}
