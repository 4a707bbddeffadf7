//! 디스크의 사용자 설정에서 생성 파일까지 이어지는 통합 테스트

use opsconf_apps::{UnifiedConfig, build_registries, generate};
use opsconf_core::config::OpsconfConfig;
use opsconf_core::context::GenContext;
use opsconf_core::error::{ConfigError, OpsconfError};
use opsconf_core::types::Platform;

const USER_CONFIG: &str = r#"
logging:
  receivers:
    kafka_logs:
      type: kafka
    slow:
      type: mysql_slow
      include_paths: [/var/log/mysql/slow.log]
  processors:
    tag_env:
      type: modify_fields
      fields:
        labels.env:
          static_value: prod
  service:
    log_level: warn
    pipelines:
      main:
        receivers: [kafka_logs, slow]
        processors: [tag_env]
metrics:
  receivers:
    cache:
      type: redis
      collection_interval: 30s
  processors:
    drop_processes:
      type: exclude_metrics
      metrics_pattern: [agent.googleapis.com/processes/*]
  service:
    pipelines:
      infra:
        receivers: [cache]
        processors: [drop_processes]
"#;

fn linux() -> GenContext {
    GenContext::default().with_platform(Platform::Linux)
}

#[tokio::test]
async fn config_on_disk_is_generated_into_output_dir() {
    let input = tempfile::tempdir().unwrap();
    let path = input.path().join("config.yaml");
    tokio::fs::write(&path, USER_CONFIG).await.unwrap();

    let registries = build_registries().unwrap();
    let ctx = linux();
    let resolved = UnifiedConfig::load(&path)
        .await
        .unwrap()
        .resolve(&registries, &ctx)
        .unwrap();
    let settings = OpsconfConfig::default();
    let generated = generate(&resolved, &settings, &ctx).unwrap();

    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("nested").join("out");
    let written = generated.write_to(&out_dir).await.unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&settings.output.fluent_bit_main));
    assert!(names.contains(&settings.output.fluent_bit_parser));
    assert!(names.contains(&settings.output.otel));
    let mut sorted = written.clone();
    sorted.sort();
    assert_eq!(written, sorted);

    let main = tokio::fs::read_to_string(out_dir.join(&settings.output.fluent_bit_main))
        .await
        .unwrap();
    assert!(main.contains("main.kafka_logs"));
    assert!(main.contains("main.slow"));
    assert!(main.contains("/var/log/mysql/slow.log"));
    assert!(main.contains("Log_Level"));
    assert!(main.contains("stackdriver"));
    // 멀티라인 규칙은 INPUT에 직접 붙습니다
    let parser = tokio::fs::read_to_string(out_dir.join(&settings.output.fluent_bit_parser))
        .await
        .unwrap();
    assert!(parser.contains("[MULTILINE_PARSER]"));
    assert!(parser.contains("start_state"));

    let otel = tokio::fs::read_to_string(out_dir.join(&settings.output.otel))
        .await
        .unwrap();
    assert!(otel.contains("redis/cache"));
    assert!(otel.contains("metrics/infra_cache"));
    assert!(otel.contains("googlecloud"));
    assert!(otel.contains("processes/.*"));
}

#[tokio::test]
async fn missing_config_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = UnifiedConfig::load(&path).await.unwrap_err();
    match err {
        OpsconfError::Config(ConfigError::FileNotFound { path: reported }) => {
            assert!(reported.ends_with("absent.yaml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_config_file_generates_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    tokio::fs::write(&path, "").await.unwrap();

    let registries = build_registries().unwrap();
    let ctx = linux();
    let resolved = UnifiedConfig::load(&path)
        .await
        .unwrap()
        .resolve(&registries, &ctx)
        .unwrap();
    let generated = generate(&resolved, &OpsconfConfig::default(), &ctx).unwrap();

    let main = &generated.fluent_bit[&OpsconfConfig::default().output.fluent_bit_main];
    assert!(main.contains("[SERVICE]"));
    assert!(main.contains("[OUTPUT]"));
    assert!(!main.contains("[INPUT]"));
    // 파이프라인이 없으면 exporter도 나오지 않습니다
    assert!(generated.otel.contains("telemetry"));
    assert!(!generated.otel.contains("googlecloud"));
}

#[test]
fn generation_is_stable_across_registry_builds() {
    let ctx = linux();
    let run = || {
        let registries = build_registries().unwrap();
        let resolved = UnifiedConfig::parse(USER_CONFIG)
            .unwrap()
            .resolve(&registries, &ctx)
            .unwrap();
        generate(&resolved, &OpsconfConfig::default(), &ctx).unwrap()
    };
    assert_eq!(run(), run());
}
