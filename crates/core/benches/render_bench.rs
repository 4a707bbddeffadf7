//! 출력 렌더링 벤치마크
//!
//! fluent-bit 섹션 렌더링과 OTel YAML 생성 성능을 측정합니다.

use std::collections::BTreeMap;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use opsconf_core::fluentbit::{self, Component, Kind, ModularConfig};
use opsconf_core::otel;
use serde_json::json;

fn fluent_bit_config(receivers: usize) -> ModularConfig {
    let mut cfg = ModularConfig::default();
    cfg.variables
        .insert("buffers_dir".to_owned(), "/var/lib/opsconf/buffers".to_owned());
    for i in 0..receivers {
        let tag = format!("default_pipeline.receiver_{i}");
        cfg.components.push(
            Component::new(Kind::Input)
                .with("Name", "tail")
                .with("Tag", tag.clone())
                .with("Path", "/var/log/app/*.log")
                .with("DB", fluentbit::db_path(&tag)),
        );
        cfg.components.push(
            Component::new(Kind::MultilineParser)
                .with("name", format!("multiline.{tag}"))
                .with("type", "regex")
                .with_ordered("rule", "\"start_state\" \"^\\d{4}\" \"cont\"")
                .with_ordered("rule", "\"cont\" \"^(?!\\d{4})\" \"cont\""),
        );
        cfg.components
            .push(fluentbit::lua_filter(&tag, "process", "return 2, timestamp, record"));
    }
    cfg
}

fn otel_config(receivers: usize) -> otel::ModularConfig {
    let mut receiver_pipelines = BTreeMap::new();
    let mut pipelines = BTreeMap::new();
    for i in 0..receivers {
        let name = format!("receiver_{i}");
        receiver_pipelines.insert(
            name.clone(),
            otel::ReceiverPipeline::metrics(
                otel::Component::new("jmx", json!({ "endpoint": "localhost:9999" })),
                vec![otel::Component::new("normalizesums", json!({}))],
            ),
        );
        pipelines.insert(
            format!("default_pipeline_{name}"),
            otel::Pipeline {
                signal: otel::SIGNAL_METRICS.to_owned(),
                receiver_pipeline_name: name,
                processors: Vec::new(),
            },
        );
    }
    otel::ModularConfig {
        log_level: "info".to_owned(),
        receiver_pipelines,
        pipelines,
        exporter: otel::Component::new("googlecloud", json!({})),
        resource_detector: None,
    }
}

fn bench_fluent_bit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fluent_bit_generate");
    for n in [1usize, 20] {
        let cfg = fluent_bit_config(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("receivers_{n}"), |b| {
            b.iter(|| {
                cfg.generate(black_box("main.conf"), black_box("parser.conf"))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_otel(c: &mut Criterion) {
    let mut group = c.benchmark_group("otel_generate");
    for n in [1usize, 20] {
        let cfg = otel_config(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("receivers_{n}"), |b| {
            b.iter(|| black_box(&cfg).generate().unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fluent_bit, bench_otel);
criterion_main!(benches);
