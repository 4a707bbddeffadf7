//! 제품 카탈로그 통합 테스트
//!
//! - 모든 제품 컴포넌트가 빈 본문(또는 최소 본문)으로 만들어지는지
//! - 심각도 테이블이 선언된 모든 값에 대해 전체 함수인지
//! - 멀티라인 규칙 집합의 구조와 시작 줄 분류
//! - Cassandra 스택 트레이스 조립 시나리오

use opsconf_apps::{Registries, build_registries};
use opsconf_core::types::{Platform, SeverityPolicy};
use opsconf_logging::multiline::{START_STATE, assemble};
use opsconf_logging::{Assembler, LineClass, LoggingReceiver, Outcome};

/// 필수 설정이 있는 범용 컴포넌트
const GENERIC_TYPES: [&str; 7] = [
    "files",
    "windows_event_log",
    "parse_json",
    "parse_regex",
    "parse_multiline",
    "modify_fields",
    "exclude_metrics",
];

/// 빈 본문으로는 만들 수 없는 제품 컴포넌트의 최소 본문
const REQUIRED_BODIES: [(&str, &str); 4] = [
    ("couchbase", "username: admin\npassword: secret"),
    ("vault_audit", "include_paths: [/var/log/vault/audit.log]"),
    ("oracledb_alert", "oracle_home: /u01/app/oracle"),
    ("oracledb_audit", "oracle_home: /u01/app/oracle"),
];

fn registries() -> Registries {
    build_registries().expect("registries should build")
}

fn minimal_body(type_id: &str) -> serde_yaml::Value {
    REQUIRED_BODIES
        .iter()
        .find(|(t, _)| *t == type_id)
        .map_or(serde_yaml::Value::Null, |(_, body)| {
            serde_yaml::from_str(body).expect("valid body")
        })
}

fn product_receivers(r: &Registries) -> Vec<(String, Box<dyn LoggingReceiver>)> {
    r.logging_receivers
        .iter()
        .filter(|(type_id, filter)| {
            !GENERIC_TYPES.contains(type_id) && filter.allows(Platform::Linux)
        })
        .map(|(type_id, _)| {
            let receiver = r
                .logging_receivers
                .build(type_id, minimal_body(type_id), Platform::Linux)
                .unwrap_or_else(|e| panic!("{type_id}: {e}"));
            (type_id.to_owned(), receiver)
        })
        .collect()
}

// =============================================================================
// 빈 본문 빌드
// =============================================================================

#[test]
fn every_product_component_builds_with_empty_body() {
    let r = registries();

    for (type_id, filter) in r.logging_processors.iter() {
        if GENERIC_TYPES.contains(&type_id) || !filter.allows(Platform::Linux) {
            continue;
        }
        r.logging_processors
            .build(type_id, serde_yaml::Value::Null, Platform::Linux)
            .unwrap_or_else(|e| panic!("logging processor {type_id}: {e}"));
    }

    for (type_id, filter) in r.metrics_receivers.iter() {
        if !filter.allows(Platform::Linux) {
            continue;
        }
        r.metrics_receivers
            .build(type_id, minimal_body(type_id), Platform::Linux)
            .unwrap_or_else(|e| panic!("metrics receiver {type_id}: {e}"));
    }

    assert!(!product_receivers(&r).is_empty());
}

#[test]
fn path_less_products_require_include_paths() {
    let r = registries();
    for type_id in ["vault_audit", "oracledb_alert", "oracledb_audit"] {
        assert!(
            r.logging_receivers
                .build(type_id, serde_yaml::Value::Null, Platform::Linux)
                .is_err(),
            "{type_id}"
        );
    }
    assert!(
        r.metrics_receivers
            .build("couchbase", serde_yaml::Value::Null, Platform::Linux)
            .is_err()
    );
}

#[test]
fn windows_only_products_are_rejected_on_linux() {
    let r = registries();
    let err = r
        .logging_receivers
        .build(
            "active_directory_ds",
            serde_yaml::Value::Null,
            Platform::Linux,
        )
        .unwrap_err();
    assert!(err.to_string().contains("is not supported"));
    assert!(
        r.logging_receivers
            .build(
                "active_directory_ds",
                serde_yaml::Value::Null,
                Platform::Windows
            )
            .is_ok()
    );
}

#[test]
fn product_processor_rejects_unknown_fields() {
    let r = registries();
    let body: serde_yaml::Value = serde_yaml::from_str("unexpected: 1").unwrap();
    assert!(
        r.logging_processors
            .build("kafka", body, Platform::Linux)
            .is_err()
    );
}

// =============================================================================
// 심각도 테이블
// =============================================================================

#[test]
fn severity_tables_map_every_declared_value() {
    let r = registries();
    let policies = [
        SeverityPolicy::Declared,
        SeverityPolicy::Exclusive,
        SeverityPolicy::Passthrough,
    ];
    let mut checked = 0;

    for (type_id, receiver) in product_receivers(&r) {
        let inspect = receiver.inspect();
        let Some(table) = inspect.severity else {
            continue;
        };
        assert!(!table.entries.is_empty(), "{type_id}: empty table");
        for (value, _) in &table.entries {
            let expected = table.lookup(value).expect("declared value");
            for policy in policies {
                assert_eq!(
                    table.normalize(value, policy),
                    Outcome::Mapped(expected),
                    "{type_id}: {value} under {}",
                    policy.as_str()
                );
            }
            // 정규화된 값을 다시 넣어도 테이블은 결과를 냅니다
            let _ = table.normalize(expected.as_str(), SeverityPolicy::Declared);
        }
        checked += 1;
    }
    assert!(checked >= 10, "only {checked} tables checked");
}

#[test]
fn exclusive_policy_drops_unknown_values() {
    let r = registries();
    let receiver = r
        .logging_receivers
        .build("kafka", serde_yaml::Value::Null, Platform::Linux)
        .unwrap();
    let inspect = receiver.inspect();
    let table = inspect.severity.expect("kafka declares severities");
    assert_eq!(
        table.normalize("NOT-A-LEVEL", SeverityPolicy::Exclusive),
        Outcome::Dropped
    );
    assert_eq!(
        table.normalize("NOT-A-LEVEL", SeverityPolicy::Passthrough),
        Outcome::PassedThrough("NOT-A-LEVEL".to_owned())
    );
}

// =============================================================================
// 멀티라인 규칙
// =============================================================================

#[test]
fn multiline_rule_sets_are_well_formed() {
    let r = registries();
    let mut checked = 0;

    for (type_id, receiver) in product_receivers(&r) {
        let inspect = receiver.inspect();
        let Some(rules) = inspect.multiline else {
            continue;
        };
        assert!(
            rules.rules().iter().any(|rule| rule.state_name == START_STATE),
            "{type_id}: no start rule"
        );
        for rule in rules.rules() {
            assert!(
                rules.state_id(&rule.next_state).is_some(),
                "{type_id}: dangling state {}",
                rule.next_state
            );
        }
        checked += 1;
    }
    assert!(checked >= 10, "only {checked} rule sets checked");
}

#[test]
fn product_start_lines_open_new_records() {
    let samples = [
        (
            "cassandra_system",
            "INFO  [main] 2021-10-07 10:14:58,281 IndexSummaryManager.java:103 - Redistributing index summaries",
        ),
        (
            "cassandra_debug",
            "DEBUG [ScheduledTasks:1] 2021-10-07 10:15:03,617 MigrationCoordinator.java:264 - Pulling schema",
        ),
        (
            "cassandra_gc",
            "[2021-10-02T04:18:28.284+0000][3.315s] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
        ),
        (
            "couchdb",
            "[notice] 2021-12-02T23:36:42.555157Z nonode@nohost <0.17165.1> a5f585a0d3 localhost:5984 127.0.0.1 otelu PUT /oteld 201 ok 16",
        ),
        (
            "kafka",
            "[2022-02-01 21:34:21,230] INFO [ExpirationReaper-0-Produce]: Starting",
        ),
        (
            "mysql_general",
            "2021-10-12T01:12:37.733135Z        14 Query     select @@version_comment limit 1",
        ),
        ("mysql_slow", "# Time: 2021-10-12T01:13:38.132884Z"),
        (
            "postgresql_general",
            "2024-05-30 15:34:26.572 UTC postgres postgres [23958]STATEMENT:  INSERT INTO test2 (id) VALUES('1');",
        ),
        (
            "rabbitmq",
            "2022-01-31 18:01:20.441571+00:00 [erro] <0.692.0> ** Connection attempt rejected. **",
        ),
        (
            "solr_system",
            "2021-10-21 15:51:36.339 INFO  (qtp1-17) [   x:gettingstarted] o.a.s.c.S.Request [gettingstarted]  webapp=/solr path=/select status=0 QTime=0",
        ),
        (
            "tomcat_system",
            "06-Oct-2021 18:40:38.131 INFO [main] org.apache.catalina.startup.Catalina.start Server startup in [1234] milliseconds",
        ),
        (
            "wildfly_server",
            "2022-10-10 12:00:00,123 INFO  [org.jboss.as] (MSC service thread 1-2) WFLYSRV0049: WildFly starting",
        ),
        (
            "hadoop",
            "2022-02-01 18:09:47,136 INFO org.apache.hadoop.hdfs.server.namenode.NameNode: STARTUP_MSG:",
        ),
        (
            "hbase_system",
            "2022-01-27 14:49:37,473 INFO  [main] master.HMaster: STARTING service HMaster",
        ),
        (
            "flink",
            "2022-01-27 14:49:37,473 INFO  org.apache.flink.runtime.taskexecutor.TaskExecutor [] - Starting TaskExecutor",
        ),
        (
            "couchbase_general",
            "[ns_server:info,2022-03-23T14:34:40.451-07:00,ns_1@127.0.0.1:<0.331.0>:ns_server:init_logging:151]Started & configured logging",
        ),
        (
            "couchbase_goxdcr",
            "2022-03-23T14:34:40.547-07:00 INFO GOXDCR.main: Starting xdcr",
        ),
        (
            "mssql_errorlog",
            "2022-03-08 19:31:06.09 Server      Microsoft SQL Server 2019 (RTM-CU15) (KB5008996) - 15.0.4198.2 (X64)",
        ),
        (
            "saphana_trace",
            "[18048]{-1}[-1/-1] 2022-03-08 19:31:06.090937 i ha_dr_provider  HADRProviderManager.cpp(00085) : loading HA/DR Provider",
        ),
        (
            "oracledb_alert",
            "2021-12-21T10:19:47.339827-05:00",
        ),
        (
            "vault_audit",
            r#"{"time":"2022-06-07T20:34:34.392078404Z","type":"request"}"#,
        ),
        (
            "zookeeper_general",
            "2021-10-12 21:22:45,123 [myid:1] - INFO  [main:QuorumPeerConfig@174] - Reading configuration",
        ),
    ];

    let r = registries();
    for (type_id, line) in samples {
        let receiver = r
            .logging_receivers
            .build(type_id, minimal_body(type_id), Platform::Linux)
            .unwrap_or_else(|e| panic!("{type_id}: {e}"));
        let inspect = receiver.inspect();
        let rules = inspect
            .multiline
            .unwrap_or_else(|| panic!("{type_id}: no multiline rules"));

        let t = rules.classify(rules.start(), line);
        assert_eq!(t.class, LineClass::Start, "{type_id}");

        let start_rule = rules
            .rules()
            .iter()
            .find(|rule| rule.state_name == START_STATE)
            .expect("start rule");
        assert_eq!(rules.state_id(&start_rule.next_state), Some(t.next), "{type_id}");

        let follow = rules.classify(t.next, "    at com.example.Main.run(Main.java:42)");
        assert_eq!(follow.class, LineClass::Continuation, "{type_id}");
    }
}

// =============================================================================
// Cassandra 스택 트레이스
// =============================================================================

const CASSANDRA_LOG: [&str; 6] = [
    "INFO  [main] 2021-10-07 10:14:58,281 IndexSummaryManager.java:103 - Redistributing index summaries",
    "ERROR [main] 2021-10-07 10:14:59,002 LogFile.java:310 - Failed to verify transaction log",
    "java.lang.IllegalStateException: corrupted log",
    "    at org.apache.cassandra.db.lifecycle.LogFile.verify(LogFile.java:310)",
    "    at org.apache.cassandra.db.lifecycle.LogTransaction.removeUnfinishedLeftovers(LogTransaction.java:451)",
    "WARN  [main] 2021-10-07 10:15:00,114 StartupChecks.java:143 - JMX is not enabled",
];

#[test]
fn cassandra_stack_trace_is_assembled_into_one_record() {
    let r = registries();
    let receiver = r
        .logging_receivers
        .build("cassandra_system", serde_yaml::Value::Null, Platform::Linux)
        .unwrap();
    let inspect = receiver.inspect();
    let rules = inspect.multiline.expect("cassandra_system is multiline");

    let records = assemble(rules, CASSANDRA_LOG);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].len(), 1);
    assert_eq!(records[1].len(), 4);
    assert!(records[1][3].contains("removeUnfinishedLeftovers"));
    assert_eq!(records[2].len(), 1);
}

#[test]
fn cassandra_assembler_tracks_state() {
    let r = registries();
    let receiver = r
        .logging_receivers
        .build("cassandra_system", serde_yaml::Value::Null, Platform::Linux)
        .unwrap();
    let inspect = receiver.inspect();
    let rules = inspect.multiline.expect("cassandra_system is multiline");

    let mut assembler = Assembler::new(rules);
    assert_eq!(assembler.state(), START_STATE);
    assert!(assembler.push(CASSANDRA_LOG[1]).is_none());
    assert_eq!(assembler.state(), "cont");
    assert!(assembler.push(CASSANDRA_LOG[3]).is_none());

    let closed = assembler.push(CASSANDRA_LOG[5]).expect("start closes record");
    assert_eq!(closed.len(), 2);
    assert_eq!(assembler.finish(), Some(vec![CASSANDRA_LOG[5].to_owned()]));
}

#[test]
fn cassandra_record_parses_with_severity() {
    let r = registries();
    let receiver = r
        .logging_receivers
        .build("cassandra_system", serde_yaml::Value::Null, Platform::Linux)
        .unwrap();
    let inspect = receiver.inspect();

    let record = inspect
        .preview(&CASSANDRA_LOG[1..5].join("\n"))
        .expect("record should parse");
    let level = record.fields["level"].as_str().expect("level is a string");
    assert_eq!(level, "ERROR");

    let table = inspect.severity.expect("cassandra declares severities");
    assert_eq!(
        table.normalize(level, SeverityPolicy::Declared),
        Outcome::Mapped(opsconf_core::types::Severity::Error)
    );
}
