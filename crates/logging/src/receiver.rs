//! 로그 수신기 디스크립터 -- 파일(tail), Windows 이벤트 로그
//!
//! 제품별 파일 수신기는 [`FilesReceiver`]에 기본 경로와 멀티라인 규칙,
//! 제품 프로세서를 묶어 만듭니다 ([`ProductFilesReceiver`]).

use std::time::Duration;

use serde::Deserialize;

use opsconf_core::context::GenContext;
use opsconf_core::fluentbit::{self, Component, Kind, ModifyOptions};
use opsconf_core::types::parse_duration;

use crate::component::{Inspect, LoggingProcessor, LoggingReceiver};
use crate::error::LoggingError;
use crate::modify::SEVERITY_KEY;
use crate::multiline::MultilineRules;
use crate::parser::parser_filter;

const STRIP_NEWLINE_LUA: &str = r#"
local function trim_newline(s)
    if string.sub(s, -2) == "\r\n" then
        return string.sub(s, 1, -3)
    elseif string.sub(s, -1) == "\n" then
        return string.sub(s, 1, -2)
    end
    return s
end
function strip_newline(tag, timestamp, record)
  record["message"] = trim_newline(record["message"])
  return 2, timestamp, record
end
"#;

const EVENT_LOG_V2_SEVERITY_LUA: &str = r#"
function process(tag, timestamp, record)
    severityKey = 'logging.googleapis.com/severity'
    if record['Level'] == 1 then
        record[severityKey] = 'CRITICAL'
    elseif record['Level'] == 2 then
        record[severityKey] = 'ERROR'
    elseif record['Level'] == 3 then
        record[severityKey] = 'WARNING'
    elseif record['Level'] == 4 then
        record[severityKey] = 'INFO'
    elseif record['Level'] == 5 then
        record[severityKey] = 'NOTICE'
    end
    return 2, timestamp, record
end
"#;

// ─── FilesReceiver ───────────────────────────────────────────────────

/// tail 기반 파일 수신기
#[derive(Debug, Clone, Default)]
pub struct FilesReceiver {
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub wildcard_refresh_interval: Option<Duration>,
    pub record_log_file_path: bool,
    pub buffer_in_memory: bool,
    pub multiline_rules: Option<MultilineRules>,
}

/// 파일 수신기 사용자 설정 필드
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesReceiverConfig {
    #[serde(default)]
    pub include_paths: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub wildcard_refresh_interval: Option<String>,
    #[serde(default)]
    pub record_log_file_path: Option<bool>,
}

impl FilesReceiverConfig {
    /// 검증 후 수신기로 바꿉니다. `include_paths`가 없으면 `default_paths`를 씁니다.
    pub fn into_receiver(self, default_paths: &[&str]) -> Result<FilesReceiver, LoggingError> {
        let include_paths = match self.include_paths {
            Some(paths) => paths,
            None => default_paths.iter().map(|p| (*p).to_owned()).collect(),
        };
        if include_paths.is_empty() {
            return Err(LoggingError::field(
                "include_paths",
                "at least one path is required",
            ));
        }

        let wildcard_refresh_interval = match self.wildcard_refresh_interval {
            Some(raw) => {
                let interval = parse_duration(&raw).map_err(|e| {
                    LoggingError::field("wildcard_refresh_interval", e.to_string())
                })?;
                if interval < Duration::from_secs(1) || interval.subsec_nanos() != 0 {
                    return Err(LoggingError::field(
                        "wildcard_refresh_interval",
                        format!("{raw:?} must be a whole number of seconds, at least 1s"),
                    ));
                }
                Some(interval)
            }
            None => None,
        };

        Ok(FilesReceiver {
            include_paths,
            exclude_paths: self.exclude_paths,
            wildcard_refresh_interval,
            record_log_file_path: self.record_log_file_path.unwrap_or(false),
            buffer_in_memory: false,
            multiline_rules: None,
        })
    }
}

impl FilesReceiver {
    /// 사용자 설정 본문에서 만듭니다 (`files` 타입).
    pub fn from_value(body: serde_yaml::Value) -> Result<Self, LoggingError> {
        let cfg: FilesReceiverConfig = serde_yaml::from_value(body)?;
        cfg.into_receiver(&[])
    }

    /// 멀티라인 규칙을 붙입니다 (builder).
    pub fn with_multiline(mut self, rules: MultilineRules) -> Self {
        self.multiline_rules = Some(rules);
        self
    }
}

impl LoggingReceiver for FilesReceiver {
    fn components(&self, ctx: &GenContext, tag: &str) -> Vec<Component> {
        if self.include_paths.is_empty() {
            return Vec::new();
        }

        let mut input = Component::new(Kind::Input)
            .with("Name", "tail")
            .with("Tag", tag)
            .with("Path", self.include_paths.join(","))
            .with("Read_from_Head", "True")
            .with("Buffer_Chunk_Size", "512k")
            .with("Buffer_Max_Size", "2M")
            .with("Key", "message")
            .with("Skip_Long_Lines", "On")
            .with("DB", fluentbit::db_path(tag))
            .with("DB.locking", "true")
            .with("Rotate_Wait", "30")
            .with(
                "storage.type",
                if self.buffer_in_memory { "memory" } else { "filesystem" },
            )
            .with("Mem_Buf_Limit", "10M");

        if !self.exclude_paths.is_empty() {
            input.set("Exclude_Path", self.exclude_paths.join(","));
        }
        if let Some(interval) = self.wildcard_refresh_interval {
            input.set("Refresh_Interval", interval.as_secs().to_string());
        }
        if self.record_log_file_path {
            input.set("Path_Key", "agent.googleapis.com/log_file_path");
        }

        let mut components = Vec::new();
        if let Some(rules) = &self.multiline_rules {
            let parser_name = format!("multiline.{tag}");
            components.push(rules.parser_component(&parser_name, ctx.flush_timeout_ms));
            input.set("multiline.parser", parser_name);
            components.push(ModifyOptions::rename("log", "message").component(tag));
            components.push(fluentbit::lua_filter(tag, "strip_newline", STRIP_NEWLINE_LUA));
        }
        components.push(input);
        components
    }

    fn inspect(&self) -> Inspect<'_> {
        Inspect {
            multiline: self.multiline_rules.as_ref(),
            ..Inspect::default()
        }
    }
}

/// 제품별 파일 수신기: 파일 수신기 + 제품 프로세서
///
/// 프로세서의 멀티라인 규칙은 INPUT에 직접 붙습니다. 필터로 처리하면
/// 청크 경계에 걸친 레코드를 합치지 못하기 때문입니다.
#[derive(Debug)]
pub struct ProductFilesReceiver {
    pub files: FilesReceiver,
    pub processor: Box<dyn LoggingProcessor>,
}

impl ProductFilesReceiver {
    pub fn new(files: FilesReceiver, processor: Box<dyn LoggingProcessor>) -> Self {
        Self { files, processor }
    }
}

impl LoggingReceiver for ProductFilesReceiver {
    fn components(&self, ctx: &GenContext, tag: &str) -> Vec<Component> {
        self.files.components(ctx, tag)
    }

    fn builtin_processor(&self) -> Option<&dyn LoggingProcessor> {
        Some(self.processor.as_ref())
    }

    fn inspect(&self) -> Inspect<'_> {
        self.files.inspect().merge(self.processor.inspect())
    }
}

// ─── WindowsEventLogReceiver ─────────────────────────────────────────

/// 이벤트 로그 API 버전
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventLogVersion {
    /// `winlog` 입력, 시간 키 `TimeGenerated`
    #[default]
    V1,
    /// `winevtlog` 입력, 시간 키 `TimeCreated`
    V2,
}

/// Windows 이벤트 로그 수신기
#[derive(Debug, Clone)]
pub struct WindowsEventLogReceiver {
    pub channels: Vec<String>,
    pub receiver_version: EventLogVersion,
    pub render_as_xml: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowsEventLogConfig {
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    receiver_version: Option<VersionField>,
    #[serde(default)]
    render_as_xml: bool,
}

impl WindowsEventLogReceiver {
    pub fn new(channels: &[&str]) -> Self {
        Self {
            channels: channels.iter().map(|c| (*c).to_owned()).collect(),
            receiver_version: EventLogVersion::V1,
            render_as_xml: false,
        }
    }

    pub fn from_value(body: serde_yaml::Value) -> Result<Self, LoggingError> {
        let cfg: WindowsEventLogConfig = serde_yaml::from_value(body)?;
        if cfg.channels.is_empty() {
            return Err(LoggingError::field(
                "channels",
                "at least one channel is required",
            ));
        }
        if cfg.channels.iter().any(|c| c.contains(',')) {
            return Err(LoggingError::field(
                "channels",
                "channel names must not contain ','",
            ));
        }
        let receiver_version = match cfg.receiver_version {
            None => EventLogVersion::V1,
            Some(VersionField::Number(1)) => EventLogVersion::V1,
            Some(VersionField::Number(2)) => EventLogVersion::V2,
            Some(VersionField::Text(t)) if t == "1" => EventLogVersion::V1,
            Some(VersionField::Text(t)) if t == "2" => EventLogVersion::V2,
            Some(_) => {
                return Err(LoggingError::field(
                    "receiver_version",
                    "must be one of: 1, 2",
                ));
            }
        };
        Ok(Self {
            channels: cfg.channels,
            receiver_version,
            render_as_xml: cfg.render_as_xml,
        })
    }
}

impl LoggingReceiver for WindowsEventLogReceiver {
    fn components(&self, _ctx: &GenContext, tag: &str) -> Vec<Component> {
        let (input_name, time_key) = match self.receiver_version {
            EventLogVersion::V1 => ("winlog", "TimeGenerated"),
            EventLogVersion::V2 => ("winevtlog", "TimeCreated"),
        };

        let mut input = Component::new(Kind::Input)
            .with("Name", input_name)
            .with("Tag", tag)
            .with("String_Inserts", "true")
            .with("Channels", self.channels.join(","))
            .with("Interval_Sec", "1")
            .with("DB", fluentbit::db_path(tag));

        let mut components = Vec::new();
        if self.render_as_xml {
            input.set("Render_Event_As_XML", "True");
        }
        components.push(input);
        if self.render_as_xml {
            components.push(ModifyOptions::rename("System", "raw_xml").component(tag));
        }

        let timestamp_parser = format!("{tag}.timestamp_parser");
        components.push(
            Component::new(Kind::Parser)
                .with("Name", timestamp_parser.clone())
                .with("Format", "regex")
                .with("Time_Format", "%Y-%m-%d %H:%M:%S %z")
                .with("Time_Key", "timestamp")
                .with("Regex", r"(?<timestamp>\d+-\d+-\d+ \d+:\d+:\d+ [+-]\d{4})"),
        );
        components.push(parser_filter(tag, Some(time_key), &[timestamp_parser], true));

        match self.receiver_version {
            EventLogVersion::V1 => components.extend(fluentbit::translation_filters(
                tag,
                "EventType",
                SEVERITY_KEY,
                &[
                    ("Error", "ERROR"),
                    ("Information", "INFO"),
                    ("Warning", "WARNING"),
                    ("SuccessAudit", "NOTICE"),
                    ("FailureAudit", "NOTICE"),
                ],
            )),
            EventLogVersion::V2 => {
                components.push(fluentbit::lua_filter(tag, "process", EVENT_LOG_V2_SEVERITY_LUA))
            }
        }
        components
    }
}
