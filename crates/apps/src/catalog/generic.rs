//! 범용 컴포넌트 등록
//!
//! 제품에 묶이지 않고 사용자가 직접 필드를 채우는 컴포넌트들입니다.

use opsconf_core::error::OpsconfError;
use opsconf_core::types::PlatformFilter;
use opsconf_logging::{
    FilesReceiver, LoggingProcessor, LoggingReceiver, ModifyFields, ParseJson,
    ParseMultilineRegex, ParseRegex, WindowsEventLogReceiver,
};
use opsconf_metrics::{ExcludeMetrics, MetricsProcessor};

use super::{Registries, body_or_empty};

fn files(body: serde_yaml::Value) -> Result<Box<dyn LoggingReceiver>, OpsconfError> {
    Ok(Box::new(FilesReceiver::from_value(body_or_empty(body))?))
}

fn windows_event_log(body: serde_yaml::Value) -> Result<Box<dyn LoggingReceiver>, OpsconfError> {
    Ok(Box::new(WindowsEventLogReceiver::from_value(body_or_empty(body))?))
}

fn parse_json(body: serde_yaml::Value) -> Result<Box<dyn LoggingProcessor>, OpsconfError> {
    Ok(Box::new(ParseJson::from_value(body_or_empty(body))?))
}

fn parse_regex(body: serde_yaml::Value) -> Result<Box<dyn LoggingProcessor>, OpsconfError> {
    Ok(Box::new(ParseRegex::from_value(body_or_empty(body))?))
}

fn parse_multiline(body: serde_yaml::Value) -> Result<Box<dyn LoggingProcessor>, OpsconfError> {
    Ok(Box::new(ParseMultilineRegex::from_value(body_or_empty(body))?))
}

fn modify_fields(body: serde_yaml::Value) -> Result<Box<dyn LoggingProcessor>, OpsconfError> {
    Ok(Box::new(ModifyFields::from_value(body_or_empty(body))?))
}

fn exclude_metrics(body: serde_yaml::Value) -> Result<Box<dyn MetricsProcessor>, OpsconfError> {
    Ok(Box::new(ExcludeMetrics::from_value(body_or_empty(body))?))
}

pub(crate) fn register(registries: &mut Registries) -> Result<(), OpsconfError> {
    registries
        .logging_receivers
        .register("files", PlatformFilter::All, files)?;
    registries.logging_receivers.register(
        "windows_event_log",
        PlatformFilter::WindowsOnly,
        windows_event_log,
    )?;

    let processors = &mut registries.logging_processors;
    processors.register("parse_json", PlatformFilter::All, parse_json)?;
    processors.register("parse_regex", PlatformFilter::All, parse_regex)?;
    processors.register("parse_multiline", PlatformFilter::All, parse_multiline)?;
    processors.register("modify_fields", PlatformFilter::All, modify_fields)?;

    registries
        .metrics_processors
        .register("exclude_metrics", PlatformFilter::All, exclude_metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_core::types::Platform;

    fn registries() -> Registries {
        let mut r = Registries::new();
        register(&mut r).unwrap();
        r
    }

    #[test]
    fn files_requires_include_paths() {
        let r = registries();
        let err = r
            .logging_receivers
            .build("files", serde_yaml::Value::Null, Platform::Linux)
            .unwrap_err();
        assert!(err.to_string().contains("include_paths"));
    }

    #[test]
    fn parse_regex_compiles_user_regex() {
        let r = registries();
        let body = serde_yaml::from_str("regex: '^(?<a>\\d+)$'").unwrap();
        let p = r
            .logging_processors
            .build("parse_regex", body, Platform::Linux)
            .unwrap();
        assert_eq!(p.inspect().parsers.len(), 1);

        let bad = serde_yaml::from_str("regex: '(?<a>'").unwrap();
        assert!(
            r.logging_processors
                .build("parse_regex", bad, Platform::Linux)
                .is_err()
        );
    }

    #[test]
    fn exclude_metrics_registered_for_metrics() {
        let r = registries();
        let body =
            serde_yaml::from_str("metrics_pattern: ['agent.googleapis.com/processes/*']").unwrap();
        assert!(
            r.metrics_processors
                .build("exclude_metrics", body, Platform::Linux)
                .is_ok()
        );
    }
}
