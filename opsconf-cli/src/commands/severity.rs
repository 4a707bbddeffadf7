//! `opsconf severity` command handler

use std::io::Write;

use serde::Serialize;

use opsconf_core::config::OpsconfConfig;
use opsconf_core::types::SeverityPolicy;
use opsconf_logging::{Outcome, SeverityTable};

use crate::cli::SeverityArgs;
use crate::commands::{LoggingDescriptor, registries};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `severity` command.
pub fn execute(
    args: SeverityArgs,
    settings: &OpsconfConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let registries = registries()?;
    let descriptor =
        LoggingDescriptor::build(&registries, &args.type_id, settings.generator.platform)?;
    let inspect = descriptor.inspect();
    let table = inspect.severity.ok_or_else(|| {
        CliError::Command(format!(
            "logging type \"{}\" has no severity table",
            args.type_id
        ))
    })?;

    let report = normalize_all(
        &args.type_id,
        table,
        &args.values,
        settings.generator.severity_policy,
    );
    writer.render(&report)
}

pub fn normalize_all(
    type_id: &str,
    table: &SeverityTable,
    values: &[String],
    policy: SeverityPolicy,
) -> SeverityReport {
    SeverityReport {
        type_id: type_id.to_owned(),
        source_field: table.source_field.clone(),
        policy: policy.as_str().to_owned(),
        exclusive: table.effective_exclusive(policy),
        results: values
            .iter()
            .map(|value| Normalized {
                value: value.clone(),
                outcome: table.normalize(value, policy),
            })
            .collect(),
    }
}

/// Severity normalization results.
#[derive(Debug, Serialize)]
pub struct SeverityReport {
    pub type_id: String,
    pub source_field: String,
    pub policy: String,
    /// Whether unmapped values are dropped under the policy.
    pub exclusive: bool,
    pub results: Vec<Normalized>,
}

#[derive(Debug, Serialize)]
pub struct Normalized {
    pub value: String,
    pub outcome: Outcome,
}

impl Render for SeverityReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} (field: {}, policy: {}{})",
            self.type_id.bold(),
            self.source_field,
            self.policy,
            if self.exclusive { ", exclusive" } else { "" }
        )?;
        for r in &self.results {
            let outcome = match &r.outcome {
                Outcome::Mapped(s) => s.as_str().green().to_string(),
                Outcome::Dropped => "(dropped)".yellow().to_string(),
                Outcome::PassedThrough(raw) => format!("{raw} (unmapped)"),
            };
            writeln!(w, "  {:<16} -> {}", r.value, outcome)?;
        }
        Ok(())
    }
}
