//! `opsconf multiline` command handler
//!
//! Runs a product's multiline rules and parsers over a local log file.
//! Nothing is tailed; the file is read once.

use std::io::Write;

use serde::Serialize;
use tracing::{debug, info};

use opsconf_core::config::OpsconfConfig;
use opsconf_core::context::GenContext;
use opsconf_logging::multiline::assemble;
use opsconf_logging::{Inspect, Outcome, Record};

use crate::cli::MultilineArgs;
use crate::commands::{LoggingDescriptor, gen_context, registries};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `multiline` command.
pub async fn execute(
    args: MultilineArgs,
    settings: &OpsconfConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(type_id = %args.type_id, file = %args.file.display(), "previewing multiline records");

    let ctx = gen_context(settings, None);
    let registries = registries()?;
    let descriptor = LoggingDescriptor::build(&registries, &args.type_id, ctx.platform)?;
    let content = tokio::fs::read_to_string(&args.file).await?;

    let report = preview(&args.type_id, &descriptor.inspect(), &content, &ctx);
    writer.render(&report)
}

/// Group `content` into records and preview each one.
///
/// Without multiline rules every line is its own record.
pub fn preview(type_id: &str, inspect: &Inspect<'_>, content: &str, ctx: &GenContext) -> MultilineReport {
    let lines: Vec<&str> = content.lines().collect();
    let grouped: Vec<Vec<String>> = match inspect.multiline {
        Some(rules) => {
            let rules = rules.clone().with_fallback(ctx.multiline_fallback);
            assemble(&rules, lines.iter().copied())
        }
        None => lines.iter().map(|l| vec![(*l).to_owned()]).collect(),
    };
    debug!(lines = lines.len(), records = grouped.len(), "records assembled");

    let mut start_line = 1;
    let records = grouped
        .into_iter()
        .map(|record_lines| {
            let text = record_lines.join("\n");
            let parsed = inspect.preview(&text);
            let severity = match (&parsed, inspect.severity) {
                (Some(record), Some(table)) => record
                    .fields
                    .get(&table.source_field)
                    .and_then(|v| v.as_str())
                    .map(|value| table.normalize(value, ctx.severity_policy)),
                _ => None,
            };
            let preview = RecordPreview {
                start_line,
                lines: record_lines.len(),
                text,
                parsed,
                severity,
            };
            start_line += record_lines.len();
            preview
        })
        .collect();

    MultilineReport {
        type_id: type_id.to_owned(),
        multiline: inspect.multiline.is_some(),
        records,
    }
}

/// Records found in a log file.
#[derive(Debug, Serialize)]
pub struct MultilineReport {
    pub type_id: String,
    /// Whether the type declares multiline rules.
    pub multiline: bool,
    pub records: Vec<RecordPreview>,
}

#[derive(Debug, Serialize)]
pub struct RecordPreview {
    /// 1-based line number of the first line.
    pub start_line: usize,
    pub lines: usize,
    pub text: String,
    /// `None` when no parser matched.
    pub parsed: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Outcome>,
}

impl Render for MultilineReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{}: {} records{}",
            self.type_id.bold(),
            self.records.len(),
            if self.multiline { "" } else { " (no multiline rules)" }
        )?;
        for (i, record) in self.records.iter().enumerate() {
            writeln!(
                w,
                "#{} line {} ({} lines)",
                i + 1,
                record.start_line,
                record.lines
            )?;
            match &record.parsed {
                Some(parsed) => {
                    if let Some(ts) = &parsed.timestamp {
                        writeln!(w, "  timestamp: {}", ts.to_rfc3339())?;
                    }
                    for (key, value) in &parsed.fields {
                        match value.as_str() {
                            Some(s) => {
                                let first = s.lines().next().unwrap_or_default();
                                writeln!(w, "  {key}: {first}")?;
                            }
                            None => writeln!(w, "  {key}: {value}")?,
                        }
                    }
                }
                None => writeln!(w, "  {}", "(no parser matched)".yellow())?,
            }
            match &record.severity {
                Some(Outcome::Mapped(severity)) => {
                    writeln!(w, "  severity: {}", severity.as_str().green())?
                }
                Some(Outcome::Dropped) => writeln!(w, "  severity: {}", "(dropped)".yellow())?,
                Some(Outcome::PassedThrough(raw)) => {
                    writeln!(w, "  severity: {raw} (unmapped)")?
                }
                None => {}
            }
        }
        Ok(())
    }
}
