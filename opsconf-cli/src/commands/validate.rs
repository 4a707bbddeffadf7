//! `opsconf validate` command handler

use std::io::Write;

use serde::Serialize;
use tracing::{info, warn};

use opsconf_apps::UnifiedConfig;
use opsconf_core::config::OpsconfConfig;

use crate::cli::ValidateArgs;
use crate::commands::{gen_context, registries};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `validate` command.
///
/// Parses and resolves the unified config, which builds every component and
/// compiles every regex. Reports the first error and exits with code 2.
pub async fn execute(
    args: ValidateArgs,
    settings: &OpsconfConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(input = %args.input.display(), "validating unified config");

    let ctx = gen_context(settings, args.platform);
    let registries = registries()?;
    let source = args.input.display().to_string();

    let result = match UnifiedConfig::load(&args.input).await {
        Ok(config) => config
            .resolve(&registries, &ctx)
            .map(|resolved| {
                (
                    resolved.logging.pipelines.len(),
                    resolved.metrics.pipelines.len(),
                )
            })
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let report = match result {
        Ok((logging_pipelines, metrics_pipelines)) => ValidationReport {
            source,
            platform: ctx.platform.as_str().to_owned(),
            valid: true,
            logging_pipelines,
            metrics_pipelines,
            errors: Vec::new(),
        },
        Err(error) => {
            warn!(error = %error, "unified config is invalid");
            ValidationReport {
                source,
                platform: ctx.platform.as_str().to_owned(),
                valid: false,
                logging_pipelines: 0,
                metrics_pipelines: 0,
                errors: vec![error],
            }
        }
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("unified config is invalid".to_owned()));
    }
    Ok(())
}

/// Unified config validation report.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub platform: String,
    pub valid: bool,
    pub logging_pipelines: usize,
    pub metrics_pipelines: usize,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Validation: {} ({})", self.source.bold(), self.platform)?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
            writeln!(
                w,
                "  Pipelines: {} logging, {} metrics",
                self.logging_pipelines, self.metrics_pipelines
            )?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
