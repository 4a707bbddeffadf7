//! `opsconf generate` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use opsconf_apps::{Generated, UnifiedConfig, generate};
use opsconf_core::config::OpsconfConfig;
use opsconf_core::context::GenContext;

use crate::cli::GenerateArgs;
use crate::commands::{gen_context, registries};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `generate` command.
///
/// Writes every file into `--out-dir` when given, otherwise prints them.
pub async fn execute(
    args: GenerateArgs,
    settings: &OpsconfConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(input = %args.input.display(), "generating configs");

    let ctx = gen_context(settings, args.platform);
    let registries = registries()?;
    let resolved = UnifiedConfig::load(&args.input)
        .await?
        .resolve(&registries, &ctx)?;
    let generated = generate(&resolved, settings, &ctx)?;

    let report = match &args.out_dir {
        Some(dir) => {
            let written = generated.write_to(dir).await?;
            GenerateReport {
                source: args.input.display().to_string(),
                platform: ctx.platform.as_str().to_owned(),
                files: written
                    .iter()
                    .map(|path| GeneratedFile {
                        name: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        path: Some(path.display().to_string()),
                        contents: None,
                    })
                    .collect(),
            }
        }
        None => GenerateReport::inline(&args.input.display().to_string(), &generated, &ctx),
    };

    writer.render(&report)
}

/// Result of a generation run.
#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub source: String,
    pub platform: String,
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedFile {
    pub name: String,
    /// Set when the file was written to disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Set when the file is printed instead of written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl GenerateReport {
    fn inline(source: &str, generated: &Generated, ctx: &GenContext) -> Self {
        Self {
            source: source.to_owned(),
            platform: ctx.platform.as_str().to_owned(),
            files: generated
                .files()
                .map(|(name, contents)| GeneratedFile {
                    name: name.to_owned(),
                    path: None,
                    contents: Some(contents.to_owned()),
                })
                .collect(),
        }
    }
}

impl Render for GenerateReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for file in &self.files {
            match (&file.path, &file.contents) {
                (Some(path), _) => writeln!(w, "{} {}", "wrote".green().bold(), path)?,
                (None, Some(contents)) => {
                    writeln!(w, "# ---- {} ----", file.name.bold())?;
                    write!(w, "{contents}")?;
                    if !contents.ends_with('\n') {
                        writeln!(w)?;
                    }
                }
                (None, None) => writeln!(w, "# ---- {} (empty) ----", file.name)?,
            }
        }
        Ok(())
    }
}
