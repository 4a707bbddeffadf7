//! `opsconf list` command handler

use std::io::Write;

use serde::Serialize;

use opsconf_apps::Registries;
use opsconf_core::config::OpsconfConfig;
use opsconf_core::types::Platform;

use crate::cli::{ListArgs, RegistryKind};
use crate::commands::registries;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(
    args: ListArgs,
    settings: &OpsconfConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let platform = args
        .platform
        .map(Platform::from)
        .unwrap_or(settings.generator.platform);
    let registries = registries()?;
    let report = listing(&registries, platform, args.kind);
    writer.render(&report)
}

/// Collect supported types for one or all registries.
pub fn listing(registries: &Registries, platform: Platform, kind: Option<RegistryKind>) -> TypeListing {
    let all = [
        RegistryKind::LoggingReceiver,
        RegistryKind::LoggingProcessor,
        RegistryKind::MetricsReceiver,
        RegistryKind::MetricsProcessor,
    ];
    let registries_out = all
        .into_iter()
        .filter(|k| kind.is_none_or(|wanted| wanted == *k))
        .map(|k| {
            let (subagent, kind, types) = match k {
                RegistryKind::LoggingReceiver => {
                    let r = &registries.logging_receivers;
                    (r.subagent(), r.kind(), r.supported_types(platform))
                }
                RegistryKind::LoggingProcessor => {
                    let r = &registries.logging_processors;
                    (r.subagent(), r.kind(), r.supported_types(platform))
                }
                RegistryKind::MetricsReceiver => {
                    let r = &registries.metrics_receivers;
                    (r.subagent(), r.kind(), r.supported_types(platform))
                }
                RegistryKind::MetricsProcessor => {
                    let r = &registries.metrics_processors;
                    (r.subagent(), r.kind(), r.supported_types(platform))
                }
            };
            RegistryListing {
                subagent: subagent.to_owned(),
                kind: kind.to_owned(),
                types,
            }
        })
        .collect();

    TypeListing {
        platform: platform.as_str().to_owned(),
        registries: registries_out,
    }
}

/// Supported types per registry.
#[derive(Debug, Serialize)]
pub struct TypeListing {
    pub platform: String,
    pub registries: Vec<RegistryListing>,
}

#[derive(Debug, Serialize)]
pub struct RegistryListing {
    pub subagent: String,
    pub kind: String,
    pub types: Vec<String>,
}

impl Render for TypeListing {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for registry in &self.registries {
            let title = format!("{} {}s", registry.subagent, registry.kind);
            writeln!(
                w,
                "{} ({}, {} types)",
                title.bold(),
                self.platform,
                registry.types.len()
            )?;
            for type_id in &registry.types {
                writeln!(w, "  {type_id}")?;
            }
        }
        Ok(())
    }
}
