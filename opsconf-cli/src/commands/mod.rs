//! Command handlers -- one module per subcommand
//!
//! Shared setup (settings loading, generation context, registry lookup)
//! lives here.

pub mod config;
pub mod generate;
pub mod list;
pub mod multiline;
pub mod severity;
pub mod validate;

use std::path::Path;

use tracing::debug;

use opsconf_apps::{Registries, build_registries};
use opsconf_core::config::OpsconfConfig;
use opsconf_core::context::GenContext;
use opsconf_core::types::Platform;
use opsconf_logging::{Inspect, LoggingProcessor, LoggingReceiver};
use opsconf_metrics::JarLocator;

use crate::cli::PlatformArg;
use crate::error::CliError;

/// Load generator settings.
///
/// An explicitly given path must exist; the default path falls back to defaults.
pub async fn load_settings(path: &Path, explicit: bool) -> Result<OpsconfConfig, CliError> {
    let settings = if explicit {
        OpsconfConfig::load(path).await?
    } else {
        OpsconfConfig::load_or_default(path).await?
    };
    Ok(settings)
}

/// Build the generation context from settings and an optional platform override.
pub fn gen_context(settings: &OpsconfConfig, platform: Option<PlatformArg>) -> GenContext {
    let platform = platform
        .map(Platform::from)
        .unwrap_or(settings.generator.platform);
    let jar = JarLocator::new(settings.generator.jar_path.clone(), platform).locate();
    debug!(platform = %platform.as_str(), jar = %jar, "generation context ready");
    GenContext::new(&settings.generator, jar).with_platform(platform)
}

pub fn registries() -> Result<Registries, CliError> {
    Ok(build_registries()?)
}

/// A logging receiver or processor built with an empty body, for local evaluation.
#[derive(Debug)]
pub enum LoggingDescriptor {
    Receiver(Box<dyn LoggingReceiver>),
    Processor(Box<dyn LoggingProcessor>),
}

impl LoggingDescriptor {
    /// Receivers win over processors when both share a type id, since the
    /// receiver carries the input-side multiline rules.
    pub fn build(
        registries: &Registries,
        type_id: &str,
        platform: Platform,
    ) -> Result<Self, CliError> {
        let body = serde_yaml::Value::Null;
        if registries.logging_receivers.contains(type_id, platform) {
            let receiver = registries.logging_receivers.build(type_id, body, platform)?;
            return Ok(Self::Receiver(receiver));
        }
        let processor = registries.logging_processors.build(type_id, body, platform)?;
        Ok(Self::Processor(processor))
    }

    pub fn inspect(&self) -> Inspect<'_> {
        match self {
            Self::Receiver(r) => r.inspect(),
            Self::Processor(p) => p.inspect(),
        }
    }
}
