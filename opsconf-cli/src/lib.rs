//! opsconf CLI library
//!
//! The `opsconf` binary is a thin wrapper around [`run`]; the modules are
//! public so integration tests can drive command handlers directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use tracing::debug;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

/// Load settings, initialize logging and dispatch the subcommand.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let (config_path, explicit) = cli.config_path();
    let settings = commands::load_settings(&config_path, explicit).await;

    // logging still starts when settings fail to load
    let general = settings
        .as_ref()
        .map(|s| s.general.clone())
        .unwrap_or_default();
    logging::init_tracing(cli.log_level.as_deref(), &general)?;
    // no-op unless an embedding program installed a metrics recorder
    opsconf_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);

    // `config` reports settings errors itself
    let command = match cli.command {
        Commands::Config(args) => {
            return commands::config::execute(args, &config_path, explicit, &writer).await;
        }
        other => other,
    };

    let settings = settings?;
    debug!(
        path = %config_path.display(),
        platform = %settings.generator.platform.as_str(),
        "settings loaded"
    );

    match command {
        Commands::Generate(args) => commands::generate::execute(args, &settings, &writer).await,
        Commands::Validate(args) => commands::validate::execute(args, &settings, &writer).await,
        Commands::List(args) => commands::list::execute(args, &settings, &writer),
        Commands::Multiline(args) => commands::multiline::execute(args, &settings, &writer).await,
        Commands::Severity(args) => commands::severity::execute(args, &settings, &writer),
        Commands::Config(_) => Ok(()),
    }
}
