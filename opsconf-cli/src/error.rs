//! CLI-specific error types and exit code mapping

use opsconf_apps::AppsError;
use opsconf_core::error::OpsconfError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Settings or unified config loading / validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from opsconf-core.
    #[error("{0}")]
    Core(#[from] OpsconfError),

    /// Unified config error from opsconf-apps.
    #[error("{0}")]
    Apps(#[from] AppsError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 0    | Success                                  |
    /// | 1    | General / command error                  |
    /// | 2    | Configuration, validation, registry error |
    /// | 10   | IO error                                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Apps(_) => 2,
            Self::Io(_) => 10,
            Self::Core(e) => match e {
                OpsconfError::Config(_) | OpsconfError::Registry(_) => 2,
                OpsconfError::Io(_) => 10,
                OpsconfError::Render(_) => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsconf_core::error::{ConfigError, RegistryError, RenderError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_apps_error() {
        let err = CliError::Apps(AppsError::Validation("bad pipeline".to_owned()));
        assert_eq!(err.exit_code(), 2, "validation error should return exit code 2");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_core_variants() {
        let config = CliError::Core(OpsconfError::Config(ConfigError::FileNotFound {
            path: "opsconf.toml".to_owned(),
        }));
        assert_eq!(config.exit_code(), 2);

        let registry = CliError::Core(OpsconfError::Registry(RegistryError::AlreadyRegistered {
            subagent: "logging".to_owned(),
            kind: "receiver".to_owned(),
            type_id: "files".to_owned(),
        }));
        assert_eq!(registry.exit_code(), 2);

        let io = CliError::Core(OpsconfError::Io(std::io::Error::other("disk full")));
        assert_eq!(io.exit_code(), 10);

        let render = CliError::Core(OpsconfError::Render(RenderError::Serialize {
            what: "otel config".to_owned(),
            reason: "boom".to_owned(),
        }));
        assert_eq!(render.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_exit_code_json_serialize_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json")
            .expect_err("should fail parsing");
        let err = CliError::JsonSerialize(json_err);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = format!("{}", err);
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(format!("{}", err), "execution failed");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let cli_err: CliError = io_err.into();
        match cli_err {
            CliError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            _ => panic!("expected Io error variant"),
        }
    }

    #[test]
    fn test_from_core_error() {
        let core_err = OpsconfError::Config(ConfigError::FileNotFound {
            path: "test.toml".to_owned(),
        });
        let cli_err: CliError = core_err.into();
        assert!(matches!(cli_err, CliError::Core(_)), "expected Core error variant");
    }
}
