//! TR-007: Error taxonomy.
//!
//! Configuration errors are raised before anything executes and map to
//! exit code 2. Operation failures are never errors here: they are recorded
//! as results by the executor.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid environment, profile, action, or configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment name was registered twice.
    #[error("environment '{name}' is already registered")]
    DuplicateEnvironment { name: String },

    /// A referenced environment is not registered.
    #[error("unknown environment '{name}' (known: {known})")]
    UnknownEnvironment { name: String, known: String },

    /// An environment name contains characters the registry does not accept.
    #[error("invalid environment name '{name}': must match [A-Za-z0-9][A-Za-z0-9_.-]*")]
    InvalidEnvironmentName { name: String },

    /// A profile field resolved to an empty value.
    #[error("invalid profile: {field} must not be empty")]
    InvalidProfile { field: &'static str },

    /// An action name is not one of the recognized actions.
    #[error("unknown action '{name}' (expected one of: init, plan, apply, fmt, fmt-check, refresh)")]
    UnknownAction { name: String },

    /// The parallelism bound is zero.
    #[error("parallelism must be at least 1, got {value}")]
    InvalidParallelism { value: u32 },

    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the schema.
    #[error("YAML parse error: {0}")]
    Parse(String),

    /// Structural validation failed; one message per problem.
    #[error("{} validation error(s): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),

    /// The discovery glob is malformed or unreadable.
    #[error("invalid discover pattern '{pattern}': {reason}")]
    Discover { pattern: String, reason: String },
}

/// Top-level error for a CLI command.
#[derive(Debug, Error)]
pub enum TerraceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local filesystem or output failure outside any operation.
    #[error("{0}")]
    Io(String),
}

impl TerraceError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => crate::core::report::EXIT_INVALID,
            Self::Io(_) => crate::core::report::EXIT_FAILED,
        }
    }
}

/// Convenience result alias.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr007_duplicate_displays_name() {
        let err = ConfigError::DuplicateEnvironment {
            name: "dev".to_string(),
        };
        assert!(err.to_string().contains("'dev'"));
    }

    #[test]
    fn test_tr007_unknown_environment_lists_known() {
        let err = ConfigError::UnknownEnvironment {
            name: "qa".to_string(),
            known: "dev, prod".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("qa"));
        assert!(msg.contains("dev, prod"));
    }

    #[test]
    fn test_tr007_validation_joins_messages() {
        let err = ConfigError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "2 validation error(s): a; b");
    }

    #[test]
    fn test_tr007_exit_codes() {
        let config: TerraceError = ConfigError::InvalidParallelism { value: 0 }.into();
        assert_eq!(config.exit_code(), 2);
        assert_eq!(TerraceError::Io("disk full".to_string()).exit_code(), 1);
    }
}
