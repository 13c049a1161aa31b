//! Error types for lzc-dtl
//!
//! All modules use `DtlResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lzc-dtl operations
pub type DtlResult<T> = Result<T, DtlError>;

/// All errors that can occur while converting a compose project
#[derive(Error, Debug)]
pub enum DtlError {
    // Input descriptor errors
    #[error("Invalid compose file {path}: {reason}")]
    Schema { path: PathBuf, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    // Configuration errors
    #[error("Missing required setting: {0}")]
    Configuration(String),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // External process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {}:\n{output}", describe_exit(*code))]
    ExternalProcess {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{command} did not finish within {secs}s")]
    ProcessTimeout { command: String, secs: u64 },

    #[error("{command} was cancelled")]
    Cancelled { command: String },

    // Packaging errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // Interaction errors
    #[error("Prompt failed: {0}")]
    Prompt(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

impl DtlError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a schema error for the given compose file
    pub fn schema(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error for an offending field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of an external build/pull/tag/push command
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::ExternalProcess { .. }
                | Self::ProcessTimeout { .. }
                | Self::Cancelled { .. }
                | Self::CommandFailed { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Schema { .. } => Some("The file must contain a top-level `services` mapping"),
            Self::Configuration(_) => {
                Some("Pass the missing value as a flag, or drop --non-interactive")
            }
            Self::CommandFailed { .. } => {
                Some("Is docker installed? Run: lzc-dtl config set container_cli podman")
            }
            Self::ProcessTimeout { .. } => {
                Some("Raise the limit with: lzc-dtl config set timeouts.build_secs <secs>")
            }
            Self::ExternalProcess { .. } => {
                Some("Fix the failing command and re-run; cached decisions are kept")
            }
            _ => None,
        }
    }
}
