/// Error kinds surfaced by the archiver.
///
/// Environment-level errors (`ConfigurationCorrupt`, `SettingsInvalid`,
/// `TransferUnavailable`) abort the run or phase they occur in. Item-level
/// errors (`Collision`, `TransferFailed`, `FilesystemDenied`) are collected
/// into [`ItemFailure`]s and reported once the phase finishes.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiverError {
    /// The sidecar configuration exists but cannot be parsed.
    #[error("configuration at {path} is corrupt: {reason}")]
    ConfigurationCorrupt { path: PathBuf, reason: String },

    /// The user-level settings file is missing or invalid.
    #[error("settings at {path} are invalid: {reason}")]
    SettingsInvalid { path: PathBuf, reason: String },

    /// An entry with the same name is already staged.
    #[error("'{name}' already exists in the staging area")]
    Collision { name: String },

    /// The external transfer tool is missing or not authenticated.
    #[error("transfer tool unavailable: {reason}")]
    TransferUnavailable { reason: String },

    /// The external transfer tool rejected a single item.
    #[error("transfer of '{name}' failed: {reason}")]
    TransferFailed { name: String, reason: String },

    /// The confirmation source could not be read.
    #[error("could not read confirmation: {0}")]
    PromptFailed(#[source] std::io::Error),

    /// A move, delete, or read was refused by the filesystem.
    #[error("filesystem error on {path}: {source}")]
    FilesystemDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiverError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FilesystemDenied {
            path: path.into(),
            source,
        }
    }
}

/// Result type used across the archiver.
pub type ArchiverResult<T> = Result<T, ArchiverError>;

/// A failure tied to one item of a batch phase.
#[derive(Debug)]
pub struct ItemFailure {
    /// Name of the entry the failure belongs to.
    pub name: String,
    pub error: ArchiverError,
}

impl ItemFailure {
    pub fn new(name: impl Into<String>, error: ArchiverError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}
