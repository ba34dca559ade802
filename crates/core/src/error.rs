use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, RecoveryError>;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// A root is missing or unusable. Fatal for the whole run.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("unreadable {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("restore failed for {}: {source}", .path.display())]
    RestoreFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid relative path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },
}

impl RecoveryError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub fn restore_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RestoreFailed {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error means "the file is not there", as opposed to
    /// "the file is there but could not be read".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Unreadable { source, .. } | Self::RestoreFailed { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}
