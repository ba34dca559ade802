use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const REPORT_VERSION: &str = "1.0.0";

/// A file discovered under a root, addressed by its root-independent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    relative: PathBuf,
    root: PathBuf,
}

impl FileEntry {
    pub fn new(relative: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
            root: root.into(),
        }
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path joined with `/` regardless of platform.
    pub fn slash_path(&self) -> String {
        slash_path(&self.relative)
    }
}

pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationDecision {
    Match,
    Mismatch,
    MissingBackupCounterpart,
    UnreadableOriginal,
    UnreadableBackup,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub entry: FileEntry,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub decision: ReconciliationDecision,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    SimulatedRestore { path: PathBuf },
    Restored { path: PathBuf },
    RestoreFailed { path: PathBuf, error: String },
}

impl RecoveryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventKind {
    Matched,
    Restored,
    SimulatedRestore,
    RestoreFailed,
    MissingBackupCounterpart,
    UnreadableOriginal,
    UnreadableBackup,
    InvalidPath,
}

impl RecoveryEventKind {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::RestoreFailed
                | Self::UnreadableOriginal
                | Self::UnreadableBackup
                | Self::InvalidPath
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryEvent {
    pub seq: u64,
    pub run_id: String,
    pub kind: RecoveryEventKind,
    pub relative_path: Option<String>,
    pub original_path: Option<String>,
    pub detail: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub inspected: u64,
    pub matched: u64,
    /// Includes simulated restores when `dry_run` is set.
    pub restored: u64,
    pub failed: u64,
    pub missing_backup: u64,
    pub unreadable: u64,
    pub invalid_paths: u64,
    pub dry_run: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record(&mut self, kind: RecoveryEventKind) {
        match kind {
            RecoveryEventKind::Matched => self.matched += 1,
            RecoveryEventKind::Restored | RecoveryEventKind::SimulatedRestore => {
                self.restored += 1
            }
            RecoveryEventKind::RestoreFailed => self.failed += 1,
            RecoveryEventKind::MissingBackupCounterpart => self.missing_backup += 1,
            RecoveryEventKind::UnreadableOriginal | RecoveryEventKind::UnreadableBackup => {
                self.unreadable += 1
            }
            RecoveryEventKind::InvalidPath => self.invalid_paths += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub report_version: String,
    pub run_id: String,
    pub generated_at: String,
    pub original_root: String,
    pub backup_root: String,
    pub dry_run: bool,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupListing {
    pub backup_root: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
