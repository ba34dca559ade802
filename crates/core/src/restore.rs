use std::fs::{self, File, FileTimes};
use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::RecoveryError;
use crate::model::RecoveryOutcome;

/// Restores `original` from `backup`, or only reports that it would.
///
/// This is the only place that writes into the working tree. A dry run
/// trusts the caller's classification and does not touch either file.
pub fn restore(original: &Path, backup: &Path, dry_run: bool) -> RecoveryOutcome {
    if dry_run {
        info!("[dry run] would restore {} from backup", original.display());
        return RecoveryOutcome::SimulatedRestore {
            path: original.to_path_buf(),
        };
    }

    match copy_with_metadata(backup, original) {
        Ok(()) => {
            info!("restored {} from {}", original.display(), backup.display());
            RecoveryOutcome::Restored {
                path: original.to_path_buf(),
            }
        }
        Err(source) => {
            let error = source.to_string();
            warn!("{}", RecoveryError::restore_failed(original, source));
            RecoveryOutcome::RestoreFailed {
                path: original.to_path_buf(),
                error,
            }
        }
    }
}

/// Seam between the engine and the code that mutates the working tree.
pub(crate) trait RestoreExecutor {
    fn restore(&self, original: &Path, backup: &Path, dry_run: bool) -> RecoveryOutcome;
}

pub(crate) struct FsExecutor;

impl RestoreExecutor for FsExecutor {
    fn restore(&self, original: &Path, backup: &Path, dry_run: bool) -> RecoveryOutcome {
        restore(original, backup, dry_run)
    }
}

/// Stages the bytes of `source` next to `target`, carries over the
/// access/modification times and permission bits, then renames the staged
/// file over `target`. `target` is untouched unless every step succeeds.
fn copy_with_metadata(source: &Path, target: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("backup {} is not a regular file", source.display()),
        ));
    }

    let parent = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(parent)?;

    let mut reader = File::open(source)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    staged.as_file().set_times(times)?;
    staged.as_file().set_permissions(metadata.permissions())?;

    staged.persist(target).map_err(|err| err.error)?;
    Ok(())
}
