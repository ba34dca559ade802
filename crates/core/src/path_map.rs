use std::path::{Component, Path, PathBuf};

use crate::error::{RecoveryError, Result};

/// Joins `relative` onto `root` without touching the filesystem.
///
/// Absolute paths, drive prefixes and any `..` segment are rejected so the
/// result can never land outside `root`. `.` segments are dropped.
pub fn resolve(relative: &Path, root: &Path) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0_usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(RecoveryError::invalid_path(
                    relative,
                    "parent-directory segment escapes the root",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(RecoveryError::invalid_path(
                    relative,
                    "path must be relative to the root",
                ));
            }
        }
    }

    if depth == 0 {
        return Err(RecoveryError::invalid_path(
            relative,
            "path does not name a file under the root",
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::resolve;
    use crate::error::RecoveryError;

    #[test]
    fn joins_nested_relative_path() {
        let resolved = resolve(Path::new("docs/a.txt"), Path::new("/srv/original"))
            .expect("valid path");
        let expected: PathBuf = ["/srv/original", "docs", "a.txt"].iter().collect();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn current_dir_segments_are_dropped() {
        let resolved =
            resolve(Path::new("./docs/./a.txt"), Path::new("/root")).expect("valid path");
        assert_eq!(resolved, Path::new("/root").join("docs").join("a.txt"));
    }

    #[test]
    fn rejects_parent_segments() {
        for candidate in ["../etc/passwd", "docs/../../x", "a/.."] {
            let err = resolve(Path::new(candidate), Path::new("/root")).expect_err(candidate);
            assert!(matches!(err, RecoveryError::InvalidPath { .. }), "{candidate}");
        }
    }

    #[test]
    fn rejects_absolute_and_empty_paths() {
        assert!(resolve(Path::new("/etc/passwd"), Path::new("/root")).is_err());
        assert!(resolve(Path::new(""), Path::new("/root")).is_err());
        assert!(resolve(Path::new("."), Path::new("/root")).is_err());
    }
}
