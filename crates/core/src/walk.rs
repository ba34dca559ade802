use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{RecoveryError, Result};
use crate::model::{slash_path, FileEntry};

/// Lazily walks every regular file under `root`.
///
/// Each call re-walks the tree. Entries are sorted by file name within a
/// directory so the order is stable for a given tree. Symbolic links are
/// neither followed nor yielded.
pub fn enumerate<'a>(root: &Path, excludes: &'a ExcludeMatcher) -> TreeWalk<'a> {
    let inner = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    TreeWalk {
        root: root.to_path_buf(),
        excludes,
        inner,
    }
}

pub struct TreeWalk<'a> {
    root: PathBuf,
    excludes: &'a ExcludeMatcher,
    inner: walkdir::IntoIter,
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(RecoveryError::unreadable(path, io::Error::from(err))));
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };
            if self.excludes.is_excluded(&relative) {
                if entry.file_type().is_dir() {
                    self.inner.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            return Some(Ok(FileEntry::new(relative, self.root.clone())));
        }
    }
}

/// Exclusion rules matched against root-relative, slash-separated paths.
/// Patterns without glob metacharacters match as case-insensitive substrings.
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
    globset: Option<GlobSet>,
    substrings: Vec<String>,
}

impl ExcludeMatcher {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        if patterns.is_empty() {
            return Self::none();
        }

        let mut builder = GlobSetBuilder::new();
        let mut substrings = Vec::new();
        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }

            if is_plain_substring_pattern(pattern) {
                substrings.push(pattern.to_lowercase());
                continue;
            }

            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => {
                    warnings.push(format!(
                        "invalid exclude glob '{pattern}': {err}; using substring fallback."
                    ));
                    substrings.push(pattern.to_lowercase());
                }
            }
        }

        let globset = match builder.build() {
            Ok(set) if !set.is_empty() => Some(set),
            Ok(_) => None,
            Err(err) => {
                warnings.push(format!(
                    "failed to compile exclude glob set: {err}; glob excludes disabled."
                ));
                None
            }
        };

        Self {
            globset,
            substrings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.globset.is_none() && self.substrings.is_empty()
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.is_empty() {
            return false;
        }

        let normalized = slash_path(relative);
        if let Some(globset) = &self.globset {
            if globset.is_match(&normalized) {
                return true;
            }
        }

        let lowered = normalized.to_lowercase();
        self.substrings
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }
}

fn is_plain_substring_pattern(pattern: &str) -> bool {
    !pattern
        .chars()
        .any(|ch| matches!(ch, '*' | '?' | '[' | ']' | '{' | '}'))
}
