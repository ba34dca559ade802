use std::fs;
use std::path::{Path, PathBuf};

use phoenix_core::{
    list_backup, reconcile, run_recovery, ExcludeMatcher, ReconciliationDecision,
    RecoveryEventKind, RecoveryOptions,
};
use tempfile::TempDir;

struct Trees {
    _temp: TempDir,
    original: PathBuf,
    backup: PathBuf,
}

impl Trees {
    fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let original = temp.path().join("original");
        let backup = temp.path().join("backup");
        fs::create_dir_all(&original).expect("mkdir original");
        fs::create_dir_all(&backup).expect("mkdir backup");
        Self {
            _temp: temp,
            original,
            backup,
        }
    }

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parent");
        }
        fs::write(path, content).expect("write file");
    }

    fn options(&self, dry_run: bool) -> RecoveryOptions {
        RecoveryOptions {
            original_root: self.original.clone(),
            backup_root: self.backup.clone(),
            dry_run,
            ..RecoveryOptions::default()
        }
    }

    fn read_original(&self, relative: &str) -> Vec<u8> {
        fs::read(self.original.join(relative)).expect("read original")
    }
}

#[test]
fn identical_trees_match_without_writes() {
    let trees = Trees::new();
    Trees::write(&trees.original, "a.txt", b"same");
    Trees::write(&trees.backup, "a.txt", b"same");
    Trees::write(&trees.original, "nested/b.bin", b"\x00\x01\x02");
    Trees::write(&trees.backup, "nested/b.bin", b"\x00\x01\x02");
    let before = fs::metadata(trees.original.join("a.txt"))
        .and_then(|m| m.modified())
        .expect("mtime");

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(output.report.summary.inspected, 2);
    assert_eq!(output.report.summary.matched, 2);
    assert_eq!(output.report.summary.restored, 0);
    let after = fs::metadata(trees.original.join("a.txt"))
        .and_then(|m| m.modified())
        .expect("mtime");
    assert_eq!(before, after);
}

#[test]
fn mismatch_is_restored_from_backup() {
    let trees = Trees::new();
    Trees::write(&trees.original, "a.txt", b"hello");
    Trees::write(&trees.backup, "a.txt", b"HELLO");

    let decisions = reconcile(&trees.original, &trees.backup, &ExcludeMatcher::none())
        .map(|item| item.expect("classification").decision)
        .collect::<Vec<_>>();
    assert_eq!(decisions, vec![ReconciliationDecision::Mismatch]);

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(trees.read_original("a.txt"), b"HELLO");
    assert_eq!(output.report.summary.restored, 1);
    assert_eq!(output.events.len(), 1);
    assert_eq!(output.events[0].kind, RecoveryEventKind::Restored);
    assert_eq!(output.events[0].relative_path.as_deref(), Some("a.txt"));
}

#[test]
fn dry_run_reports_without_modifying() {
    let trees = Trees::new();
    Trees::write(&trees.original, "docs/a.txt", b"hello");
    Trees::write(&trees.backup, "docs/a.txt", b"HELLO");

    let output = run_recovery(&trees.options(true)).expect("run");

    assert_eq!(trees.read_original("docs/a.txt"), b"hello");
    assert_eq!(output.report.summary.restored, 1);
    assert!(output.report.summary.dry_run);
    assert_eq!(output.events[0].kind, RecoveryEventKind::SimulatedRestore);
}

#[test]
fn second_pass_after_restore_only_matches() {
    let trees = Trees::new();
    Trees::write(&trees.original, "a.txt", b"hello");
    Trees::write(&trees.backup, "a.txt", b"HELLO");
    Trees::write(&trees.original, "b/c.txt", b"corrupt");
    Trees::write(&trees.backup, "b/c.txt", b"clean");

    let first = run_recovery(&trees.options(false)).expect("first run");
    assert_eq!(first.report.summary.restored, 2);

    let second = run_recovery(&trees.options(false)).expect("second run");
    assert_eq!(second.report.summary.restored, 0);
    assert_eq!(second.report.summary.matched, 2);
    assert!(second
        .events
        .iter()
        .all(|event| event.kind == RecoveryEventKind::Matched));
}

#[test]
fn missing_backup_leaves_original_in_both_modes() {
    for dry_run in [true, false] {
        let trees = Trees::new();
        Trees::write(&trees.original, "b.txt", b"x");

        let output = run_recovery(&trees.options(dry_run)).expect("run");

        assert_eq!(trees.read_original("b.txt"), b"x");
        assert_eq!(output.report.summary.missing_backup, 1);
        assert_eq!(output.report.summary.restored, 0);
        assert_eq!(
            output.events[0].kind,
            RecoveryEventKind::MissingBackupCounterpart
        );
    }
}

#[test]
fn empty_trees_inspect_nothing() {
    let trees = Trees::new();

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(output.report.summary.inspected, 0);
    assert_eq!(output.report.summary.restored, 0);
    assert!(output.events.is_empty());
}

#[test]
fn backup_only_files_are_not_backfilled() {
    let trees = Trees::new();
    Trees::write(&trees.backup, "deleted.txt", b"only in backup");

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(output.report.summary.inspected, 0);
    assert!(!trees.original.join("deleted.txt").exists());
}

#[test]
fn empty_files_compare_by_content() {
    let trees = Trees::new();
    Trees::write(&trees.original, "empty", b"");
    Trees::write(&trees.backup, "empty", b"");
    Trees::write(&trees.original, "truncated", b"");
    Trees::write(&trees.backup, "truncated", b"data");

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(output.report.summary.matched, 1);
    assert_eq!(output.report.summary.restored, 1);
    assert_eq!(trees.read_original("truncated"), b"data");
}

#[cfg(unix)]
#[test]
fn unreadable_original_does_not_stop_the_pass() {
    use std::os::unix::fs::PermissionsExt;

    let trees = Trees::new();
    Trees::write(&trees.original, "a_locked.txt", b"secret");
    Trees::write(&trees.backup, "a_locked.txt", b"SECRET");
    Trees::write(&trees.original, "b.txt", b"hello");
    Trees::write(&trees.backup, "b.txt", b"HELLO");

    let locked = trees.original.join("a_locked.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
    if fs::read(&locked).is_ok() {
        // Privileged users bypass file modes; nothing to exercise here.
        return;
    }

    let output = run_recovery(&trees.options(false)).expect("run");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).expect("chmod back");

    assert_eq!(output.report.summary.inspected, 2);
    assert_eq!(output.report.summary.unreadable, 1);
    assert_eq!(output.report.summary.restored, 1);
    assert_eq!(output.events[0].kind, RecoveryEventKind::UnreadableOriginal);
    assert!(output.events[0].detail.is_some());
    assert_eq!(trees.read_original("b.txt"), b"HELLO");
}

#[test]
fn metadata_only_difference_is_a_match() {
    use std::fs::{File, FileTimes};
    use std::time::{Duration, SystemTime};

    let trees = Trees::new();
    Trees::write(&trees.original, "a.txt", b"same");
    Trees::write(&trees.backup, "a.txt", b"same");
    File::options()
        .write(true)
        .open(trees.backup.join("a.txt"))
        .expect("open backup")
        .set_times(
            FileTimes::new()
                .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000)),
        )
        .expect("set mtime");

    let output = run_recovery(&trees.options(false)).expect("run");

    assert_eq!(output.report.summary.matched, 1);
    assert_eq!(output.report.summary.restored, 0);
}

#[test]
fn list_backup_reports_every_backup_file() {
    let trees = Trees::new();
    Trees::write(&trees.backup, "a.txt", b"a");
    Trees::write(&trees.backup, "dir/b.txt", b"b");
    Trees::write(&trees.original, "c.txt", b"c");

    let listing = list_backup(&trees.backup, &[]).expect("listing");

    assert_eq!(listing.files, vec!["a.txt", "dir/b.txt"]);
    assert!(listing.warnings.is_empty());
}

#[test]
fn list_backup_requires_existing_root() {
    let trees = Trees::new();
    let err = list_backup(&trees.backup.join("missing"), &[]).expect_err("missing root");
    assert!(err.is_fatal());
}
