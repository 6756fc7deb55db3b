//! Rollback behaviour against a real directory tree.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use pwaify_txn::{TransactionLog, TxnError};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn temp_root() -> (TempDir, Utf8PathBuf) {
    let td = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf8");
    (td, root)
}

/// Every regular file under `root`, relative path -> bytes.
fn snapshot(root: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("read_dir") {
            let entry = entry.expect("entry");
            let path = Utf8PathBuf::from_path_buf(entry.path()).expect("utf8");
            if path.is_dir() {
                out.insert(format!("{}/", path.strip_prefix(root).unwrap()), Vec::new());
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string();
                out.insert(rel, fs::read(&path).expect("read"));
            }
        }
    }
    out
}

#[test]
fn rollback_restores_preexisting_bytes_and_removes_new_files() {
    let (_td, root) = temp_root();
    fs::create_dir_all(root.join("public")).unwrap();
    fs::write(root.join("public/index.html"), "<html><head></head></html>").unwrap();
    fs::write(root.join("public/manifest.json"), "{\"name\":\"old\"}").unwrap();
    let before = snapshot(&root);

    let mut log = TransactionLog::new(&root);
    log.write_file(Utf8Path::new("public/manifest.json"), b"{\"name\":\"new\"}")
        .unwrap();
    log.backup_file(Utf8Path::new("public/index.html")).unwrap();
    fs::write(root.join("public/index.html"), "<html>changed</html>").unwrap();
    log.write_file(Utf8Path::new("public/icons/icon-192x192.png"), b"png")
        .unwrap();
    log.write_file(Utf8Path::new("public/sw.js"), b"self.addEventListener()")
        .unwrap();

    let report = log.rollback().unwrap();

    assert_eq!(snapshot(&root), before);
    assert!(report.is_clean());
    assert_eq!(report.restored_files.len(), 2);
    assert_eq!(report.removed_dirs, vec![root.join("public/icons")]);
}

#[test]
fn tracking_the_same_file_twice_registers_it_once() {
    let (_td, root) = temp_root();
    let mut log = TransactionLog::new(&root);

    fs::write(root.join("sw.js"), "x").unwrap();
    assert!(log.track_created_file(Utf8Path::new("sw.js")).unwrap());
    assert!(!log.track_created_file(Utf8Path::new("./sw.js")).unwrap());
    assert_eq!(log.state().created_files().count(), 1);

    // Removed behind the log's back: rollback must not fail.
    fs::remove_file(root.join("sw.js")).unwrap();
    let report = log.rollback().unwrap();
    assert!(report.failures.is_empty());
    assert!(report.removed_files.is_empty());
}

#[test]
fn first_backup_wins_over_later_mutations() {
    let (_td, root) = temp_root();
    fs::write(root.join("index.html"), "original").unwrap();
    let mut log = TransactionLog::new(&root);

    assert!(log.backup_file(Utf8Path::new("index.html")).unwrap());
    fs::write(root.join("index.html"), "intermediate").unwrap();
    assert!(!log.backup_file(Utf8Path::new("index.html")).unwrap());
    fs::write(root.join("index.html"), "final").unwrap();

    assert_eq!(
        log.backups()[0].original_content.as_deref(),
        Some(&b"original"[..])
    );
    log.rollback().unwrap();
    assert_eq!(fs::read_to_string(root.join("index.html")).unwrap(), "original");
}

#[test]
fn directory_with_untracked_file_survives_rollback() {
    let (_td, root) = temp_root();
    let mut log = TransactionLog::new(&root);

    log.write_file(Utf8Path::new("icons/icon-72x72.png"), b"a")
        .unwrap();
    fs::write(root.join("icons/stranger.txt"), "not ours").unwrap();

    let report = log.rollback().unwrap();

    assert!(!root.join("icons/icon-72x72.png").exists());
    assert!(root.join("icons/stranger.txt").exists());
    assert_eq!(report.retained_dirs.len(), 1);
    assert_eq!(report.retained_dirs[0].path, root.join("icons"));
    assert_eq!(
        report.retained_dirs[0].untracked_entries,
        vec!["stranger.txt".to_string()]
    );
    assert!(report.failures.is_empty());
}

#[test]
fn nested_created_dirs_are_removed_deepest_first() {
    let (_td, root) = temp_root();
    let mut log = TransactionLog::new(&root);

    log.write_file(Utf8Path::new("a/b/c/file.txt"), b"x").unwrap();
    let report = log.rollback().unwrap();

    assert_eq!(
        report.removed_dirs,
        vec![root.join("a/b/c"), root.join("a/b"), root.join("a")]
    );
    assert!(!root.join("a").exists());
}

#[test]
fn backed_up_missing_path_is_deleted_and_parent_dir_cleaned() {
    let (_td, root) = temp_root();
    let mut log = TransactionLog::new(&root);

    log.create_dir_all(Utf8Path::new("out")).unwrap();
    log.backup_file(Utf8Path::new("out/late.txt")).unwrap();
    fs::write(root.join("out/late.txt"), "x").unwrap();

    let report = log.rollback().unwrap();

    assert!(!root.join("out").exists());
    assert!(report.retained_dirs.is_empty());
    assert_eq!(report.removed_files, vec![root.join("out/late.txt")]);
}

#[test]
fn failed_restore_does_not_abort_remaining_steps() {
    let (_td, root) = temp_root();
    fs::write(root.join("a.txt"), "a").unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();
    let mut log = TransactionLog::new(&root);

    log.write_file(Utf8Path::new("a.txt"), b"A").unwrap();
    log.write_file(Utf8Path::new("b.txt"), b"B").unwrap();
    // Replace a.txt with a directory so restoring it fails.
    fs::remove_file(root.join("a.txt")).unwrap();
    fs::create_dir_all(root.join("a.txt/inner")).unwrap();

    let report = log.rollback().unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, root.join("a.txt"));
    assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "b");
}

#[test]
fn finalized_log_rejects_new_tracking() {
    let (_td, root) = temp_root();
    let mut log = TransactionLog::new(&root);
    log.rollback().unwrap();

    assert!(matches!(
        log.track_created_file(Utf8Path::new("x")).unwrap_err(),
        TxnError::Finalized { .. }
    ));
}

#[derive(Debug, Clone)]
enum Op {
    Write { file: usize, content: Vec<u8> },
    Backup { file: usize },
}

const FILES: [&str; 5] = [
    "index.html",
    "public/manifest.json",
    "public/icons/icon-192x192.png",
    "templates/base.html",
    "sw.js",
];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..FILES.len(), proptest::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(file, content)| Op::Write { file, content }),
        (0..FILES.len()).prop_map(|file| Op::Backup { file }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn rollback_always_returns_tree_to_its_starting_state(
        existing in proptest::collection::vec(any::<bool>(), FILES.len()),
        ops in proptest::collection::vec(op_strategy(), 0..16),
    ) {
        let (_td, root) = temp_root();
        for (i, present) in existing.iter().enumerate() {
            if *present {
                let path = root.join(FILES[i]);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, format!("seed-{i}")).unwrap();
            }
        }
        let before = snapshot(&root);

        let mut log = TransactionLog::new(&root);
        for op in &ops {
            match op {
                Op::Write { file, content } => {
                    log.write_file(Utf8Path::new(FILES[*file]), content).unwrap();
                }
                Op::Backup { file } => {
                    log.backup_file(Utf8Path::new(FILES[*file])).unwrap();
                }
            }
        }
        let report = log.rollback().unwrap();

        prop_assert!(report.failures.is_empty());
        prop_assert_eq!(snapshot(&root), before);
    }
}
