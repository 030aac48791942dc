//! Contract Tests - On-Disk Protocol Invariant Protection
//!
//! These tests pin the durable file formats other processes (and other
//! implementations sharing a database root) depend on:
//!
//! - `<root>/.file-queue/<key>.key` control files with `name = value`
//!   lines and the exact field names key-increment/key-count/key-popindex
//! - `<root>/<key>/<index>` item files with raw payload bytes
//! - Counter arithmetic: increment monotonic, popindex tracks the last
//!   push, count equals pushes minus pops
//!
//! They read and write the files directly, bypassing the library where
//! the contract is about bytes on disk rather than API behavior.

use file_queue::{ControlRecord, FileQueue};
use std::fs;
use tempfile::TempDir;

fn control_text(root: &std::path::Path, key: &str) -> String {
    fs::read_to_string(root.join(".file-queue").join(format!("{}.key", key))).unwrap()
}

/// CONTRACT: control files live at <root>/.file-queue/<key>.key
#[test]
fn contract_control_file_location() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    queue.push("jobs", b"payload").unwrap();

    assert!(root.join(".file-queue").join("jobs.key").is_file());
}

/// CONTRACT: control files are text with "name = value" lines and the
/// exact historical field names
#[test]
fn contract_control_file_format() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    queue.push("jobs", b"a").unwrap();
    queue.push("jobs", b"b").unwrap();

    let text = control_text(&root, "jobs");
    assert!(text.contains("key-increment = 2\n"));
    assert!(text.contains("key-popindex = 2\n"));
    assert!(text.contains("key-count = 2\n"));

    // Every line is exactly "name = value"
    for line in text.lines() {
        let (name, value) = line.split_once(" = ").expect("malformed control line");
        assert!(name.starts_with("key-"));
        value.parse::<u64>().expect("non-integer control value");
    }
}

/// CONTRACT: item files are named by their decimal index, starting at 1,
/// and hold the raw payload bytes
#[test]
fn contract_item_file_layout() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    queue.push("jobs", b"first payload").unwrap();
    queue.push("jobs", b"second payload").unwrap();

    assert_eq!(fs::read(root.join("jobs").join("1")).unwrap(), b"first payload");
    assert_eq!(fs::read(root.join("jobs").join("2")).unwrap(), b"second payload");
}

/// CONTRACT: key-increment never decreases, even across pops that empty
/// the queue
#[test]
fn contract_increment_is_monotonic() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    queue.push("jobs", b"a").unwrap();
    queue.push("jobs", b"b").unwrap();
    queue.pop("jobs").unwrap();
    queue.pop("jobs").unwrap();

    // Queue is empty but the high-water mark stays
    let record = ControlRecord::parse(&control_text(&root, "jobs"));
    assert_eq!(record.increment, Some(2));

    // The next push allocates above it
    queue.push("jobs", b"c").unwrap();
    assert!(root.join("jobs").join("3").is_file());
}

/// CONTRACT: every push sets key-popindex to the new item's index
#[test]
fn contract_push_resets_pop_cursor() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    queue.push("jobs", b"a").unwrap();
    queue.push("jobs", b"b").unwrap();
    queue.pop("jobs").unwrap();

    let record = ControlRecord::parse(&control_text(&root, "jobs"));
    assert_eq!(record.pop_index, Some(1));

    queue.push("jobs", b"c").unwrap();
    let record = ControlRecord::parse(&control_text(&root, "jobs"));
    assert_eq!(record.pop_index, Some(3));
}

/// CONTRACT: popindex <= increment and count <= physical files, after any
/// operation sequence
#[test]
fn contract_counter_invariants_hold() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    let operations = ["push", "push", "pop", "push", "pop", "pop", "pop", "push"];

    for op in operations {
        match op {
            "push" => queue.push("jobs", b"x").unwrap(),
            _ => {
                queue.pop("jobs").unwrap();
            }
        }

        let record = ControlRecord::parse(&control_text(&root, "jobs"));
        let increment = record.increment.unwrap();
        let pop_index = record.pop_index.unwrap();
        let count = record.count.unwrap();

        assert!(pop_index <= increment, "popindex {} > increment {}", pop_index, increment);

        let physical = fs::read_dir(root.join("jobs")).unwrap().count() as u64;
        assert!(count <= physical, "count {} > physical files {}", count, physical);
    }
}

/// CONTRACT: a database written by one instance is readable by a fresh
/// one, including records produced by a foreign writer using the same
/// format
#[test]
fn contract_foreign_writer_interop() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    FileQueue::new(&root).unwrap();

    // Simulate another implementation writing the documented format,
    // with looser whitespace
    fs::create_dir(root.join("mail")).unwrap();
    fs::write(root.join("mail").join("1"), b"from-elsewhere").unwrap();
    fs::write(
        root.join(".file-queue").join("mail.key"),
        "key-increment=1\nkey-count = 1\n  key-popindex = 1\n",
    )
    .unwrap();

    let mut queue = FileQueue::new(&root).unwrap();
    assert_eq!(queue.count("mail").unwrap(), 1);
    assert_eq!(queue.pop("mail").unwrap(), Some(b"from-elsewhere".to_vec()));
}

/// CONTRACT: rewrites truncate; a control file never carries stale bytes
/// from a previous longer record
#[test]
fn contract_control_rewrite_truncates() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("db");
    let mut queue = FileQueue::new(&root).unwrap();

    for i in 0..12u8 {
        queue.push("jobs", &[i]).unwrap();
    }
    for _ in 0..12 {
        queue.pop("jobs").unwrap();
    }

    // count went 12 -> 0 (shorter digits); the file must still parse
    // cleanly line by line
    let text = control_text(&root, "jobs");
    for line in text.lines() {
        assert!(line.split_once(" = ").is_some(), "stale bytes in control file: {:?}", text);
    }
    let record = ControlRecord::parse(&text);
    assert_eq!(record.count, Some(0));
    assert_eq!(record.increment, Some(12));
}
