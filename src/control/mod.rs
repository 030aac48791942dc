//! Control Store: per-key counter metadata
//!
//! Each key owns one control file under `<root>/.file-queue/<key>.key`
//! holding up to three decimal counters as `name = value` lines:
//!
//! ```text
//! key-increment = 7
//! key-count = 3
//! key-popindex = 7
//! ```
//!
//! Writes merge a single changed field into the full record and rewrite
//! the file from offset zero with truncation, so the file is always fully
//! consistent from one writer's perspective. Atomicity across processes is
//! provided externally by the lock coordinator, never here.

use crate::errors::Result;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// On-disk field name for the highest item index ever allocated.
pub const INCREMENT_FIELD: &str = "key-increment";

/// On-disk field name for the current item count.
pub const COUNT_FIELD: &str = "key-count";

/// On-disk field name for the pop cursor.
pub const POP_INDEX_FIELD: &str = "key-popindex";

/// One of the three counters a control file can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    Increment,
    Count,
    PopIndex,
}

impl ControlField {
    /// On-disk field name
    pub fn name(&self) -> &'static str {
        match self {
            ControlField::Increment => INCREMENT_FIELD,
            ControlField::Count => COUNT_FIELD,
            ControlField::PopIndex => POP_INDEX_FIELD,
        }
    }
}

/// In-memory form of one key's control file.
///
/// Fields are `None` until first written; callers apply the defaults
/// (increment absent means the next allocated index is 1, count absent
/// means 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRecord {
    pub increment: Option<u64>,
    pub count: Option<u64>,
    pub pop_index: Option<u64>,
}

impl ControlRecord {
    /// Parse whitespace-tolerant `name = value` lines.
    ///
    /// Unknown names and lines that do not parse as `name = integer` are
    /// ignored, so a foreign or damaged line never poisons the record.
    pub fn parse(text: &str) -> Self {
        let mut record = ControlRecord::default();

        for line in text.lines() {
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<u64>() else {
                continue;
            };

            match name.trim() {
                INCREMENT_FIELD => record.increment = Some(value),
                COUNT_FIELD => record.count = Some(value),
                POP_INDEX_FIELD => record.pop_index = Some(value),
                _ => {}
            }
        }

        record
    }

    /// Serialize all present fields as `name = value` lines.
    ///
    /// Field order matches the order a fresh key's pushes touch them
    /// (increment, count, popindex) so rewrites are deterministic.
    pub fn serialize(&self) -> String {
        let mut content = String::new();
        for (name, value) in [
            (INCREMENT_FIELD, self.increment),
            (COUNT_FIELD, self.count),
            (POP_INDEX_FIELD, self.pop_index),
        ] {
            if let Some(value) = value {
                content.push_str(&format!("{} = {}\n", name, value));
            }
        }
        content
    }

    /// Next item index to allocate: stored increment + 1, or 1 when the
    /// field was never written.
    pub fn next_increment(&self) -> u64 {
        self.increment.unwrap_or(0) + 1
    }

    /// Current item count, 0 when the field was never written.
    pub fn count_or_zero(&self) -> u64 {
        self.count.unwrap_or(0)
    }

    /// Overlay one field.
    pub fn set(&mut self, field: ControlField, value: u64) {
        match field {
            ControlField::Increment => self.increment = Some(value),
            ControlField::Count => self.count = Some(value),
            ControlField::PopIndex => self.pop_index = Some(value),
        }
    }
}

/// Read the full record from an open control-file handle.
///
/// The handle position is rewound first; the cached handles in the queue
/// engine are reused across operations.
pub fn read_record(file: &mut File) -> Result<ControlRecord> {
    file.seek(SeekFrom::Start(0))?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(ControlRecord::parse(&text))
}

/// Merge one changed field into the record and rewrite the file.
///
/// Truncates before writing so a shrinking value (count going from 10 to
/// 9) never leaves stale trailing bytes behind.
pub fn write_field(file: &mut File, field: ControlField, value: u64) -> Result<()> {
    let mut record = read_record(file)?;
    record.set(field, value);

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(record.serialize().as_bytes())?;

    Ok(())
}
