//! # file-queue - Persistent file-backed keyed queue
//!
//! A keyed queue durable across process restarts: multiple independent
//! named queues ("keys"), each an ordered collection of opaque byte
//! payloads, with cross-process mutual exclusion per key.
//!
//! ## Core Principle
//!
//! **The file system IS the database**: any number of processes operate
//! on the same root directory without configuration or awareness of each
//! other. Per-key advisory locks on the control files serialize mutation.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── .file-queue/
//! │   ├── jobs.key          # Control Record: "name = value" counters
//! │   └── mail.key
//! ├── jobs/
//! │   ├── 1                 # Item File: raw payload, named by index
//! │   └── 2
//! └── mail/
//!     └── 1
//! ```
//!
//! ## Semantics
//!
//! - Pop order is most-recently-pushed first (LIFO), scanning downward
//!   from the pop cursor.
//! - Reads are capped at [`READ_SIZE`] bytes; writes are unbounded.
//! - Unknown keys are benign: `pop` returns `None`, `count` returns 0,
//!   `remove` returns `false`.

pub mod control;
pub mod errors;
pub mod item;
pub mod lock;
pub mod queue;

pub use control::{ControlField, ControlRecord};
pub use errors::{FileQueueError, Result};
pub use item::{ItemStore, READ_SIZE};
pub use lock::RetryPolicy;
pub use queue::{FileQueue, CONFIG_DIRNAME};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
