//! Crash-safe local document store.
//!
//! This crate provides:
//! - Atomic (temp file + rename) JSON document writes
//! - Video and window document persistence
//! - The media directory layout and public locators for stage artifacts

pub mod atomic;
pub mod error;
pub mod layout;
pub mod store;

pub use atomic::{read_json, write_json_atomic};
pub use error::{StorageError, StorageResult};
pub use layout::MediaLayout;
pub use store::StateStore;
