//! In-process messaging for the lectern pipeline.
//!
//! This crate provides:
//! - The per-video progress event broker (bounded mailboxes, best-effort)
//! - The job message consumed by the worker pool

pub mod broker;
pub mod error;
pub mod job;

pub use broker::{EventBroker, Subscription, DEFAULT_MAILBOX_CAPACITY};
pub use error::{QueueError, QueueResult};
pub use job::ProcessVideoJob;
