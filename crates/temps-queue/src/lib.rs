//! Implementation of the ingest job queue using tokio channels
//! This crate implements the JobQueue trait from temps-core using tokio's
//! broadcast channel.

pub mod queue;
pub mod subscriber;

pub use queue::*;
pub use subscriber::*;

// Re-export core traits for convenience
pub use temps_core::{Job, JobQueue, JobReceiver, QueueError};
