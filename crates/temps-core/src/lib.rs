//! Core utilities and types shared across all Temps ingest crates

pub mod jobs;
pub mod problemdetails;
pub use problemdetails::ProblemDetails;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use jobs::*;
pub use utils::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;

// Re-export standard datetime type for use across all crates
pub use types::UtcDateTime;
