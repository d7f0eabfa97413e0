use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UtcDateTime;

/// Queue consumed by the normal preprocessing worker
pub const PREPROCESS_EVENT_QUEUE: &str = "events.preprocess_event";
/// Queue consumed by the reprocessing flavour of the preprocessing worker
pub const PREPROCESS_EVENT_FROM_REPROCESSING_QUEUE: &str =
    "events.preprocess_event_from_reprocessing";

/// Unit of work handed to the downstream event pipeline.
///
/// The payload itself lives in the payload cache under `cache_key`; the task
/// only references it. `start_time` is the admission wall-clock, not the
/// enqueue time, so the pipeline can account for end-to-end latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestTask {
    pub cache_key: String,
    pub event_id: String,
    pub start_time: UtcDateTime,
    pub from_reprocessing: bool,
}

/// Core job enum containing all possible job types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Job {
    PreprocessEvent(IngestTask),
    PreprocessEventFromReprocessing(IngestTask),
}

impl Job {
    /// Name of the queue this job is routed to
    pub fn queue_name(&self) -> &'static str {
        match self {
            Job::PreprocessEvent(_) => PREPROCESS_EVENT_QUEUE,
            Job::PreprocessEventFromReprocessing(_) => PREPROCESS_EVENT_FROM_REPROCESSING_QUEUE,
        }
    }

    pub fn task(&self) -> &IngestTask {
        match self {
            Job::PreprocessEvent(task) | Job::PreprocessEventFromReprocessing(task) => task,
        }
    }
}

impl From<IngestTask> for Job {
    fn from(task: IngestTask) -> Self {
        if task.from_reprocessing {
            Job::PreprocessEventFromReprocessing(task)
        } else {
            Job::PreprocessEvent(task)
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.task();
        write!(
            f,
            "{}(event_id: {}, cache_key: {})",
            self.queue_name(),
            task.event_id,
            task.cache_key
        )
    }
}

// Core queue abstraction - temps-queue implements this
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to send job: {0}")]
    SendError(String),
    #[error("Failed to receive job: {0}")]
    ReceiveError(String),
    #[error("Queue channel closed")]
    ChannelClosed,
}

/// Core trait for job queue operations
///
/// `send` is a one-way hand-off: it returns once the queue has accepted the
/// job and never waits for a consumer to process it.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Send a job to the queue
    async fn send(&self, job: Job) -> Result<(), QueueError>;

    /// Create a new receiver for jobs
    fn subscribe(&self) -> Box<dyn JobReceiver>;
}

/// Core trait for receiving jobs
#[async_trait]
pub trait JobReceiver: Send {
    /// Receive the next job
    async fn recv(&mut self) -> Result<Job, QueueError>;
}
