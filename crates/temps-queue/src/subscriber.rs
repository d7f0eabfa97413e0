//! Background subscriber that drains the ingest queue.
//!
//! The preprocessing pipeline runs outside this service. When no external
//! consumer is wired in, the logging subscriber keeps the broadcast channel
//! open and records every hand-off so admissions are not rejected for lack of
//! a listener.

use temps_core::{Job, JobReceiver, QueueError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Spawn a task that logs every job received until the channel closes.
pub fn spawn_job_logger(mut receiver: Box<dyn JobReceiver>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0usize;
        loop {
            match receiver.recv().await {
                Ok(job) => {
                    handled += 1;
                    log_job(&job);
                }
                Err(QueueError::ChannelClosed) => break,
                Err(e) => warn!("Ingest queue subscriber error: {}", e),
            }
        }
        info!("Ingest queue closed after {} job(s)", handled);
        handled
    })
}

fn log_job(job: &Job) {
    let task = job.task();
    info!(
        queue = job.queue_name(),
        event_id = %task.event_id,
        cache_key = %task.cache_key,
        start_time = %task.start_time,
        "Handed event to preprocessing"
    );
}
