use std::sync::Arc;

use temps_core::async_trait::async_trait;
use temps_core::{Job, JobQueue, JobReceiver, QueueError};
use tokio::sync::broadcast;
use tracing::{debug, error};

#[derive(Clone)]
pub struct BroadcastQueueService {
    broadcast_sender: broadcast::Sender<Job>,
}

// Wrapper for broadcast::Receiver to implement JobReceiver trait
pub struct BroadcastJobReceiver {
    receiver: broadcast::Receiver<Job>,
}

#[async_trait]
impl JobReceiver for BroadcastJobReceiver {
    async fn recv(&mut self) -> Result<Job, QueueError> {
        let result = self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => {
                error!("Broadcast channel closed");
                QueueError::ChannelClosed
            }
            broadcast::error::RecvError::Lagged(n) => {
                error!("⚠️ Receiver lagged by {} messages", n);
                QueueError::ReceiveError(format!("Receiver lagged by {} messages", n))
            }
        });

        if let Ok(job) = &result {
            debug!("📨 Received job: {}", job);
        }

        result
    }
}

#[async_trait]
impl JobQueue for BroadcastQueueService {
    async fn send(&self, job: Job) -> Result<(), QueueError> {
        let subscriber_count = self.broadcast_sender.receiver_count();
        debug!(
            "🚀 Dispatching job {} to {} subscriber(s)",
            job, subscriber_count
        );

        // Without a subscriber the job would be lost silently, so the send fails.
        self.broadcast_sender.send(job).map_err(|e| {
            error!(
                "🚨 No subscribers listening on the ingest queue, job dropped: {}",
                e.0
            );
            QueueError::SendError(format!("Broadcast send failed: {}", e))
        })?;

        Ok(())
    }

    fn subscribe(&self) -> Box<dyn JobReceiver> {
        Box::new(BroadcastJobReceiver {
            receiver: self.broadcast_sender.subscribe(),
        })
    }
}

impl BroadcastQueueService {
    pub fn new(broadcast_sender: broadcast::Sender<Job>) -> Self {
        Self { broadcast_sender }
    }

    pub fn create_broadcast_channel(
        buffer_size: usize,
    ) -> (BroadcastQueueService, broadcast::Receiver<Job>) {
        debug!(
            "🔧 Creating broadcast channel with buffer size: {}",
            buffer_size
        );
        let (sender, receiver) = broadcast::channel(buffer_size);
        (BroadcastQueueService::new(sender), receiver)
    }

    /// Create a new broadcast queue that implements the JobQueue trait
    /// Returns (queue, keep_alive_receiver) - the receiver must be kept alive!
    pub fn create_job_queue_arc_with_receiver(
        buffer_size: usize,
    ) -> (Arc<dyn JobQueue>, broadcast::Receiver<Job>) {
        let (queue, receiver) = Self::create_broadcast_channel(buffer_size);
        (Arc::new(queue), receiver)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcast_sender.receiver_count()
    }
}
