//! Live progress fan-out for jobs, on top of a tokio broadcast channel.

use crate::model::JobId;
use serde_json::Value;
use tokio::sync::broadcast;

/// High-throughput publisher for job progress events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedProgress>,
}

/// A progress event that has been published to live subscribers.
#[derive(Debug, Clone)]
pub struct PublishedProgress {
    pub job_id: JobId,
    pub code: String,
    pub message: String,
    pub percentage: Option<u8>,
    pub data: Option<Value>,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a progress event.
    ///
    /// A send with no subscribers is not an error; progress is still recorded
    /// by the status reporter and subscribers are optional.
    pub fn publish(&self, event: PublishedProgress) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the live progress stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedProgress> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
