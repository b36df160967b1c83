use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("broker error: {0}")]
    Broker(String),
    #[error("broker config error: {0}")]
    Config(String),
    #[error("unknown delivery handle {0}")]
    UnknownDelivery(Uuid),
}

/// One in-flight delivery. The body is the raw wire payload; decoding is the
/// codec's job, so the consumer can still acknowledge a malformed message.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub body: Vec<u8>,
}

/// Capability interface over the broker queue. At-least-once delivery: a
/// claimed message is redelivered unless acknowledged, and `release` hands
/// it back early (kept for the flagged requeue-on-transient-failure policy;
/// the current consumer acknowledges every decoded job).
pub trait JobQueue: Send + Sync {
    fn publish(&self, body: &[u8]) -> Result<(), JobQueueError>;
    fn claim_next(&self) -> Result<Option<ClaimedJob>, JobQueueError>;
    fn acknowledge(&self, id: &Uuid) -> Result<(), JobQueueError>;
    fn release(&self, id: &Uuid) -> Result<(), JobQueueError>;
}
