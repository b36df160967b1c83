use crate::credentials::MailboxCredentials;
use crate::record::RawMessage;

/// Failure surfaced by a mail fetcher. `Auth` is terminal for the job:
/// the same credentials will fail again on redelivery.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("mailbox authentication failed: {0}")]
    Auth(String),
    #[error("mailbox connection failed: {0}")]
    Connection(String),
    #[error("mailbox protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Auth(_))
    }
}

/// Capability interface for pulling a bounded batch of raw messages from a
/// mailbox. Two variants exist: the IMAP client and the fixture source,
/// selected by worker configuration.
pub trait MailFetcher: Send + Sync {
    /// Fetches at most `max_count` messages, most recent first. A failure
    /// retrieving an individual message skips that message; only failures
    /// that prevent the fetch from starting surface as an error.
    fn fetch(
        &self,
        credentials: &MailboxCredentials,
        max_count: usize,
    ) -> Result<Vec<RawMessage>, FetchError>;
}
