use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw message as pulled off the remote mailbox. Owned by the fetcher
/// for the duration of a single fetch call and discarded once normalized.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Identifier assigned by the remote server, monotonic per mailbox.
    pub remote_id: String,
    pub payload: Vec<u8>,
}

/// Provenance of a stored email record. `LiveFetched` marks rows written by
/// the sync pipeline, as opposed to locally sourced `Unread`/`Read` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Unread,
    Read,
    LiveFetched,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Unread => "UNREAD",
            EmailStatus::Read => "READ",
            EmailStatus::LiveFetched => "LIVE_FETCHED",
        }
    }
}

/// Canonical email shape handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub sender: String,
    pub subject: String,
    #[serde(default)]
    pub body_snippet: Option<String>,
    pub status: EmailStatus,
    /// Local-calendar days since the message was received. `None` when the
    /// origination date could not be parsed; never coerced to zero.
    #[serde(default)]
    pub days_ago: Option<i64>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_as_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&EmailStatus::LiveFetched).unwrap(),
            "\"LIVE_FETCHED\""
        );
        assert_eq!(EmailStatus::Unread.as_str(), "UNREAD");
    }
}
