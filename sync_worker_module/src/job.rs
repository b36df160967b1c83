use std::fmt;

use serde::{Deserialize, Serialize};

use mail_fetch_module::MailboxCredentials;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// One request to synchronize a single mailbox, as carried on the broker
/// queue. Lives only on the wire and in worker memory for the duration of
/// one job; the app password never appears in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub username: String,
    pub app_password: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl SyncJob {
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            app_password: app_password.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(
        username: impl Into<String>,
        app_password: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            batch_size,
            ..Self::new(username, app_password)
        }
    }

    pub fn credentials(&self) -> MailboxCredentials {
        MailboxCredentials::new(&self.username, &self.app_password)
    }
}

impl fmt::Debug for SyncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncJob")
            .field("username", &self.username)
            .field("app_password", &"[REDACTED]")
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("job serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Decode failures are terminal for the message: redelivery cannot fix a
/// malformed payload, so the consumer drops it (poison-message policy).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed job payload: {0}")]
    MalformedPayload(String),
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
}

pub fn encode_job(job: &SyncJob) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(job)?)
}

pub fn decode_job(body: &[u8]) -> Result<SyncJob, DecodeError> {
    let job: SyncJob = serde_json::from_slice(body)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    if job.username.trim().is_empty() {
        return Err(DecodeError::MissingField("username"));
    }
    if job.app_password.trim().is_empty() {
        return Err(DecodeError::MissingField("app_password"));
    }
    if job.batch_size == 0 {
        return Err(DecodeError::MalformedPayload(
            "batch_size must be at least 1".to_string(),
        ));
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let job = SyncJob::with_batch_size("a@x.com", "secret", 25);
        let decoded = decode_job(&encode_job(&job).expect("encode")).expect("decode");
        assert_eq!(decoded, job);
    }

    #[test]
    fn batch_size_defaults_when_absent() {
        let job = decode_job(br#"{"username":"a@x.com","app_password":"pw"}"#).expect("decode");
        assert_eq!(job.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn missing_username_is_rejected() {
        let err = decode_job(br#"{"username":"","app_password":"pw"}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("username"));
    }

    #[test]
    fn missing_password_is_rejected() {
        let err = decode_job(br#"{"username":"a@x.com","app_password":"  "}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("app_password"));
    }

    #[test]
    fn non_json_bytes_are_malformed() {
        let err = decode_job(b"not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));
    }

    #[test]
    fn zero_batch_size_is_malformed() {
        let err =
            decode_job(br#"{"username":"a@x.com","app_password":"pw","batch_size":0}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));
    }

    #[test]
    fn debug_output_redacts_password() {
        let job = SyncJob::new("a@x.com", "hunter2");
        let rendered = format!("{:?}", job);
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
