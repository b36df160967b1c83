use chrono::{Duration, Utc};

use crate::credentials::MailboxCredentials;
use crate::fetcher::{FetchError, MailFetcher};
use crate::record::RawMessage;

/// Fixture-backed fetcher: serves canned messages with the same contract as
/// the IMAP client. Selected by configuration for offline runs, and doubles
/// as the mail source in tests. When an expected password is set, any other
/// password is rejected the way a real server would.
#[derive(Debug, Clone)]
pub struct FixtureMailFetcher {
    messages: Vec<RawMessage>,
    expected_password: Option<String>,
}

impl FixtureMailFetcher {
    /// Messages are held oldest first, mirroring remote id assignment.
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            expected_password: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_expected_password(mut self, password: impl Into<String>) -> Self {
        self.expected_password = Some(password.into());
        self
    }
}

impl Default for FixtureMailFetcher {
    fn default() -> Self {
        Self::new(sample_messages())
    }
}

impl MailFetcher for FixtureMailFetcher {
    fn fetch(
        &self,
        credentials: &MailboxCredentials,
        max_count: usize,
    ) -> Result<Vec<RawMessage>, FetchError> {
        if let Some(expected) = &self.expected_password {
            if credentials.app_password() != expected {
                return Err(FetchError::Auth("invalid credentials".to_string()));
            }
        }
        Ok(self
            .messages
            .iter()
            .rev()
            .take(max_count)
            .cloned()
            .collect())
    }
}

/// Builds a plain-text RFC822 message with a Date header `days_ago` days in
/// the past.
pub fn raw_message(
    remote_id: &str,
    from: &str,
    subject: &str,
    body: &str,
    days_ago: i64,
) -> RawMessage {
    let date = (Utc::now() - Duration::days(days_ago)).to_rfc2822();
    let payload = format!(
        "From: {from}\r\nSubject: {subject}\r\nDate: {date}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    );
    RawMessage {
        remote_id: remote_id.to_string(),
        payload: payload.into_bytes(),
    }
}

fn sample_messages() -> Vec<RawMessage> {
    vec![
        raw_message(
            "1",
            "no-reply@classroom.google.com",
            "Due tomorrow: Task Submission",
            "IEEEXtreme Training. View assignment.",
            5,
        ),
        raw_message(
            "2",
            "Codeforces@codeforces.com",
            "Codeforces Round 1057 (Div. 2)",
            "Welcome to the regular Codeforces round.",
            1,
        ),
        raw_message(
            "3",
            "hello@duolingo.com",
            "Rami is waiting. Protect your Friend Streak!",
            "It's Spanish time. Current streak: 90",
            0,
        ),
    ]
}
