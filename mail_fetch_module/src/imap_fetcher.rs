use std::net::TcpStream;

use native_tls::TlsStream;
use tracing::{debug, warn};

use crate::credentials::MailboxCredentials;
use crate::fetcher::{FetchError, MailFetcher};
use crate::record::RawMessage;

pub const GMAIL_IMAP_HOST: &str = "imap.gmail.com";
pub const IMAPS_PORT: u16 = 993;

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// Mailbox protocol client: opens an authenticated IMAPS session, pulls the
/// newest messages from the inbox, and logs out on every exit path.
#[derive(Debug, Clone)]
pub struct ImapMailFetcher {
    host: String,
    port: u16,
}

impl ImapMailFetcher {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn gmail() -> Self {
        Self::new(GMAIL_IMAP_HOST, IMAPS_PORT)
    }

    fn open_session(&self, credentials: &MailboxCredentials) -> Result<ImapSession, FetchError> {
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|err| FetchError::Connection(err.to_string()))?;
        let client = imap::connect((self.host.as_str(), self.port), self.host.as_str(), &tls)
            .map_err(transport_error)?;
        client
            .login(credentials.username(), credentials.app_password())
            .map_err(|(err, _client)| login_error(err))
    }
}

impl MailFetcher for ImapMailFetcher {
    fn fetch(
        &self,
        credentials: &MailboxCredentials,
        max_count: usize,
    ) -> Result<Vec<RawMessage>, FetchError> {
        debug!("connecting to {} as {}", self.host, credentials.username());
        let mut session = self.open_session(credentials)?;
        let result = fetch_latest(&mut session, max_count);
        // Teardown happens whether the fetch succeeded or not. A failed
        // logout is not worth failing an otherwise good batch over.
        if let Err(err) = session.logout() {
            debug!("imap logout failed: {}", err);
        }
        result
    }
}

fn fetch_latest(session: &mut ImapSession, max_count: usize) -> Result<Vec<RawMessage>, FetchError> {
    session.select("INBOX").map_err(protocol_error)?;

    let mut ids: Vec<u32> = session
        .search("ALL")
        .map_err(protocol_error)?
        .into_iter()
        .collect();
    ids.sort_unstable();
    // The server assigns ids monotonically, so the highest ids are the
    // newest messages.
    let latest: Vec<u32> = ids.into_iter().rev().take(max_count).collect();

    let mut messages = Vec::with_capacity(latest.len());
    for id in latest {
        // One message at a time: a retrieval error skips that message
        // rather than aborting the whole batch.
        let fetches = match session.fetch(id.to_string(), "(RFC822)") {
            Ok(fetches) => fetches,
            Err(err) => {
                warn!("skipping message {}: fetch failed: {}", id, err);
                continue;
            }
        };
        let Some(body) = fetches.iter().next().and_then(|fetch| fetch.body()) else {
            warn!("skipping message {}: no body returned", id);
            continue;
        };
        messages.push(RawMessage {
            remote_id: id.to_string(),
            payload: body.to_vec(),
        });
    }
    Ok(messages)
}

fn login_error(err: imap::Error) -> FetchError {
    match err {
        imap::Error::No(reason) | imap::Error::Bad(reason) => FetchError::Auth(reason),
        other => transport_error(other),
    }
}

fn transport_error(err: imap::Error) -> FetchError {
    match err {
        imap::Error::Io(err) => FetchError::Connection(err.to_string()),
        imap::Error::Tls(err) => FetchError::Connection(err.to_string()),
        imap::Error::TlsHandshake(err) => FetchError::Connection(err.to_string()),
        imap::Error::ConnectionLost => FetchError::Connection("connection lost".to_string()),
        other => FetchError::Protocol(other.to_string()),
    }
}

fn protocol_error(err: imap::Error) -> FetchError {
    transport_error(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_rejections_map_to_auth_failure() {
        let err = login_error(imap::Error::No("invalid credentials".to_string()));
        assert!(matches!(err, FetchError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn io_errors_map_to_connection_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = transport_error(imap::Error::Io(io));
        assert!(matches!(err, FetchError::Connection(_)));
        assert!(err.is_retryable());
    }
}
