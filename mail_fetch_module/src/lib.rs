pub mod credentials;
pub mod fetcher;
pub mod fixture;
pub mod imap_fetcher;
pub mod normalize;
pub mod record;

pub use credentials::MailboxCredentials;
pub use fetcher::{FetchError, MailFetcher};
pub use fixture::FixtureMailFetcher;
pub use imap_fetcher::ImapMailFetcher;
pub use normalize::normalize;
pub use record::{EmailRecord, EmailStatus, RawMessage};
