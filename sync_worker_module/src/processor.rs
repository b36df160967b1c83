use tracing::{info, warn};

use mail_fetch_module::{normalize, MailFetcher};

use crate::email_store::{EmailStore, SyncOutcome};
use crate::job::SyncJob;

/// Runs one sync job end to end: fetch, normalize, persist. Every failure
/// mode is folded into the returned `SyncOutcome`; this never propagates an
/// error up to the consume loop.
pub struct SyncProcessor<'a> {
    fetcher: &'a dyn MailFetcher,
    store: &'a dyn EmailStore,
}

impl<'a> SyncProcessor<'a> {
    pub fn new(fetcher: &'a dyn MailFetcher, store: &'a dyn EmailStore) -> Self {
        Self { fetcher, store }
    }

    pub fn process(&self, job: &SyncJob) -> SyncOutcome {
        let credentials = job.credentials();
        let raw = match self.fetcher.fetch(&credentials, job.batch_size) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("fetch failed for {}: {}", job.username, err);
                return SyncOutcome::fetch_failed(err);
            }
        };
        if raw.is_empty() {
            info!("no new mail for {}", job.username);
            return SyncOutcome::default();
        }

        let records: Vec<_> = raw
            .iter()
            .map(|message| (message.remote_id.clone(), normalize(message)))
            .collect();
        let outcome = self.store.save_all(&records);
        info!(
            "saved {}/{} emails for {}",
            outcome.succeeded, outcome.attempted, job.username
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use mail_fetch_module::{EmailRecord, FixtureMailFetcher};

    use super::*;
    use crate::email_store::StoreError;

    #[derive(Default)]
    struct MemStore {
        rows: Mutex<Vec<EmailRecord>>,
        fail_on: Vec<String>,
        save_calls: AtomicUsize,
    }

    impl MemStore {
        fn failing_on(ids: &[&str]) -> Self {
            Self {
                fail_on: ids.iter().map(|id| id.to_string()).collect(),
                ..Self::default()
            }
        }

        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    impl EmailStore for MemStore {
        fn save(&self, remote_id: &str, record: &EmailRecord) -> Result<(), StoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.iter().any(|id| id == remote_id) {
                return Err(StoreError::Config(format!("injected failure for {remote_id}")));
            }
            self.rows.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[test]
    fn full_batch_is_persisted() {
        let fetcher = FixtureMailFetcher::default();
        let store = MemStore::default();
        let processor = SyncProcessor::new(&fetcher, &store);

        let outcome = processor.process(&SyncJob::new("a@x.com", "pw"));

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.succeeded, 3);
        assert!(outcome.is_clean());
        assert_eq!(store.row_count(), 3);
    }

    #[test]
    fn auth_failure_persists_nothing() {
        let fetcher = FixtureMailFetcher::default().with_expected_password("right");
        let store = MemStore::default();
        let processor = SyncProcessor::new(&fetcher, &store);

        let outcome = processor.process(&SyncJob::new("a@x.com", "wrong"));

        assert_eq!(outcome.attempted, 0);
        assert!(outcome.fetch_error.is_some());
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn empty_mailbox_skips_storage_entirely() {
        let fetcher = FixtureMailFetcher::empty();
        let store = MemStore::default();
        let processor = SyncProcessor::new(&fetcher, &store);

        let outcome = processor.process(&SyncJob::new("a@x.com", "pw"));

        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.succeeded, 0);
        assert!(outcome.is_clean());
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn partial_failure_keeps_the_rest() {
        let fetcher = FixtureMailFetcher::default();
        let store = MemStore::failing_on(&["2"]);
        let processor = SyncProcessor::new(&fetcher, &store);

        let outcome = processor.process(&SyncJob::new("a@x.com", "pw"));

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].record_id, "2");
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn reprocessing_same_job_inserts_duplicates() {
        let fetcher = FixtureMailFetcher::default();
        let store = MemStore::default();
        let processor = SyncProcessor::new(&fetcher, &store);
        let job = SyncJob::new("a@x.com", "pw");

        processor.process(&job);
        processor.process(&job);

        // No dedup key yet, so a redelivered job doubles the rows.
        assert_eq!(store.row_count(), 6);
    }

    #[test]
    fn batch_size_caps_the_fetch() {
        let fetcher = FixtureMailFetcher::default();
        let store = MemStore::default();
        let processor = SyncProcessor::new(&fetcher, &store);

        let outcome = processor.process(&SyncJob::with_batch_size("a@x.com", "pw", 2));

        assert_eq!(outcome.attempted, 2);
        assert_eq!(store.row_count(), 2);
    }
}
