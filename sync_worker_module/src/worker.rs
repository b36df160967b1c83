use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::job::decode_job;
use crate::job_queue::JobQueue;
use crate::processor::SyncProcessor;

/// Sequential consume loop: one claimed job at a time, acknowledged no
/// matter how it went. Messages only redeliver if the process dies while a
/// job is in flight and its lock expires on the broker.
pub struct Worker<'a> {
    queue: &'a dyn JobQueue,
    processor: SyncProcessor<'a>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Worker<'a> {
    pub fn new(
        queue: &'a dyn JobQueue,
        processor: SyncProcessor<'a>,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            processor,
            poll_interval,
            shutdown,
        }
    }

    pub fn run(&self) {
        info!("worker started, polling for sync jobs");
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.queue.claim_next() {
                Ok(Some(claimed)) => self.handle_delivery(&claimed.id, &claimed.body),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(err) => {
                    warn!("failed to claim a job: {}", err);
                    thread::sleep(self.poll_interval);
                }
            }
        }
        info!("worker stopped");
    }

    fn handle_delivery(&self, id: &Uuid, body: &[u8]) {
        match decode_job(body) {
            Ok(job) => {
                debug!("processing sync job for {}", job.username);
                let outcome = self.processor.process(&job);
                if let Some(fetch_error) = &outcome.fetch_error {
                    if fetch_error.is_retryable() {
                        // Acknowledged anyway; a later job for this mailbox
                        // will pick up whatever this one missed.
                        warn!(
                            "sync for {} failed before storing anything: {}",
                            job.username, fetch_error
                        );
                    } else {
                        warn!(
                            "sync for {} rejected by the mail server: {}",
                            job.username, fetch_error
                        );
                    }
                } else if !outcome.failures.is_empty() {
                    warn!(
                        "sync for {} stored {}/{} records",
                        job.username, outcome.succeeded, outcome.attempted
                    );
                }
            }
            Err(err) => {
                // Redelivery cannot fix a malformed payload.
                warn!("dropping undecodable job message: {}", err);
            }
        }
        if let Err(err) = self.queue.acknowledge(id) {
            warn!("failed to acknowledge job {}: {}", id, err);
        }
    }
}
