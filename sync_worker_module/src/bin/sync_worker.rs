use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use mail_fetch_module::{FixtureMailFetcher, ImapMailFetcher, MailFetcher};
use sync_worker_module::{
    FetcherKind, PostgresEmailStore, ServiceBusJobQueue, SyncProcessor, Worker, WorkerConfig,
};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {}", err);
            exit(2);
        }
    };

    let queue = match ServiceBusJobQueue::new(config.broker.clone()) {
        Ok(queue) => queue,
        Err(err) => {
            error!("failed to set up broker client: {}", err);
            exit(1);
        }
    };
    if let Err(err) = queue.probe() {
        error!("broker unreachable: {}", err);
        exit(1);
    }

    let store = match PostgresEmailStore::new(&config.db_url, config.db_allow_invalid_certs) {
        Ok(store) => store,
        Err(err) => {
            error!("failed to set up email storage: {}", err);
            exit(1);
        }
    };

    let fetcher: Box<dyn MailFetcher> = match config.fetcher {
        FetcherKind::Imap => Box::new(ImapMailFetcher::new(
            config.imap_host.clone(),
            config.imap_port,
        )),
        FetcherKind::Fixture => Box::new(FixtureMailFetcher::default()),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let worker_shutdown = shutdown.clone();
    let poll_interval = config.poll_interval;
    let handle = thread::spawn(move || {
        let processor = SyncProcessor::new(fetcher.as_ref(), &store);
        let worker = Worker::new(&queue, processor, poll_interval, worker_shutdown);
        worker.run();
    });

    wait_for_shutdown_signal();
    info!("shutdown requested, letting the in-flight job finish");
    shutdown.store(true, Ordering::Relaxed);
    if handle.join().is_err() {
        error!("worker thread panicked");
        exit(1);
    }
}

fn wait_for_shutdown_signal() {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => {
            if let Err(err) = runtime.block_on(tokio::signal::ctrl_c()) {
                error!("failed to listen for shutdown signal: {}", err);
            }
        }
        Err(err) => {
            error!("failed to start signal listener: {}", err);
        }
    }
}
