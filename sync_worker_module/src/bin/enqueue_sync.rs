use std::process::exit;

use tracing::{error, info};

use sync_worker_module::{
    encode_job, resolve_broker_config_from_env, JobQueue, ServiceBusJobQueue, SyncJob,
};

/// Publishes one sync job for a mailbox. Credentials come from the command
/// line, or from MAIL_USERNAME / MAIL_APP_PASSWORD when omitted.
fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let username = args
        .first()
        .cloned()
        .or_else(|| std::env::var("MAIL_USERNAME").ok());
    let app_password = args
        .get(1)
        .cloned()
        .or_else(|| std::env::var("MAIL_APP_PASSWORD").ok());
    let (Some(username), Some(app_password)) = (username, app_password) else {
        eprintln!("usage: enqueue-sync <username> <app-password> [batch-size]");
        exit(2);
    };

    let job = match args.get(2) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(batch_size) if batch_size > 0 => {
                SyncJob::with_batch_size(username, app_password, batch_size)
            }
            _ => {
                eprintln!("batch-size must be a positive integer, got {raw:?}");
                exit(2);
            }
        },
        None => SyncJob::new(username, app_password),
    };

    let broker = match resolve_broker_config_from_env() {
        Ok(broker) => broker,
        Err(err) => {
            error!("configuration error: {}", err);
            exit(2);
        }
    };
    let queue_name = broker.queue_name.clone();
    let queue = match ServiceBusJobQueue::new(broker) {
        Ok(queue) => queue,
        Err(err) => {
            error!("failed to set up broker client: {}", err);
            exit(1);
        }
    };

    let body = match encode_job(&job) {
        Ok(body) => body,
        Err(err) => {
            error!("failed to encode job: {}", err);
            exit(1);
        }
    };
    match queue.publish(&body) {
        Ok(()) => info!(
            "sync job for {} accepted on queue {}",
            job.username, queue_name
        ),
        Err(err) => {
            error!("broker rejected the job: {}", err);
            exit(1);
        }
    }
}
