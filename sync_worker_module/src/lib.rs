pub mod config;
pub mod email_store;
pub mod job;
pub mod job_queue;
pub mod processor;
pub mod service_bus_queue;
pub mod worker;

pub use config::{resolve_broker_config_from_env, ConfigError, FetcherKind, WorkerConfig};
pub use email_store::{EmailStore, PostgresEmailStore, SaveFailure, StoreError, SyncOutcome};
pub use job::{decode_job, encode_job, DecodeError, EncodeError, SyncJob};
pub use job_queue::{ClaimedJob, JobQueue, JobQueueError};
pub use processor::SyncProcessor;
pub use service_bus_queue::{BrokerConfig, ServiceBusJobQueue};
pub use worker::Worker;
