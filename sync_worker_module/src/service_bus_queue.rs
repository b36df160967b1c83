use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use azure_core::{auth::Secret, error::Error as AzureError};
use azure_messaging_servicebus::prelude::QueueClient;
use azure_messaging_servicebus::service_bus::{PeekLockResponse, SendMessageOptions};
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::job_queue::{ClaimedJob, JobQueue, JobQueueError};

/// Connection settings for the broker queue. The queue itself is durable on
/// the broker side and must exist before the worker starts; nothing here is
/// created on the fly.
#[derive(Clone)]
pub struct BrokerConfig {
    pub namespace: String,
    pub policy_name: String,
    pub policy_key: String,
    pub queue_name: String,
    pub peek_lock_timeout: Duration,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("namespace", &self.namespace)
            .field("policy_name", &self.policy_name)
            .field("policy_key", &"[REDACTED]")
            .field("queue_name", &self.queue_name)
            .field("peek_lock_timeout", &self.peek_lock_timeout)
            .finish()
    }
}

/// Service Bus implementation of the job queue. Peek-lock receive is the
/// claim, delete is the acknowledgment, unlock is the release; an
/// unacknowledged message returns to the queue when its lock expires, which
/// is what gives the pipeline at-least-once delivery.
pub struct ServiceBusJobQueue {
    client: QueueClient,
    peek_lock_timeout: Duration,
    runtime: Option<Runtime>,
    pending: Mutex<HashMap<Uuid, PeekLockResponse>>,
}

impl ServiceBusJobQueue {
    pub fn new(config: BrokerConfig) -> Result<Self, JobQueueError> {
        let http_client = azure_core::new_http_client();
        let runtime =
            Runtime::new().map_err(|err| JobQueueError::Broker(err.to_string()))?;
        let client = QueueClient::new(
            http_client,
            config.namespace,
            config.queue_name,
            config.policy_name,
            Secret::new(config.policy_key),
        )
        .map_err(|err| JobQueueError::Broker(err.to_string()))?;
        Ok(Self {
            client,
            peek_lock_timeout: config.peek_lock_timeout,
            runtime: Some(runtime),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Verifies the broker is reachable before the consume loop starts. A
    /// message received during the probe is unlocked immediately so it stays
    /// deliverable.
    pub fn probe(&self) -> Result<(), JobQueueError> {
        if let Some(claimed) = self.claim_next()? {
            self.release(&claimed.id)?;
        }
        Ok(())
    }

    fn runtime(&self) -> Result<&Runtime, JobQueueError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| JobQueueError::Broker("broker runtime dropped".to_string()))
    }

    fn take_pending(&self, id: &Uuid) -> Result<PeekLockResponse, JobQueueError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| JobQueueError::Broker("pending lock poisoned".to_string()))?;
        pending.remove(id).ok_or(JobQueueError::UnknownDelivery(*id))
    }
}

impl JobQueue for ServiceBusJobQueue {
    fn publish(&self, body: &[u8]) -> Result<(), JobQueueError> {
        let payload = std::str::from_utf8(body)
            .map_err(|err| JobQueueError::Broker(format!("non-utf8 payload: {err}")))?;
        let options = SendMessageOptions {
            content_type: Some("application/json".to_string()),
            broker_properties: None,
            custom_properties: None,
        };
        self.runtime()?
            .block_on(self.client.send_message(payload, Some(options)))
            .map_err(map_broker_error)?;
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<ClaimedJob>, JobQueueError> {
        let response = self
            .runtime()?
            .block_on(self.client.peek_lock_message2(Some(self.peek_lock_timeout)))
            .map_err(map_broker_error)?;
        if *response.status() == azure_core::StatusCode::NoContent {
            return Ok(None);
        }
        if *response.status() != azure_core::StatusCode::Ok
            && *response.status() != azure_core::StatusCode::Created
        {
            return Err(JobQueueError::Broker(format!(
                "unexpected broker status {}",
                response.status()
            )));
        }
        let body = response.body().into_bytes();
        let id = Uuid::new_v4();
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| JobQueueError::Broker("pending lock poisoned".to_string()))?;
        pending.insert(id, response);
        Ok(Some(ClaimedJob { id, body }))
    }

    fn acknowledge(&self, id: &Uuid) -> Result<(), JobQueueError> {
        let response = self.take_pending(id)?;
        self.runtime()?
            .block_on(response.delete_message())
            .map_err(map_broker_error)?;
        Ok(())
    }

    fn release(&self, id: &Uuid) -> Result<(), JobQueueError> {
        let response = self.take_pending(id)?;
        self.runtime()?
            .block_on(response.unlock_message())
            .map_err(map_broker_error)?;
        Ok(())
    }
}

impl Drop for ServiceBusJobQueue {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn map_broker_error(err: AzureError) -> JobQueueError {
    JobQueueError::Broker(err.to_string())
}

#[derive(Debug)]
pub(crate) struct ParsedConnectionString {
    pub namespace: String,
    pub policy_name: String,
    pub policy_key: String,
    pub entity_path: Option<String>,
}

pub(crate) fn parse_broker_connection_string(
    conn_str: &str,
) -> Result<ParsedConnectionString, JobQueueError> {
    let mut namespace = None;
    let mut policy_name = None;
    let mut policy_key = None;
    let mut entity_path = None;
    for part in conn_str.split(';') {
        let mut iter = part.splitn(2, '=');
        let key = iter.next().unwrap_or("").trim();
        let value = iter.next().unwrap_or("").trim();
        match key {
            "Endpoint" => {
                if let Some(value) = value.strip_prefix("sb://") {
                    let value = value.trim_end_matches('/');
                    let ns = value.split('.').next().unwrap_or("").to_string();
                    if !ns.is_empty() {
                        namespace = Some(ns);
                    }
                }
            }
            "SharedAccessKeyName" if !value.is_empty() => {
                policy_name = Some(value.to_string());
            }
            "SharedAccessKey" if !value.is_empty() => {
                policy_key = Some(value.to_string());
            }
            "EntityPath" if !value.is_empty() => {
                entity_path = Some(value.to_string());
            }
            _ => {}
        }
    }

    let namespace = namespace.ok_or_else(|| {
        JobQueueError::Config("missing namespace in broker connection string".to_string())
    })?;
    let policy_name = policy_name.ok_or_else(|| {
        JobQueueError::Config("missing policy name in broker connection string".to_string())
    })?;
    let policy_key = policy_key.ok_or_else(|| {
        JobQueueError::Config("missing policy key in broker connection string".to_string())
    })?;

    Ok(ParsedConnectionString {
        namespace,
        policy_name,
        policy_key,
        entity_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_connection_string() {
        let parsed = parse_broker_connection_string(
            "Endpoint=sb://syncns.servicebus.windows.net/;SharedAccessKeyName=worker;\
             SharedAccessKey=abc123;EntityPath=gmail_sync_queue",
        )
        .expect("parse");
        assert_eq!(parsed.namespace, "syncns");
        assert_eq!(parsed.policy_name, "worker");
        assert_eq!(parsed.policy_key, "abc123");
        assert_eq!(parsed.entity_path.as_deref(), Some("gmail_sync_queue"));
    }

    #[test]
    fn entity_path_is_optional() {
        let parsed = parse_broker_connection_string(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=p;SharedAccessKey=k",
        )
        .expect("parse");
        assert_eq!(parsed.entity_path, None);
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = parse_broker_connection_string(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=p",
        )
        .unwrap_err();
        assert!(matches!(err, JobQueueError::Config(_)));
    }

    #[test]
    fn broker_config_debug_redacts_policy_key() {
        let config = BrokerConfig {
            namespace: "ns".to_string(),
            policy_name: "p".to_string(),
            policy_key: "topsecret".to_string(),
            queue_name: "q".to_string(),
            peek_lock_timeout: Duration::from_secs(30),
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
    }
}
