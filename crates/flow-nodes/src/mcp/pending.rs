//! Pending service requests keyed by request id
//!
//! Every entry carries the instant it expires at. A waiter gives up at that
//! instant and removes its own entry; [`PendingRequests::expire`] sweeps
//! entries whose waiter went away without doing so.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::debug;

use flow_core::{Error, Result};

struct PendingEntry {
    method: String,
    expires_at: Instant,
    respond_to: oneshot::Sender<Result<Value>>,
}

/// Receiving half of a registered request
#[derive(Debug)]
pub struct PendingTicket {
    request_id: String,
    method: String,
    expires_at: Instant,
    response: oneshot::Receiver<Result<Value>>,
}

/// Table of requests waiting for a response
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
    timeout: Duration,
    sequence: AtomicU64,
}

impl PendingRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Next number in this table's request sequence
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `request_id` and get the ticket to wait on
    pub async fn register(&self, request_id: &str, method: &str) -> PendingTicket {
        let (tx, rx) = oneshot::channel();
        let expires_at = Instant::now() + self.timeout;
        self.entries.lock().await.insert(
            request_id.to_string(),
            PendingEntry {
                method: method.to_string(),
                expires_at,
                respond_to: tx,
            },
        );
        PendingTicket {
            request_id: request_id.to_string(),
            method: method.to_string(),
            expires_at,
            response: rx,
        }
    }

    /// Complete a pending request. Returns `false` if the id is unknown.
    pub async fn complete(&self, request_id: &str, outcome: Result<Value>) -> bool {
        let Some(entry) = self.entries.lock().await.remove(request_id) else {
            return false;
        };
        debug!(request_id = %request_id, method = %entry.method, "Completing pending request");
        // The waiter may already have given up
        let _ = entry.respond_to.send(outcome);
        true
    }

    /// Drop a request without answering it
    pub async fn cancel(&self, request_id: &str) -> bool {
        self.entries.lock().await.remove(request_id).is_some()
    }

    /// Wait for the response to `ticket`, or fail once it expires
    pub async fn wait(&self, ticket: PendingTicket) -> Result<Value> {
        let PendingTicket {
            request_id,
            method,
            expires_at,
            response,
        } = ticket;

        match tokio::time::timeout_at(expires_at, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::service(format!(
                "Request {} was dropped before a response arrived",
                request_id
            ))),
            Err(_) => {
                self.cancel(&request_id).await;
                Err(Error::timeout(format!(
                    "Timeout waiting for response to {}",
                    method
                )))
            }
        }
    }

    /// Remove every expired entry, failing its waiter if still present.
    /// Returns the number of entries removed.
    pub async fn expire(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(entry) = entries.remove(id) {
                let _ = entry.respond_to.send(Err(Error::timeout(format!(
                    "Timeout waiting for response to {}",
                    entry.method
                ))));
            }
        }
        expired.len()
    }

    /// Number of requests still waiting
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Pending tables shared by every instance of the same node id, so a
/// response reaches the call whichever instance the host routes it to
pub struct PendingTables {
    timeout: Duration,
    tables: std::sync::Mutex<HashMap<String, Arc<PendingRequests>>>,
}

impl PendingTables {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            tables: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Table for `node_id`, created on first use
    pub fn for_node(&self, node_id: &str) -> Arc<PendingRequests> {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tables
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(PendingRequests::new(self.timeout)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_resolves_waiter() {
        let table = Arc::new(PendingRequests::new(Duration::from_secs(30)));
        let ticket = table.register("r-1", "search").await;

        let waiter = {
            let table = table.clone();
            tokio::spawn(async move { table.wait(ticket).await })
        };
        assert!(table.complete("r-1", Ok(json!({ "hits": 2 }))).await);

        assert_eq!(waiter.await.unwrap().unwrap(), json!({ "hits": 2 }));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_id_is_rejected() {
        let table = PendingRequests::new(Duration::from_secs(30));
        assert!(!table.complete("missing", Ok(Value::Null)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_times_out_and_cleans_up() {
        let table = PendingRequests::new(Duration::from_millis(500));
        let ticket = table.register("r-2", "search").await;

        let err = table.wait(ticket).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(ref m) if m.contains("search")));
        assert_eq!(table.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_sweeps_abandoned_entries() {
        let table = PendingRequests::new(Duration::from_secs(1));
        let abandoned = table.register("r-3", "search").await;
        drop(abandoned);

        assert_eq!(table.expire().await, 0);
        tokio::time::advance(Duration::from_secs(2)).await;
        let _fresh = table.register("r-4", "search").await;

        assert_eq!(table.expire().await, 1);
        assert_eq!(table.len().await, 1);
    }

    #[test]
    fn test_tables_are_shared_per_node_id() {
        let tables = PendingTables::new(Duration::from_secs(30));
        let a = tables.for_node("mcp-1");
        assert!(Arc::ptr_eq(&a, &tables.for_node("mcp-1")));
        assert!(!Arc::ptr_eq(&a, &tables.for_node("mcp-2")));

        assert_eq!(a.next_sequence(), 0);
        assert_eq!(tables.for_node("mcp-1").next_sequence(), 1);
    }
}
