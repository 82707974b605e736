//! Graph store contract: the only persistent-state boundary of the engine.
//!
//! The store executes parameterised Cypher and returns rows as JSON
//! objects. Every call is a suspension point and carries the request
//! deadline; a query that fails is retried exactly once with jittered
//! backoff before the failure propagates.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Query parameters, bound by name.
pub type Params = serde_json::Map<String, Value>;

/// One result row: a JSON object keyed by the RETURN aliases.
pub type Row = Value;

/// Errors raised at the graph boundary.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph query failed: {0}")]
    QueryFailed(String),

    #[error("graph query deadline exceeded")]
    DeadlineExceeded,

    #[error("graph row decode failed: {0}")]
    Decode(String),

    /// The taxonomy loader refuses to serve a cyclic hierarchy.
    #[error("cyclic hierarchy detected: {relation} edge at node `{node_id}`")]
    CyclicHierarchy { relation: String, node_id: String },
}

/// Absolute point in time after which no further graph work may start.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(pub Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left, `None` once elapsed.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        (now < self.0).then(|| self.0 - now)
    }
}

/// Executes Cypher against the talent graph.
///
/// Implementations must honour the deadline: a call past the deadline
/// returns `DeadlineExceeded` and cancels the in-flight query.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn query(
        &self,
        cypher: &str,
        params: Params,
        deadline: Option<Deadline>,
    ) -> Result<Vec<Row>, GraphError>;
}

/// Retry wrapper around a [`GraphStore`].
///
/// A first failure is retried once after a jittered backoff; the second
/// failure is fatal. Deadline misses are never retried.
#[derive(Clone)]
pub struct QueryRunner {
    store: Arc<dyn GraphStore>,
    backoff_base: Duration,
}

impl QueryRunner {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store, backoff_base: Duration::from_millis(50) }
    }

    #[cfg(test)]
    pub fn with_backoff(store: Arc<dyn GraphStore>, backoff_base: Duration) -> Self {
        Self { store, backoff_base }
    }

    pub async fn run(
        &self,
        cypher: &str,
        params: Params,
        deadline: Option<Deadline>,
    ) -> Result<Vec<Row>, GraphError> {
        if let Some(d) = deadline
            && d.is_elapsed()
        {
            return Err(GraphError::DeadlineExceeded);
        }

        match self.store.query(cypher, params.clone(), deadline).await {
            Ok(rows) => Ok(rows),
            Err(GraphError::DeadlineExceeded) => Err(GraphError::DeadlineExceeded),
            Err(first) => {
                let backoff = self.jittered_backoff();
                tracing::warn!(
                    "Graph query failed, retrying in {:?}: {}",
                    backoff,
                    first
                );
                tokio::time::sleep(backoff).await;
                if let Some(d) = deadline
                    && d.is_elapsed()
                {
                    return Err(GraphError::DeadlineExceeded);
                }
                self.store.query(cypher, params, deadline).await
            }
        }
    }

    /// Run a count query and decode the single `count` column.
    pub async fn run_count(
        &self,
        cypher: &str,
        params: Params,
        deadline: Option<Deadline>,
    ) -> Result<u64, GraphError> {
        let rows = self.run(cypher, params, deadline).await?;
        match rows.first() {
            Some(row) => row_u64(row, "count"),
            None => Ok(0),
        }
    }

    fn jittered_backoff(&self) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        self.backoff_base.mul_f64(jitter)
    }
}

// ============================================================================
// Row decoding helpers
// ============================================================================

pub fn row_str(row: &Row, key: &str) -> Result<String, GraphError> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraphError::Decode(format!("missing string column `{key}`")))
}

pub fn row_opt_str(row: &Row, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn row_f64(row: &Row, key: &str) -> Result<f64, GraphError> {
    row.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| GraphError::Decode(format!("missing numeric column `{key}`")))
}

pub fn row_opt_f64(row: &Row, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

pub fn row_u64(row: &Row, key: &str) -> Result<u64, GraphError> {
    row.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| GraphError::Decode(format!("missing count column `{key}`")))
}

pub fn row_array<'a>(row: &'a Row, key: &str) -> &'a [Value] {
    row.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}
