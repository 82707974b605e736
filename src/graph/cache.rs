//! Process-wide snapshot cache.
//!
//! Snapshots are immutable and shared via `Arc`; entries expire after a
//! TTL and are dropped explicitly when an ingestion event invalidates
//! them. The cache is write-through: the next request after an
//! invalidation rebuilds the snapshot from the graph.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::loader::GraphLoader;
use super::model::{DomainGraph, SkillGraph};
use super::store::{Deadline, GraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SnapshotKey {
    Skills,
    Domains,
}

enum Snapshot {
    Skills(Arc<SkillGraph>),
    Domains(Arc<DomainGraph>),
}

struct Entry {
    loaded_at: Instant,
    snapshot: Snapshot,
}

/// TTL-bounded snapshot cache over the graph loader.
pub struct GraphCatalog {
    loader: GraphLoader,
    ttl: Duration,
    entries: DashMap<SnapshotKey, Entry>,
    /// Serializes rebuilds so concurrent cold requests load once.
    rebuild: Mutex<()>,
}

impl GraphCatalog {
    pub fn new(loader: GraphLoader, ttl: Duration) -> Self {
        Self { loader, ttl, entries: DashMap::new(), rebuild: Mutex::new(()) }
    }

    pub async fn skill_graph(
        &self,
        deadline: Option<Deadline>,
    ) -> Result<Arc<SkillGraph>, GraphError> {
        if let Some(graph) = self.fresh_skills() {
            return Ok(graph);
        }
        let _guard = self.rebuild.lock().await;
        if let Some(graph) = self.fresh_skills() {
            return Ok(graph);
        }
        let graph = Arc::new(self.loader.load_skill_graph(deadline).await?);
        self.entries.insert(
            SnapshotKey::Skills,
            Entry { loaded_at: Instant::now(), snapshot: Snapshot::Skills(graph.clone()) },
        );
        Ok(graph)
    }

    pub async fn domain_graph(
        &self,
        deadline: Option<Deadline>,
    ) -> Result<Arc<DomainGraph>, GraphError> {
        if let Some(graph) = self.fresh_domains() {
            return Ok(graph);
        }
        let _guard = self.rebuild.lock().await;
        if let Some(graph) = self.fresh_domains() {
            return Ok(graph);
        }
        let graph = Arc::new(self.loader.load_domain_graph(deadline).await?);
        self.entries.insert(
            SnapshotKey::Domains,
            Entry { loaded_at: Instant::now(), snapshot: Snapshot::Domains(graph.clone()) },
        );
        Ok(graph)
    }

    /// Drop all snapshots. Called on ingestion events; the next request
    /// rebuilds.
    pub fn invalidate(&self) {
        self.entries.clear();
        tracing::info!("Graph snapshot cache invalidated");
    }

    fn fresh_skills(&self) -> Option<Arc<SkillGraph>> {
        let entry = self.entries.get(&SnapshotKey::Skills)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }
        match &entry.snapshot {
            Snapshot::Skills(graph) => Some(graph.clone()),
            _ => None,
        }
    }

    fn fresh_domains(&self) -> Option<Arc<DomainGraph>> {
        let entry = self.entries.get(&SnapshotKey::Domains)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }
        match &entry.snapshot {
            Snapshot::Domains(graph) => Some(graph.clone()),
            _ => None,
        }
    }
}
