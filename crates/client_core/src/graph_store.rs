use std::sync::Arc;

use shared::domain::{Scope, TransitionGraph};
use storage::{GraphCache, TRANSITIONS_CACHE_KEY};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{error::RefreshError, transport::OrderStateBackend};

/// Process-wide mirror of the backend state machines.
///
/// The graph only shapes which actions are offered; the backend decides at
/// mutation time. Every update swaps the whole graph.
pub struct TransitionGraphStore {
    graph: RwLock<Arc<TransitionGraph>>,
    cache: Arc<dyn GraphCache>,
    backend: Arc<dyn OrderStateBackend>,
    meta_url: Option<String>,
}

impl TransitionGraphStore {
    pub fn new(
        seed: TransitionGraph,
        cache: Arc<dyn GraphCache>,
        backend: Arc<dyn OrderStateBackend>,
        meta_url: Option<String>,
    ) -> Self {
        Self {
            graph: RwLock::new(Arc::new(seed)),
            cache,
            backend,
            meta_url,
        }
    }

    /// Seeds from the static Shopware graph, then lets a durable cache entry override it.
    pub async fn initialize(
        cache: Arc<dyn GraphCache>,
        backend: Arc<dyn OrderStateBackend>,
        meta_url: Option<String>,
    ) -> Self {
        let store = Self::new(TransitionGraph::shopware_default(), cache, backend, meta_url);
        store.restore().await;
        store
    }

    pub async fn snapshot(&self) -> Arc<TransitionGraph> {
        Arc::clone(&*self.graph.read().await)
    }

    pub async fn actions_for(&self, scope: Scope, state: &str) -> Vec<String> {
        self.graph.read().await.actions_for(scope, state).to_vec()
    }

    pub async fn replace(&self, graph: TransitionGraph) -> Arc<TransitionGraph> {
        let graph = Arc::new(graph);
        *self.graph.write().await = Arc::clone(&graph);
        graph
    }

    /// Writes the current graph to the durable cache. Failures are logged and dropped.
    pub async fn persist(&self) -> bool {
        let graph = self.snapshot().await;
        let raw = match serde_json::to_string(graph.as_ref()) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "could not serialize transition graph");
                return false;
            }
        };
        match self.cache.write(TRANSITIONS_CACHE_KEY, &raw).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not persist transition graph");
                false
            }
        }
    }

    /// Loads a cached graph if one exists and parses; otherwise keeps the current graph.
    pub async fn restore(&self) -> bool {
        let entry = match self.cache.read(TRANSITIONS_CACHE_KEY).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("no cached transition graph");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "transition graph cache unavailable");
                return false;
            }
        };

        match serde_json::from_str::<TransitionGraph>(&entry.value) {
            Ok(graph) => {
                info!(cached_at = %entry.updated_at, "restored cached transition graph");
                self.replace(graph).await;
                true
            }
            Err(err) => {
                warn!(error = %err, "ignoring corrupt cached transition graph");
                false
            }
        }
    }

    /// Fetches the graph from the metadata endpoint, replacing and persisting it on success.
    ///
    /// On any failure the current graph stays in place.
    pub async fn refresh_from_remote(&self) -> Result<Arc<TransitionGraph>, RefreshError> {
        let meta_url = self
            .meta_url
            .as_deref()
            .ok_or(RefreshError::NoMetadataEndpoint)?;

        let response = self
            .backend
            .fetch_transitions(meta_url)
            .await
            .inspect_err(|err| warn!(error = %err, "could not fetch transition graph"))?;

        let Some(graph) = response.into_graph() else {
            warn!(meta_url, "metadata endpoint answered without a transition graph");
            return Err(RefreshError::MissingGraph);
        };

        let graph = self.replace(graph).await;
        self.persist().await;
        info!(meta_url, "transition graph refreshed from backend");
        Ok(graph)
    }
}

#[cfg(test)]
#[path = "tests/graph_store_tests.rs"]
mod tests;
