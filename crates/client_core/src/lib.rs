//! Transition-control engine for order, payment and delivery state controls.
//!
//! A page binds one [`ControlWidget`] per (order, scope). Options come from the
//! process-wide [`TransitionGraphStore`]; selections go through the
//! [`TransitionCoordinator`], which talks to the backend via [`OrderStateBackend`].

use std::sync::Arc;

use anyhow::{Context, Result};
use storage::{GraphCache, Storage, UnavailableGraphCache};
use tracing::warn;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod feedback;
pub mod graph_store;
pub mod labels;
pub mod page;
pub mod reconcile;
pub mod transport;
pub mod widget;

pub use config::{load_settings, Settings};
pub use coordinator::{IgnoredReason, ProgressSchedule, TransitionCoordinator, TransitionOutcome};
pub use error::RefreshError;
pub use feedback::{Feedback, FeedbackKind};
pub use graph_store::TransitionGraphStore;
pub use labels::label_of;
pub use page::{ControlPage, RefreshStatus};
pub use transport::{HttpBackend, OrderStateBackend, SetStateReply, TransportError};
pub use widget::{ControlDescriptor, ControlWidget, SelectOption, WidgetView};

/// Shared collaborators for every page built from one set of settings.
pub struct ControlRuntime {
    pub store: Arc<TransitionGraphStore>,
    pub backend: Arc<dyn OrderStateBackend>,
    pub progress: ProgressSchedule,
}

impl ControlRuntime {
    pub async fn initialize(settings: &Settings) -> Result<Self> {
        let backend: Arc<dyn OrderStateBackend> = Arc::new(
            HttpBackend::from_cookie_header(
                settings.base_url.as_deref(),
                settings.cookie_header.as_deref(),
            )
            .context("failed to build order state backend")?,
        );
        let cache = open_cache(&settings.cache_database_url).await;
        let store = Arc::new(
            TransitionGraphStore::initialize(cache, Arc::clone(&backend), settings.meta_url.clone())
                .await,
        );

        Ok(Self {
            store,
            backend,
            progress: settings.progress_schedule(),
        })
    }

    pub async fn bind_page(
        &self,
        descriptors: impl IntoIterator<Item = ControlDescriptor>,
    ) -> ControlPage {
        ControlPage::bind(
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
            self.progress.clone(),
            descriptors,
        )
        .await
    }
}

/// Opens the durable cache, degrading to an unavailable cache instead of failing.
async fn open_cache(database_url: &str) -> Arc<dyn GraphCache> {
    let opened = match config::prepare_cache_url(database_url) {
        Ok(url) => Storage::new(&url).await,
        Err(err) => Err(err),
    };
    match opened {
        Ok(storage) => Arc::new(storage),
        Err(err) => {
            warn!(database_url, error = %err, "transition cache unavailable; using in-memory graph only");
            Arc::new(UnavailableGraphCache)
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
