use std::sync::Arc;

use shared::domain::{OrderId, Scope};
use tracing::{debug, info, warn};

use crate::{
    coordinator::{IgnoredReason, ProgressSchedule, TransitionCoordinator, TransitionOutcome},
    feedback,
    graph_store::TransitionGraphStore,
    transport::OrderStateBackend,
    widget::{ControlDescriptor, ControlWidget, WidgetView},
};

/// Result of the operator-triggered graph refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    pub refreshed: bool,
    pub button_label: &'static str,
}

/// All state controls bound on one page.
pub struct ControlPage {
    store: Arc<TransitionGraphStore>,
    coordinator: TransitionCoordinator,
    widgets: Vec<Arc<ControlWidget>>,
}

impl ControlPage {
    /// Binds one control per descriptor. A repeated (order, scope) pair keeps the first.
    pub async fn bind(
        store: Arc<TransitionGraphStore>,
        backend: Arc<dyn OrderStateBackend>,
        progress: ProgressSchedule,
        descriptors: impl IntoIterator<Item = ControlDescriptor>,
    ) -> Self {
        let graph = store.snapshot().await;
        let mut widgets: Vec<Arc<ControlWidget>> = Vec::new();

        for descriptor in descriptors {
            if widgets
                .iter()
                .any(|w| w.order_id() == &descriptor.order_id && w.scope() == descriptor.scope)
            {
                warn!(order_id = %descriptor.order_id, scope = %descriptor.scope, "duplicate state control ignored");
                continue;
            }
            widgets.push(ControlWidget::bind(descriptor, &graph));
        }

        info!(controls = widgets.len(), "bound order state controls");
        Self {
            coordinator: TransitionCoordinator::new(Arc::clone(&store), backend, progress),
            store,
            widgets,
        }
    }

    pub fn store(&self) -> &Arc<TransitionGraphStore> {
        &self.store
    }

    pub fn widgets(&self) -> &[Arc<ControlWidget>] {
        &self.widgets
    }

    pub fn widget(&self, order_id: &OrderId, scope: Scope) -> Option<&Arc<ControlWidget>> {
        self.widgets
            .iter()
            .find(|w| w.order_id() == order_id && w.scope() == scope)
    }

    pub fn siblings<'a>(
        &'a self,
        order_id: &'a OrderId,
    ) -> impl Iterator<Item = &'a Arc<ControlWidget>> + 'a {
        self.widgets.iter().filter(move |w| w.order_id() == order_id)
    }

    /// Handles an operator selection on `widget`. A busy control is left untouched.
    pub async fn on_user_select(
        &self,
        widget: &Arc<ControlWidget>,
        action: &str,
    ) -> TransitionOutcome {
        if widget.is_busy() {
            debug!(order_id = %widget.order_id(), scope = %widget.scope(), action, "selection ignored while busy");
            return TransitionOutcome::Ignored(IgnoredReason::Busy);
        }
        let graph = self.store.snapshot().await;
        widget.ensure_populated(&graph).await;
        self.coordinator.submit(widget, action, &self.widgets).await
    }

    /// Selection addressed by order and scope; `None` when no such control is bound.
    pub async fn select(
        &self,
        order_id: &OrderId,
        scope: Scope,
        action: &str,
    ) -> Option<TransitionOutcome> {
        let widget = Arc::clone(self.widget(order_id, scope)?);
        Some(self.on_user_select(&widget, action).await)
    }

    /// Re-derives options of every idle control from the current graph.
    pub async fn repopulate_all(&self) {
        let graph = self.store.snapshot().await;
        let idle = self.widgets.iter().filter(|w| !w.is_busy());
        futures::future::join_all(idle.map(|w| w.populate(&graph))).await;
    }

    pub async fn refresh_transitions(&self) -> RefreshStatus {
        match self.store.refresh_from_remote().await {
            Ok(_) => {
                self.repopulate_all().await;
                RefreshStatus {
                    refreshed: true,
                    button_label: feedback::REFRESH_DONE,
                }
            }
            Err(err) => {
                warn!(error = %err, "operator refresh of transition graph failed");
                RefreshStatus {
                    refreshed: false,
                    button_label: feedback::REFRESH_FAILED,
                }
            }
        }
    }

    pub async fn views(&self) -> Vec<WidgetView> {
        futures::future::join_all(self.widgets.iter().map(|w| w.view())).await
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
