use std::{sync::Arc, time::Duration};

use shared::{
    domain::Scope,
    protocol::{SetStateRequest, SetStateResponse},
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    feedback::{self, Feedback},
    graph_store::TransitionGraphStore,
    reconcile,
    transport::{OrderStateBackend, SetStateReply},
    widget::ControlWidget,
};

/// Delayed informational messages shown while a mutation is in flight.
#[derive(Debug, Clone)]
pub struct ProgressSchedule {
    steps: Vec<(Duration, String)>,
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self::new([
            (Duration::from_millis(250), "Status wird an Shopware gesendet…"),
            (Duration::from_millis(900), "Auf Antwort von Shopware warten…"),
            (Duration::from_millis(1700), "Lokalen Status aktualisieren…"),
        ])
    }
}

impl ProgressSchedule {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = (Duration, S)>,
        S: Into<String>,
    {
        Self {
            steps: steps
                .into_iter()
                .map(|(delay, text)| (delay, text.into()))
                .collect(),
        }
    }

    pub fn disabled() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn start(&self, widget: &Arc<ControlWidget>, epoch: u64) -> ProgressTimers {
        let handles = self
            .steps
            .iter()
            .cloned()
            .map(|(delay, text)| {
                let widget = Arc::clone(widget);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    widget.progress_message(epoch, &text).await;
                })
            })
            .collect();
        ProgressTimers { handles }
    }
}

/// Pending progress messages of one request; aborted when dropped.
struct ProgressTimers {
    handles: Vec<JoinHandle<()>>,
}

impl Drop for ProgressTimers {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    Busy,
    NotBound,
    NoAction,
}

/// Terminal result of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Nothing was sent; the widget state is unchanged.
    Ignored(IgnoredReason),
    Applied {
        response: SetStateResponse,
        reconciled: Vec<Scope>,
    },
    /// The backend refused. `available` is `None` when the graph could not be refreshed.
    Rejected {
        available: Option<Vec<String>>,
        message: String,
    },
    Failed {
        message: String,
    },
}

/// Runs state-set requests, one at a time per widget.
pub struct TransitionCoordinator {
    store: Arc<TransitionGraphStore>,
    backend: Arc<dyn OrderStateBackend>,
    progress: ProgressSchedule,
}

impl TransitionCoordinator {
    pub fn new(
        store: Arc<TransitionGraphStore>,
        backend: Arc<dyn OrderStateBackend>,
        progress: ProgressSchedule,
    ) -> Self {
        Self {
            store,
            backend,
            progress,
        }
    }

    /// Sends `action` for `widget`; `widgets` are all controls on the page.
    pub async fn submit(
        &self,
        widget: &Arc<ControlWidget>,
        action: &str,
        widgets: &[Arc<ControlWidget>],
    ) -> TransitionOutcome {
        let action = action.trim();
        if action.is_empty() {
            return TransitionOutcome::Ignored(IgnoredReason::NoAction);
        }
        let Some(set_url) = widget.set_url() else {
            return TransitionOutcome::Ignored(IgnoredReason::NotBound);
        };
        let Some(_busy) = widget.try_begin_request() else {
            debug!(order_id = %widget.order_id(), scope = %widget.scope(), action, "control busy; selection ignored");
            return TransitionOutcome::Ignored(IgnoredReason::Busy);
        };

        widget.select(action).await;
        let epoch = widget.begin_progress(feedback::SAVE_STARTED).await;
        let timers = self.progress.start(widget, epoch);

        let request = SetStateRequest {
            scope: widget.scope(),
            action: action.to_string(),
        };
        let reply = self.backend.set_state(set_url, &request).await;

        drop(timers);
        widget.end_progress().await;

        let outcome = match reply {
            Ok(reply) if reply.is_success() => self.apply(widget, reply, widgets).await,
            Ok(reply) => self.reject(widget, action, reply, widgets).await,
            Err(err) => {
                warn!(order_id = %widget.order_id(), scope = %widget.scope(), action, error = %err, "could not set order state");
                widget
                    .set_feedback(Feedback::error(feedback::NETWORK_FAILURE))
                    .await;
                TransitionOutcome::Failed {
                    message: feedback::NETWORK_FAILURE.to_string(),
                }
            }
        };

        widget.hide_progress().await;
        outcome
    }

    async fn apply(
        &self,
        widget: &Arc<ControlWidget>,
        reply: SetStateReply,
        widgets: &[Arc<ControlWidget>],
    ) -> TransitionOutcome {
        let graph = self.store.snapshot().await;
        let reconciled =
            reconcile::broadcast(widget.order_id(), &reply.body, widgets, &graph).await;
        widget.clear_selection().await;
        widget.set_feedback(Feedback::success(feedback::SAVED)).await;
        info!(
            order_id = %widget.order_id(),
            scope = %widget.scope(),
            reconciled = reconciled.len(),
            "order state transition applied"
        );

        TransitionOutcome::Applied {
            response: reply.body,
            reconciled,
        }
    }

    async fn reject(
        &self,
        widget: &Arc<ControlWidget>,
        action: &str,
        reply: SetStateReply,
        widgets: &[Arc<ControlWidget>],
    ) -> TransitionOutcome {
        warn!(
            order_id = %widget.order_id(),
            scope = %widget.scope(),
            action,
            status = reply.status,
            error = reply.body.error_message().unwrap_or_default(),
            "order state transition rejected"
        );

        match self.store.refresh_from_remote().await {
            Ok(graph) => {
                for other in widgets {
                    if Arc::ptr_eq(other, widget) || !other.is_busy() {
                        other.populate(&graph).await;
                    }
                }
                let current_state = widget.current_state().await;
                let available = graph.actions_for(widget.scope(), &current_state).to_vec();
                let message = feedback::unavailable_transition(&available);
                widget.set_feedback(Feedback::error(message.clone())).await;
                TransitionOutcome::Rejected {
                    available: Some(available),
                    message,
                }
            }
            Err(_) => {
                let message = reply
                    .body
                    .error_message()
                    .unwrap_or(feedback::SET_FAILED)
                    .to_string();
                widget.set_feedback(Feedback::error(message.clone())).await;
                TransitionOutcome::Rejected {
                    available: None,
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
