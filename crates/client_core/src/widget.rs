use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::{OrderId, Scope, TransitionGraph};
use tokio::sync::Mutex;

use crate::{
    feedback::{self, Feedback},
    labels::label_of,
};

/// What the page exposes about one control when it is discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDescriptor {
    pub order_id: OrderId,
    pub scope: Scope,
    pub current_state: String,
    /// Absent when the order has no backend id to act on.
    pub set_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn placeholder(label: &str) -> Self {
        Self {
            value: String::new(),
            label: label.to_string(),
        }
    }
}

/// Rendered state of a control at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub order_id: OrderId,
    pub scope: Scope,
    pub current_state: String,
    pub current_label: String,
    pub options: Vec<SelectOption>,
    pub selectable: bool,
    pub busy: bool,
    pub progress_visible: bool,
    pub selected_action: Option<String>,
    pub feedback: Option<Feedback>,
}

impl WidgetView {
    /// Action identifiers on offer, without the placeholder entry.
    pub fn actions(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|option| !option.value.is_empty())
            .map(|option| option.value.as_str())
            .collect()
    }
}

struct ControlState {
    current_state: String,
    options_loaded: bool,
    has_actions: bool,
    options: Vec<SelectOption>,
    selected_action: Option<String>,
    feedback: Option<Feedback>,
    progress_visible: bool,
    progress_epoch: u64,
}

/// One bound control for an (order, scope) pair.
pub struct ControlWidget {
    order_id: OrderId,
    scope: Scope,
    set_url: Option<String>,
    busy: AtomicBool,
    state: Mutex<ControlState>,
}

impl ControlWidget {
    pub fn bind(descriptor: ControlDescriptor, graph: &TransitionGraph) -> Arc<Self> {
        let mut state = ControlState {
            current_state: descriptor.current_state,
            options_loaded: false,
            has_actions: false,
            options: Vec::new(),
            selected_action: None,
            feedback: None,
            progress_visible: false,
            progress_epoch: 0,
        };

        if descriptor.set_url.is_some() {
            derive_options(&mut state, descriptor.scope, graph);
            state.feedback = Some(Feedback::info(feedback::READY));
        } else {
            state.feedback = Some(Feedback::error(feedback::NOT_BOUND));
        }

        Arc::new(Self {
            order_id: descriptor.order_id,
            scope: descriptor.scope,
            set_url: descriptor.set_url,
            busy: AtomicBool::new(false),
            state: Mutex::new(state),
        })
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_url(&self) -> Option<&str> {
        self.set_url.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claims the widget for one request. `None` while another request holds it.
    ///
    /// Synchronous so the claim is made before the caller's first await.
    pub fn try_begin_request(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { widget: self })
    }

    pub async fn current_state(&self) -> String {
        self.state.lock().await.current_state.clone()
    }

    pub async fn options_loaded(&self) -> bool {
        self.state.lock().await.options_loaded
    }

    /// Re-derives the option list for the current state from `graph`.
    pub async fn populate(&self, graph: &TransitionGraph) {
        if self.set_url.is_none() {
            return;
        }
        let mut state = self.state.lock().await;
        derive_options(&mut state, self.scope, graph);
    }

    /// Populates only when the options are stale for the current state.
    pub async fn ensure_populated(&self, graph: &TransitionGraph) {
        if self.set_url.is_none() {
            return;
        }
        let mut state = self.state.lock().await;
        if !state.options_loaded {
            derive_options(&mut state, self.scope, graph);
        }
    }

    /// Adopts a state reported by the backend and marks the options stale.
    pub async fn apply_authoritative_state(&self, new_state: &str) {
        let mut state = self.state.lock().await;
        state.current_state = new_state.to_string();
        state.options_loaded = false;
    }

    pub async fn set_feedback(&self, feedback: Feedback) {
        self.state.lock().await.feedback = Some(feedback);
    }

    pub async fn feedback(&self) -> Option<Feedback> {
        self.state.lock().await.feedback.clone()
    }

    pub async fn select(&self, action: &str) {
        self.state.lock().await.selected_action = Some(action.to_string());
    }

    pub async fn clear_selection(&self) {
        self.state.lock().await.selected_action = None;
    }

    /// Shows the progress indicator and opens a new progress epoch.
    pub(crate) async fn begin_progress(&self, message: &str) -> u64 {
        let mut state = self.state.lock().await;
        state.progress_visible = true;
        state.progress_epoch += 1;
        state.feedback = Some(Feedback::info(message));
        state.progress_epoch
    }

    /// Writes a progress message unless the epoch it belongs to has ended.
    pub(crate) async fn progress_message(&self, epoch: u64, message: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.progress_epoch != epoch || !state.progress_visible {
            return false;
        }
        state.feedback = Some(Feedback::info(message));
        true
    }

    /// Closes the current progress epoch so late timers become no-ops.
    pub(crate) async fn end_progress(&self) {
        let mut state = self.state.lock().await;
        state.progress_epoch += 1;
    }

    pub(crate) async fn hide_progress(&self) {
        self.state.lock().await.progress_visible = false;
    }

    pub async fn view(&self) -> WidgetView {
        let busy = self.is_busy();
        let state = self.state.lock().await;
        WidgetView {
            order_id: self.order_id.clone(),
            scope: self.scope,
            current_state: state.current_state.clone(),
            current_label: label_of(&state.current_state),
            options: state.options.clone(),
            selectable: self.set_url.is_some() && state.has_actions && !busy,
            busy,
            progress_visible: state.progress_visible,
            selected_action: state.selected_action.clone(),
            feedback: state.feedback.clone(),
        }
    }
}

fn derive_options(state: &mut ControlState, scope: Scope, graph: &TransitionGraph) {
    let actions = graph.actions_for(scope, &state.current_state);
    state.options.clear();
    if actions.is_empty() {
        state.options.push(SelectOption::placeholder(feedback::NO_OPTIONS));
    } else {
        state
            .options
            .push(SelectOption::placeholder(feedback::CHOOSE_STATE));
        state
            .options
            .extend(actions.iter().map(|action| SelectOption {
                value: action.clone(),
                label: label_of(action),
            }));
    }
    state.has_actions = !actions.is_empty();
    state.options_loaded = true;
}

/// Releases the widget's busy flag when dropped, on every exit path.
pub struct BusyGuard<'a> {
    widget: &'a ControlWidget,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.widget.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/widget_tests.rs"]
mod tests;
