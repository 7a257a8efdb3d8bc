//! Propagates authoritative states from a successful mutation to sibling controls.

use std::sync::Arc;

use shared::{
    domain::{OrderId, Scope, TransitionGraph},
    protocol::SetStateResponse,
};
use tracing::debug;

use crate::{
    feedback::{self, Feedback},
    widget::ControlWidget,
};

/// Updates every control of `order_id` whose scope is present in `response`.
///
/// Returns the scopes that were applied. Scopes missing from the payload, or
/// without a control on the page, are skipped.
pub async fn broadcast(
    order_id: &OrderId,
    response: &SetStateResponse,
    widgets: &[Arc<ControlWidget>],
    graph: &TransitionGraph,
) -> Vec<Scope> {
    let mut applied = Vec::new();

    for scope in Scope::ALL {
        let Some(state) = response.state_for(scope) else {
            continue;
        };
        let Some(target) = widgets
            .iter()
            .find(|widget| widget.order_id() == order_id && widget.scope() == scope)
        else {
            debug!(order_id = %order_id, %scope, "no control on page for reconciled scope");
            continue;
        };

        target.apply_authoritative_state(state).await;
        target.ensure_populated(graph).await;
        target
            .set_feedback(Feedback::success(feedback::SIBLING_UPDATED))
            .await;
        applied.push(scope);
    }

    applied
}
