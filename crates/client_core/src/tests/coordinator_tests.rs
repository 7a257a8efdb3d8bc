use super::*;
use crate::{
    feedback::FeedbackKind,
    page::ControlPage,
    test_support::{descriptor, order_id, order_row, page_with, MetaScript, SetScript, TestBackend},
};
use shared::{domain::TransitionGraph, error::BackendError};

fn applied(order_state: &str) -> SetStateResponse {
    SetStateResponse {
        ok: true,
        order_state: Some(order_state.into()),
        ..SetStateResponse::default()
    }
}

fn rejected(error: Option<&str>) -> SetScript {
    SetScript::Reply(SetStateReply::ok(SetStateResponse {
        ok: false,
        error: error.map(BackendError::new),
        ..SetStateResponse::default()
    }))
}

async fn order_widget(page: &ControlPage) -> Arc<ControlWidget> {
    Arc::clone(page.widget(&order_id(), Scope::Order).expect("order control"))
}

#[tokio::test]
async fn successful_transition_updates_label_and_rederives_options() {
    let backend = Arc::new(TestBackend::accepting(applied("in_progress")));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;

    match outcome {
        TransitionOutcome::Applied { reconciled, .. } => assert_eq!(reconciled, vec![Scope::Order]),
        other => panic!("expected applied outcome, got {other:?}"),
    }
    let view = widget.view().await;
    assert_eq!(view.current_state, "in_progress");
    assert_eq!(view.current_label, "In Bearbeitung");
    assert_eq!(view.actions(), vec!["complete", "cancel"]);
    assert_eq!(view.selected_action, None);
    assert_eq!(view.feedback, Some(Feedback::success(feedback::SAVED)));
    assert!(!view.busy);
    assert!(!view.progress_visible);

    let requests = backend.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].1,
        SetStateRequest {
            scope: Scope::Order,
            action: "process".into()
        }
    );
    assert!(requests[0].0.ends_with("/set-state/"));
}

#[tokio::test]
async fn success_reconciles_siblings_and_skips_absent_scopes() {
    let backend = Arc::new(TestBackend::accepting(SetStateResponse {
        ok: true,
        order_state: Some("cancelled".into()),
        payment_state: Some("cancelled".into()),
        shipping_state: Some(String::new()),
        error: None,
    }));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        order_row("open", "open", "open"),
    )
    .await;
    let order = order_widget(&page).await;

    let outcome = page.on_user_select(&order, "cancel").await;
    assert!(matches!(outcome, TransitionOutcome::Applied { .. }));

    let payment = page
        .widget(&order_id(), Scope::Payment)
        .expect("payment")
        .view()
        .await;
    assert_eq!(payment.current_state, "cancelled");
    assert_eq!(payment.current_label, "Storniert");
    assert_eq!(payment.actions(), vec!["reopen"]);
    assert_eq!(payment.feedback, Some(Feedback::success(feedback::SIBLING_UPDATED)));

    let delivery = page
        .widget(&order_id(), Scope::Delivery)
        .expect("delivery")
        .view()
        .await;
    assert_eq!(delivery.current_state, "open");
    assert_eq!(delivery.feedback, Some(Feedback::info(feedback::READY)));
}

#[tokio::test]
async fn mistyped_state_field_does_not_block_reconciliation() {
    let body: SetStateResponse =
        serde_json::from_str(r#"{"ok":true,"order_state":"in_progress","payment_state":5}"#)
            .expect("payload");
    let backend = Arc::new(TestBackend::accepting(body));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        order_row("open", "open", "open"),
    )
    .await;
    let order = order_widget(&page).await;

    let outcome = page.on_user_select(&order, "process").await;
    match outcome {
        TransitionOutcome::Applied { reconciled, .. } => assert_eq!(reconciled, vec![Scope::Order]),
        other => panic!("expected applied outcome, got {other:?}"),
    }
    assert_eq!(order.view().await.current_state, "in_progress");

    let payment = page
        .widget(&order_id(), Scope::Payment)
        .expect("payment")
        .view()
        .await;
    assert_eq!(payment.current_state, "open");
    assert_eq!(payment.feedback, Some(Feedback::info(feedback::READY)));
}

#[tokio::test]
async fn reconciliation_stays_within_the_same_order() {
    let backend = Arc::new(TestBackend::accepting(applied("in_progress")));
    let mut other_order = descriptor(Scope::Order, "open");
    other_order.order_id = shared::domain::OrderId::new("another-order");
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open"), other_order],
    )
    .await;
    let widget = order_widget(&page).await;

    page.on_user_select(&widget, "process").await;

    let untouched = page
        .widget(&shared::domain::OrderId::new("another-order"), Scope::Order)
        .expect("other order")
        .view()
        .await;
    assert_eq!(untouched.current_state, "open");
    assert_eq!(untouched.actions(), vec!["process", "cancel"]);
}

#[tokio::test]
async fn rejection_refreshes_graph_and_lists_available_transitions() {
    let backend = Arc::new(TestBackend::new(
        MetaScript::Graph(TransitionGraph::new().with_actions(Scope::Order, "open", ["cancel"])),
        rejected(None),
    ));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        order_row("open", "open", "open"),
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;

    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            available: Some(vec!["cancel".to_string()]),
            message: "Nicht möglich. Verfügbare Übergänge: cancel".into(),
        }
    );
    assert_eq!(backend.meta_calls(), 1);

    let view = widget.view().await;
    assert_eq!(
        view.feedback,
        Some(Feedback::error("Nicht möglich. Verfügbare Übergänge: cancel"))
    );
    assert_eq!(view.current_state, "open");
    assert_eq!(view.actions(), vec!["cancel"]);
    assert!(!view.busy);
    assert!(view.selectable);

    // siblings are repopulated from the refreshed graph too
    let payment = page
        .widget(&order_id(), Scope::Payment)
        .expect("payment")
        .view()
        .await;
    assert!(payment.actions().is_empty());
    assert!(!payment.selectable);
}

#[tokio::test]
async fn rejection_with_no_remaining_transitions_says_none() {
    let backend = Arc::new(TestBackend::new(
        MetaScript::Graph(TransitionGraph::new().with_actions(Scope::Order, "completed", ["reopen"])),
        rejected(Some("Transition not allowed")),
    ));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;
    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            available: Some(Vec::new()),
            message: "Nicht möglich. Verfügbare Übergänge: keine".into(),
        }
    );
}

#[tokio::test]
async fn rejection_without_refresh_shows_server_error_text() {
    let backend = Arc::new(TestBackend::new(
        MetaScript::NetworkError,
        rejected(Some("Shopware: transition 'process' not available")),
    ));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;
    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            available: None,
            message: "Shopware: transition 'process' not available".into(),
        }
    );
    // graph untouched: the stale options remain on offer
    assert_eq!(widget.view().await.actions(), vec!["process", "cancel"]);
    assert!(!widget.is_busy());
}

#[tokio::test]
async fn rejection_without_refresh_or_error_text_uses_generic_message() {
    let backend = Arc::new(TestBackend::new(MetaScript::NotOk, rejected(None)));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    page.on_user_select(&widget, "process").await;
    assert_eq!(
        widget.feedback().await,
        Some(Feedback::error(feedback::SET_FAILED))
    );
}

#[tokio::test]
async fn non_success_status_is_a_rejection_even_with_ok_body() {
    let backend = Arc::new(TestBackend::new(
        MetaScript::NetworkError,
        SetScript::Reply(SetStateReply {
            status: 502,
            body: applied("in_progress"),
        }),
    ));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;
    assert!(matches!(outcome, TransitionOutcome::Rejected { .. }));
    assert_eq!(widget.current_state().await, "open");
}

#[tokio::test]
async fn transport_failure_returns_control_to_idle() {
    let backend = Arc::new(TestBackend::new(
        MetaScript::NetworkError,
        SetScript::NetworkError,
    ));
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open")],
    )
    .await;
    let widget = order_widget(&page).await;

    let outcome = page.on_user_select(&widget, "process").await;
    assert_eq!(
        outcome,
        TransitionOutcome::Failed {
            message: feedback::NETWORK_FAILURE.into()
        }
    );
    let view = widget.view().await;
    assert!(!view.busy);
    assert!(view.selectable);
    assert!(!view.progress_visible);
    let shown = view.feedback.expect("feedback");
    assert_eq!(shown.kind, FeedbackKind::Error);
    assert_eq!(shown.text, feedback::NETWORK_FAILURE);
    assert_eq!(backend.meta_calls(), 0);

    // retry is manual and works once the network is back
    backend
        .script_set(SetScript::Reply(SetStateReply::ok(applied("in_progress"))))
        .await;
    let retry = page.on_user_select(&widget, "process").await;
    assert!(matches!(retry, TransitionOutcome::Applied { .. }));
    assert_eq!(backend.set_calls(), 2);
}

#[tokio::test]
async fn second_selection_while_busy_has_no_effect() {
    let backend = Arc::new(TestBackend::accepting(applied("in_progress")).gated());
    let page = Arc::new(
        page_with(
            Arc::clone(&backend),
            ProgressSchedule::disabled(),
            vec![descriptor(Scope::Order, "open")],
        )
        .await,
    );
    let widget = order_widget(&page).await;

    let first = {
        let page = Arc::clone(&page);
        let widget = Arc::clone(&widget);
        tokio::spawn(async move { page.on_user_select(&widget, "process").await })
    };
    while backend.set_calls() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(widget.is_busy());
    let before = widget.view().await;

    let second = page.on_user_select(&widget, "cancel").await;
    assert_eq!(second, TransitionOutcome::Ignored(IgnoredReason::Busy));
    assert_eq!(backend.set_calls(), 1);
    assert_eq!(widget.view().await, before);

    backend.release();
    let first = first.await.expect("first request task");
    assert!(matches!(first, TransitionOutcome::Applied { .. }));
    assert!(!widget.is_busy());
}

#[tokio::test]
async fn selections_that_cannot_be_sent_are_ignored() {
    let backend = Arc::new(TestBackend::accepting(applied("in_progress")));
    let mut unbound = descriptor(Scope::Payment, "open");
    unbound.set_url = None;
    let page = page_with(
        Arc::clone(&backend),
        ProgressSchedule::disabled(),
        vec![descriptor(Scope::Order, "open"), unbound],
    )
    .await;
    let order = order_widget(&page).await;
    let payment = Arc::clone(page.widget(&order_id(), Scope::Payment).expect("payment"));

    assert_eq!(
        page.on_user_select(&order, "  ").await,
        TransitionOutcome::Ignored(IgnoredReason::NoAction)
    );
    assert_eq!(
        page.on_user_select(&payment, "paid").await,
        TransitionOutcome::Ignored(IgnoredReason::NotBound)
    );
    assert_eq!(backend.set_calls(), 0);
    assert!(!order.is_busy());
    assert!(!payment.is_busy());
}

#[tokio::test(start_paused = true)]
async fn progress_messages_stop_at_the_terminal_state() {
    let backend = Arc::new(TestBackend::accepting(applied("in_progress")).gated());
    let page = Arc::new(
        page_with(
            Arc::clone(&backend),
            ProgressSchedule::default(),
            vec![descriptor(Scope::Order, "open")],
        )
        .await,
    );
    let widget = order_widget(&page).await;

    let request = {
        let page = Arc::clone(&page);
        let widget = Arc::clone(&widget);
        tokio::spawn(async move { page.on_user_select(&widget, "process").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let view = widget.view().await;
    assert!(view.progress_visible);
    assert_eq!(view.feedback, Some(Feedback::info(feedback::SAVE_STARTED)));

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(
        widget.feedback().await,
        Some(Feedback::info("Auf Antwort von Shopware warten…"))
    );

    backend.release();
    request.await.expect("request task");
    assert_eq!(widget.feedback().await, Some(Feedback::success(feedback::SAVED)));
    assert!(!widget.view().await.progress_visible);

    // the 1700 ms message must never overwrite the final result
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(widget.feedback().await, Some(Feedback::success(feedback::SAVED)));
}
