use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{OrderId, Scope, TransitionGraph},
    protocol::{SetStateRequest, SetStateResponse, TransitionsMetaResponse},
};
use storage::{GraphCache, MemoryGraphCache};
use tokio::sync::{Mutex, Notify};

use crate::{
    coordinator::ProgressSchedule,
    graph_store::TransitionGraphStore,
    page::ControlPage,
    transport::{OrderStateBackend, SetStateReply, TransportError},
    widget::ControlDescriptor,
};

pub(crate) const META_URL: &str = "http://backend.test/admin/orders/transitions-meta/";

#[derive(Clone)]
pub(crate) enum MetaScript {
    Graph(TransitionGraph),
    NotOk,
    NetworkError,
}

#[derive(Clone)]
pub(crate) enum SetScript {
    Reply(SetStateReply),
    NetworkError,
}

/// Scripted backend; `set_state` optionally waits for [`TestBackend::release`].
pub(crate) struct TestBackend {
    meta: Mutex<MetaScript>,
    set: Mutex<SetScript>,
    gate: Option<Notify>,
    pub(crate) meta_calls: AtomicUsize,
    pub(crate) set_calls: AtomicUsize,
    pub(crate) requests: Mutex<Vec<(String, SetStateRequest)>>,
}

impl TestBackend {
    pub(crate) fn new(meta: MetaScript, set: SetScript) -> Self {
        Self {
            meta: Mutex::new(meta),
            set: Mutex::new(set),
            gate: None,
            meta_calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn accepting(response: SetStateResponse) -> Self {
        Self::new(MetaScript::NetworkError, SetScript::Reply(SetStateReply::ok(response)))
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) async fn script_set(&self, script: SetScript) {
        *self.set.lock().await = script;
    }

    pub(crate) async fn script_meta(&self, script: MetaScript) {
        *self.meta.lock().await = script;
    }

    pub(crate) fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStateBackend for TestBackend {
    async fn fetch_transitions(
        &self,
        meta_url: &str,
    ) -> Result<TransitionsMetaResponse, TransportError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        match self.meta.lock().await.clone() {
            MetaScript::Graph(graph) => Ok(TransitionsMetaResponse {
                ok: true,
                transitions: Some(graph),
            }),
            MetaScript::NotOk => Ok(TransitionsMetaResponse {
                ok: false,
                transitions: None,
            }),
            MetaScript::NetworkError => Err(TransportError::Request {
                url: meta_url.to_string(),
                message: "connection refused".into(),
            }),
        }
    }

    async fn set_state(
        &self,
        set_url: &str,
        request: &SetStateRequest,
    ) -> Result<SetStateReply, TransportError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .await
            .push((set_url.to_string(), request.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.set.lock().await.clone() {
            SetScript::Reply(reply) => Ok(reply),
            SetScript::NetworkError => Err(TransportError::Request {
                url: set_url.to_string(),
                message: "network down".into(),
            }),
        }
    }
}

pub(crate) fn order_id() -> OrderId {
    OrderId::new("0190a1b2c3d4")
}

pub(crate) fn descriptor(scope: Scope, state: &str) -> ControlDescriptor {
    ControlDescriptor {
        order_id: order_id(),
        scope,
        current_state: state.to_string(),
        set_url: Some(format!(
            "http://backend.test/admin/orders/order/{}/set-state/",
            order_id()
        )),
    }
}

pub(crate) fn order_row(order: &str, payment: &str, delivery: &str) -> Vec<ControlDescriptor> {
    vec![
        descriptor(Scope::Order, order),
        descriptor(Scope::Payment, payment),
        descriptor(Scope::Delivery, delivery),
    ]
}

pub(crate) async fn static_store(backend: Arc<TestBackend>) -> Arc<TransitionGraphStore> {
    let cache: Arc<dyn GraphCache> = Arc::new(MemoryGraphCache::new());
    Arc::new(TransitionGraphStore::initialize(cache, backend, Some(META_URL.to_string())).await)
}

pub(crate) async fn page_with(
    backend: Arc<TestBackend>,
    progress: ProgressSchedule,
    descriptors: Vec<ControlDescriptor>,
) -> ControlPage {
    let store = static_store(Arc::clone(&backend)).await;
    ControlPage::bind(store, backend, progress, descriptors).await
}
