use std::collections::HashMap;

use chrono::Utc;

use super::{FlowEvent, FlowEventKind};

/// Almacenamiento de eventos append-only.
pub trait EventStore: Send {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, flow_id: &str, kind: FlowEventKind) -> FlowEvent;
    /// Lista eventos de un flujo (orden ascendente por seq).
    fn list(&self, flow_id: &str) -> Vec<FlowEvent>;
    /// Elimina el rastro de un flujo (al quitarlo del motor).
    fn clear(&mut self, flow_id: &str);
}

#[derive(Default)]
pub struct InMemoryEventStore {
    inner: HashMap<String, Vec<FlowEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&mut self, flow_id: &str, kind: FlowEventKind) -> FlowEvent {
        let vec = self.inner.entry(flow_id.to_string()).or_default();
        let seq = vec.len() as u64;
        let ev = FlowEvent { seq,
                             flow_id: flow_id.to_string(),
                             kind,
                             ts: Utc::now() };
        vec.push(ev.clone());
        ev
    }

    fn list(&self, flow_id: &str) -> Vec<FlowEvent> {
        self.inner.get(flow_id).cloned().unwrap_or_default()
    }

    fn clear(&mut self, flow_id: &str) {
        self.inner.remove(flow_id);
    }
}
