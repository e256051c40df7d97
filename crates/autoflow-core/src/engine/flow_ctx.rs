//! Contexto de ejecución de una corrida.

use std::sync::Arc;

use autoflow_comm::DeviceManager;
use autoflow_domain::VariableStore;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::model::FlowStatus;

/// Lo que un handler ve de la corrida que lo ejecuta. Clonar es barato:
/// todos los campos son compartidos.
#[derive(Clone)]
pub struct FlowContext {
    flow_id: Arc<str>,
    run_id: Uuid,
    status: watch::Receiver<FlowStatus>,
    variables: Arc<VariableStore>,
    devices: Arc<DeviceManager>,
    current: Arc<Mutex<Option<String>>>,
}

impl FlowContext {
    pub fn new(flow_id: &str,
               run_id: Uuid,
               status: watch::Receiver<FlowStatus>,
               variables: Arc<VariableStore>,
               devices: Arc<DeviceManager>)
               -> Self {
        Self { flow_id: Arc::from(flow_id),
               run_id,
               status,
               variables,
               devices,
               current: Arc::new(Mutex::new(None)) }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    /// Estado vivo del flujo (puede cambiar mientras el handler corre).
    pub fn status(&self) -> FlowStatus {
        *self.status.borrow()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.status() == FlowStatus::Stopped
    }

    /// Se completa cuando se pide `stop` sobre esta corrida. Pensado para
    /// `tokio::select!` en handlers de larga duración.
    pub async fn stop_requested(&self) {
        let mut rx = self.status.clone();
        // sender descartado: el flujo fue reemplazado, también cuenta como stop
        let _ = rx.wait_for(|s| *s == FlowStatus::Stopped).await;
    }

    pub fn current_instruction(&self) -> Option<String> {
        self.current.lock().clone()
    }

    pub(crate) fn set_current_instruction(&self, instruction_id: Option<&str>) {
        *self.current.lock() = instruction_id.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_requested_resolves_on_stop() {
        let (tx, rx) = watch::channel(FlowStatus::Running);
        let ctx = FlowContext::new("f", Uuid::new_v4(), rx, Arc::default(), Arc::default());
        assert!(!ctx.is_stop_requested());

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.stop_requested().await })
        };
        tx.send_replace(FlowStatus::Paused);
        tx.send_replace(FlowStatus::Stopped);
        waiter.await.unwrap();
        assert!(ctx.is_stop_requested());
    }

    #[test]
    fn current_instruction_is_shared_between_clones() {
        let (_tx, rx) = watch::channel(FlowStatus::Running);
        let ctx = FlowContext::new("f", Uuid::new_v4(), rx, Arc::default(), Arc::default());
        let clone = ctx.clone();
        ctx.set_current_instruction(Some("i3"));
        assert_eq!(clone.current_instruction().as_deref(), Some("i3"));
    }
}
