//! Core FlowEngine implementation
//!
//! Cada flujo registrado tiene un slot con su definición y un canal `watch`
//! de estado. Las transiciones se hacen con la entrada del `DashMap`
//! tomada; la corrida vive en su propia tarea de Tokio y sólo lee el canal
//! en los bordes de instrucción. Mientras un handler ejecuta, el motor no
//! tiene ningún lock tomado.

use std::sync::Arc;

use autoflow_comm::DeviceManager;
use autoflow_domain::VariableStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::FlowContext;
use crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::errors::EngineError;
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::model::{FlowDefinition, FlowStatus, Instruction};
use crate::registry::{InstructionHandler, InstructionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Eventos retenidos por suscriptor de `subscribe_events`.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY }
    }
}

struct FlowSlot {
    definition: Arc<FlowDefinition>,
    status: watch::Sender<FlowStatus>,
    /// Corrida dueña del canal actual; `None` antes del primer start.
    run_id: Option<Uuid>,
    last_error: Option<EngineError>,
}

impl FlowSlot {
    fn ready(definition: FlowDefinition) -> Self {
        let (status, _) = watch::channel(FlowStatus::Ready);
        Self { definition: Arc::new(definition),
               status,
               run_id: None,
               last_error: None }
    }

    fn current(&self) -> FlowStatus {
        *self.status.borrow()
    }
}

pub(crate) struct EngineShared {
    flows: DashMap<String, FlowSlot>,
    registry: Arc<InstructionRegistry>,
    variables: Arc<VariableStore>,
    devices: Arc<DeviceManager>,
    events: Mutex<Box<dyn EventStore>>,
    event_tx: broadcast::Sender<FlowEvent>,
}

impl EngineShared {
    fn emit(&self, flow_id: &str, kind: FlowEventKind) {
        let event = self.events.lock().append_kind(flow_id, kind);
        // sin suscriptores el envío falla; no es un error
        let _ = self.event_tx.send(event);
    }
}

/// Motor de ejecución de flujos.
///
/// Clonar comparte el mismo motor.
#[derive(Clone)]
pub struct FlowEngine {
    shared: Arc<EngineShared>,
}

impl FlowEngine {
    /// Motor con registro vacío y eventos en memoria.
    pub fn new(variables: Arc<VariableStore>, devices: Arc<DeviceManager>) -> Self {
        Self::builder(variables, devices).build()
    }

    pub fn builder(variables: Arc<VariableStore>, devices: Arc<DeviceManager>) -> super::FlowEngineBuilder {
        super::FlowEngineBuilder::new(variables, devices)
    }

    pub(crate) fn from_parts(variables: Arc<VariableStore>,
                             devices: Arc<DeviceManager>,
                             registry: Arc<InstructionRegistry>,
                             events: Option<Box<dyn EventStore>>,
                             config: EngineConfig)
                             -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let events = events.unwrap_or_else(|| Box::new(InMemoryEventStore::new()));
        Self { shared: Arc::new(EngineShared { flows: DashMap::new(),
                                               registry,
                                               variables,
                                               devices,
                                               events: Mutex::new(events),
                                               event_tx }) }
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.shared.variables
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.shared.devices
    }

    pub fn registry(&self) -> &Arc<InstructionRegistry> {
        &self.shared.registry
    }

    /// Registra (o reemplaza) un handler; afecta sólo a las instrucciones
    /// resueltas después de esta llamada.
    pub fn register_instruction_handler(&self, instruction_type: &str, handler: Arc<dyn InstructionHandler>) {
        self.shared.registry.register(instruction_type, handler);
    }

    /// Registra una definición en estado `Ready`. Reemplazar un flujo con una
    /// corrida viva no está permitido.
    pub fn add_flow(&self, definition: FlowDefinition) -> Result<(), EngineError> {
        let flow_id = definition.flow_id().to_string();
        match self.shared.flows.entry(flow_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let from = occupied.get().current();
                if from.is_active() {
                    return Err(EngineError::InvalidStateTransition { flow_id,
                                                                     from,
                                                                     to: FlowStatus::Ready });
                }
                occupied.insert(FlowSlot::ready(definition));
                debug!("flow '{}' definition replaced", flow_id);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(FlowSlot::ready(definition));
                debug!("flow '{}' registered", flow_id);
            }
        }
        Ok(())
    }

    pub fn remove_flow(&self, flow_id: &str) -> Result<FlowDefinition, EngineError> {
        let removed = self.shared
                          .flows
                          .remove_if(flow_id, |_, slot| !slot.current().is_active());
        match removed {
            Some((_, slot)) => {
                self.shared.events.lock().clear(flow_id);
                debug!("flow '{}' removed", flow_id);
                Ok(Arc::unwrap_or_clone(slot.definition))
            }
            None => {
                let from = self.get_flow_status(flow_id)?;
                Err(EngineError::InvalidStateTransition { flow_id: flow_id.to_string(),
                                                          from,
                                                          to: FlowStatus::Ready })
            }
        }
    }

    pub fn flow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.flows.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn definition(&self, flow_id: &str) -> Result<Arc<FlowDefinition>, EngineError> {
        self.shared
            .flows
            .get(flow_id)
            .map(|slot| slot.definition.clone())
            .ok_or_else(|| EngineError::FlowNotFound(flow_id.to_string()))
    }

    /// Inicia una corrida nueva en una tarea de Tokio.
    ///
    /// Debe llamarse dentro de un runtime de Tokio.
    pub fn start_flow(&self, flow_id: &str) -> Result<FlowRunHandle, EngineError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| EngineError::Internal(e.to_string()))?;
        let mut slot = self.shared
                           .flows
                           .get_mut(flow_id)
                           .ok_or_else(|| EngineError::FlowNotFound(flow_id.to_string()))?;
        let from = slot.current();
        if from.is_active() {
            return Err(EngineError::InvalidStateTransition { flow_id: flow_id.to_string(),
                                                             from,
                                                             to: FlowStatus::Running });
        }

        // canal nuevo por corrida: una corrida anterior que aún termina su
        // última instrucción sigue viendo su propio estado terminal
        let run_id = Uuid::new_v4();
        let (status_tx, status_rx) = watch::channel(FlowStatus::Running);
        slot.status = status_tx;
        slot.run_id = Some(run_id);
        let definition = slot.definition.clone();

        self.shared.emit(flow_id,
                         FlowEventKind::RunStarted { run_id,
                                                     definition_hash: definition.definition_hash().to_string(),
                                                     instruction_count: definition.len() });
        info!("flow '{}' run {} started ({} instructions)", flow_id, run_id, definition.len());

        let ctx = FlowContext::new(flow_id,
                                   run_id,
                                   status_rx.clone(),
                                   self.shared.variables.clone(),
                                   self.shared.devices.clone());
        let join = runtime.spawn(drive(self.shared.clone(), ctx, status_rx, definition));
        drop(slot);

        Ok(FlowRunHandle { flow_id: flow_id.to_string(),
                           run_id,
                           join })
    }

    pub fn pause_flow(&self, flow_id: &str) -> bool {
        self.transition(flow_id, FlowStatus::Running, FlowStatus::Paused, FlowEventKind::RunPaused)
    }

    pub fn resume_flow(&self, flow_id: &str) -> bool {
        self.transition(flow_id, FlowStatus::Paused, FlowStatus::Running, FlowEventKind::RunResumed)
    }

    /// Pide la detención; la corrida la honra en el próximo borde de
    /// instrucción.
    pub fn stop_flow(&self, flow_id: &str) -> bool {
        let Some(slot) = self.shared.flows.get_mut(flow_id) else {
            return false;
        };
        if !slot.current().is_active() {
            return false;
        }
        slot.status.send_replace(FlowStatus::Stopped);
        self.shared.emit(flow_id, FlowEventKind::RunStopped { completed: false });
        info!("flow '{}' stop requested", flow_id);
        true
    }

    fn transition(&self, flow_id: &str, from: FlowStatus, to: FlowStatus, event: FlowEventKind) -> bool {
        let Some(slot) = self.shared.flows.get_mut(flow_id) else {
            return false;
        };
        if slot.current() != from {
            return false;
        }
        slot.status.send_replace(to);
        self.shared.emit(flow_id, event);
        debug!("flow '{}' {} -> {}", flow_id, from, to);
        true
    }

    pub fn get_flow_status(&self, flow_id: &str) -> Result<FlowStatus, EngineError> {
        self.shared
            .flows
            .get(flow_id)
            .map(|slot| slot.current())
            .ok_or_else(|| EngineError::FlowNotFound(flow_id.to_string()))
    }

    /// Error de la última corrida fallida del flujo.
    pub fn last_error(&self, flow_id: &str) -> Result<Option<EngineError>, EngineError> {
        self.shared
            .flows
            .get(flow_id)
            .map(|slot| slot.last_error.clone())
            .ok_or_else(|| EngineError::FlowNotFound(flow_id.to_string()))
    }

    pub fn events_for(&self, flow_id: &str) -> Vec<FlowEvent> {
        self.shared.events.lock().list(flow_id)
    }

    /// Eventos de todos los flujos a medida que ocurren (best-effort).
    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.shared.event_tx.subscribe()
    }
}

/// Handle de una corrida lanzada por `start_flow`.
#[derive(Debug)]
pub struct FlowRunHandle {
    flow_id: String,
    run_id: Uuid,
    join: JoinHandle<Result<FlowStatus, EngineError>>,
}

impl FlowRunHandle {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Espera el desenlace: `Ok(estado final)` o el `FlowExecution` que la
    /// terminó.
    pub async fn wait(self) -> Result<FlowStatus, EngineError> {
        self.join
            .await
            .map_err(|e| EngineError::Internal(format!("run task aborted: {e}")))?
    }
}

async fn drive(shared: Arc<EngineShared>,
               ctx: FlowContext,
               mut status_rx: watch::Receiver<FlowStatus>,
               definition: Arc<FlowDefinition>)
               -> Result<FlowStatus, EngineError> {
    let flow_id = ctx.flow_id().to_string();
    for (index, instruction) in definition.instructions().iter().enumerate() {
        // borde de instrucción: esperar mientras esté en pausa
        let status = match status_rx.wait_for(|s| *s != FlowStatus::Paused).await {
            Ok(s) => *s,
            Err(_) => FlowStatus::Stopped,
        };
        if status != FlowStatus::Running {
            info!("flow '{}' run {} halted before '{}' ({})", flow_id, ctx.run_id(), instruction.id, status);
            return Ok(status);
        }

        if !instruction.is_enabled {
            shared.emit(&flow_id,
                        FlowEventKind::InstructionSkipped { index,
                                                            instruction_id: instruction.id.clone() });
            continue;
        }

        ctx.set_current_instruction(Some(instruction.id.as_str()));
        shared.emit(&flow_id,
                    FlowEventKind::InstructionStarted { index,
                                                        instruction_id: instruction.id.clone() });
        match dispatch(&shared, instruction, &ctx).await {
            Ok(()) => {
                shared.emit(&flow_id,
                            FlowEventKind::InstructionFinished { index,
                                                                 instruction_id: instruction.id.clone() });
            }
            Err(cause) => {
                shared.emit(&flow_id,
                            FlowEventKind::InstructionFailed { index,
                                                               instruction_id: instruction.id.clone(),
                                                               error: cause.to_string() });
                let err = EngineError::FlowExecution { flow_id: flow_id.clone(),
                                                       instruction_id: instruction.id.clone(),
                                                       cause: Box::new(cause) };
                fail_run(&shared, &flow_id, ctx.run_id(), &instruction.id, &err);
                return Err(err);
            }
        }
    }
    ctx.set_current_instruction(None);
    Ok(complete_run(&shared, &flow_id, ctx.run_id()))
}

/// Resuelve, valida y ejecuta una instrucción. `validate` y `execute`
/// corren en una tarea propia para que un panic en cualquiera de los dos
/// se convierta en error de la corrida.
async fn dispatch(shared: &EngineShared, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
    let handler = shared.registry
                        .resolve(&instruction.instruction_type)
                        .ok_or_else(|| EngineError::HandlerNotFound(instruction.instruction_type.clone()))?;

    let task = {
        let instruction = instruction.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if !handler.validate(&instruction) {
                warn!("flow '{}': instruction '{}' ({}) rejected by validation",
                      ctx.flow_id(),
                      instruction.id,
                      instruction.instruction_type);
                return Err(EngineError::ValidationRejected { instruction_id: instruction.id.clone(),
                                                             instruction_type: instruction.instruction_type.clone() });
            }
            debug!("flow '{}': executing '{}' ({})", ctx.flow_id(), instruction.id, instruction.instruction_type);
            handler.execute(&instruction, &ctx).await
        })
    };
    match task.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            Err(EngineError::Internal(format!("handler for '{}' panicked", instruction.instruction_type)))
        }
        Err(join_err) => Err(EngineError::Internal(join_err.to_string())),
    }
}

fn complete_run(shared: &EngineShared, flow_id: &str, run_id: Uuid) -> FlowStatus {
    let Some(slot) = shared.flows.get_mut(flow_id) else {
        return FlowStatus::Stopped;
    };
    if slot.run_id != Some(run_id) {
        return FlowStatus::Stopped;
    }
    let current = slot.current();
    if current.is_active() {
        slot.status.send_replace(FlowStatus::Stopped);
        shared.emit(flow_id, FlowEventKind::RunStopped { completed: true });
        info!("flow '{}' run {} completed", flow_id, run_id);
        return FlowStatus::Stopped;
    }
    current
}

fn fail_run(shared: &EngineShared, flow_id: &str, run_id: Uuid, instruction_id: &str, err: &EngineError) {
    error!("{}", err);
    let Some(mut slot) = shared.flows.get_mut(flow_id) else {
        return;
    };
    if slot.run_id != Some(run_id) {
        return;
    }
    slot.last_error = Some(err.clone());
    // un stop pedido durante la instrucción fallida se respeta
    if slot.current().is_active() {
        slot.status.send_replace(FlowStatus::Error);
    }
    shared.emit(flow_id,
                FlowEventKind::RunFailed { instruction_id: instruction_id.to_string() });
}
