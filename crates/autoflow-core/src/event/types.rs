//! Tipos de evento del flujo y estructura `FlowEvent`.
//!
//! Cada corrida del `FlowEngine` deja un rastro append-only por flujo. El
//! rastro es observacional: el estado vivo sale del motor, no de un replay.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowEventKind {
    /// Primer evento de cada corrida.
    RunStarted {
        run_id: Uuid,
        definition_hash: String,
        instruction_count: usize,
    },
    InstructionStarted { index: usize, instruction_id: String },
    /// Instrucción deshabilitada; no se resolvió handler.
    InstructionSkipped { index: usize, instruction_id: String },
    InstructionFinished { index: usize, instruction_id: String },
    InstructionFailed {
        index: usize,
        instruction_id: String,
        error: String,
    },
    RunPaused,
    RunResumed,
    /// `completed` es true si se agotaron las instrucciones, false si fue
    /// un `stop` explícito.
    RunStopped { completed: bool },
    RunFailed { instruction_id: String },
}

impl FlowEventKind {
    /// Código de una letra, útil para asertar secuencias en tests.
    pub fn code(&self) -> &'static str {
        match self {
            FlowEventKind::RunStarted { .. } => "I",
            FlowEventKind::InstructionStarted { .. } => "S",
            FlowEventKind::InstructionSkipped { .. } => "K",
            FlowEventKind::InstructionFinished { .. } => "F",
            FlowEventKind::InstructionFailed { .. } => "X",
            FlowEventKind::RunPaused => "P",
            FlowEventKind::RunResumed => "R",
            FlowEventKind::RunStopped { .. } => "C",
            FlowEventKind::RunFailed { .. } => "E",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub seq: u64, // por flujo, asignado por el EventStore
    pub flow_id: String,
    pub kind: FlowEventKind,
    pub ts: DateTime<Utc>,
}
