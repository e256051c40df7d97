//! autoflow-core: motor de flujos de instrucciones.
//!
//! - `model`: `Instruction`, `FlowDefinition` (con hash determinista) y
//!   `FlowStatus`.
//! - `registry`: handlers por tipo de instrucción (last-write-wins).
//! - `engine`: `FlowEngine`, una tarea de Tokio por corrida, pausa/stop
//!   cooperativos en los bordes de instrucción.
//! - `event`: rastro append-only por flujo.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod registry;

pub use engine::{EngineConfig, FlowContext, FlowEngine, FlowEngineBuilder, FlowRunHandle};
pub use errors::EngineError;
pub use event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
pub use model::{FlowDefinition, FlowStatus, Instruction};
pub use registry::{InstructionHandler, InstructionRegistry};
