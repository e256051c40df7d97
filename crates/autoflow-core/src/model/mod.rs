//! Modelo de flujos: instrucciones, definiciones y estados.

mod definition;
mod instruction;
mod status;

pub use definition::FlowDefinition;
pub use instruction::Instruction;
pub use status::FlowStatus;
