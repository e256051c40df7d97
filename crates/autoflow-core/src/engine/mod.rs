//! Motor de flujos: máquina de estados, contexto por corrida y builder.

pub mod builder;
pub mod core;
pub mod flow_ctx;

pub use builder::FlowEngineBuilder;
pub use core::{EngineConfig, FlowEngine, FlowRunHandle};
pub use flow_ctx::FlowContext;
