//! Errores del motor de flujos.

use autoflow_comm::DeviceError;
use autoflow_domain::VariableError;
use thiserror::Error;

use crate::model::FlowStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("flow not found: {0}")]
    FlowNotFound(String),

    /// La transición pedida no es legal desde el estado actual; el estado no
    /// cambia.
    #[error("flow '{flow_id}': invalid transition {from} -> {to}")]
    InvalidStateTransition { flow_id: String, from: FlowStatus, to: FlowStatus },

    /// Fallo terminal de una corrida, con la instrucción que lo provocó.
    #[error("flow '{flow_id}' failed at instruction '{instruction_id}': {cause}")]
    FlowExecution {
        flow_id: String,
        instruction_id: String,
        cause: Box<EngineError>,
    },

    #[error("no handler registered for instruction type '{0}'")]
    HandlerNotFound(String),

    #[error("instruction '{instruction_id}' ({instruction_type}) rejected by validation")]
    ValidationRejected { instruction_id: String, instruction_type: String },

    #[error("instruction '{instruction_id}': parameter '{name}' {reason}")]
    InvalidParameter {
        instruction_id: String,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_parameter(instruction_id: &str, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { instruction_id: instruction_id.to_string(),
                                 name: name.to_string(),
                                 reason: reason.into() }
    }

    /// Causa raíz si es un `FlowExecution`, el propio error si no.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::FlowExecution { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
