//! Errores de persistencia.

use autoflow_domain::VariableError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("not found: {0}")]
    NotFound(String),

    /// El contenido cargado no es aceptado por el store (duplicados,
    /// restricciones violadas).
    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error("serialization: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
