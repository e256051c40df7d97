//! Errores del almacén de variables.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VariableError {
    /// Nombre, índice o alias ya registrado en el store.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("variable not found: {0}")]
    NotFound(String),

    /// El valor almacenado (o el entrante) no se puede convertir al tipo pedido.
    #[error("type mismatch on '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },

    /// Violación de rango, longitud o de la marca de sólo lectura.
    #[error("validation failed on '{name}': {reason}")]
    Validation { name: String, reason: String },
}

impl VariableError {
    pub(crate) fn validation(name: &str, reason: impl Into<String>) -> Self {
        Self::Validation { name: name.to_string(),
                           reason: reason.into() }
    }

    pub(crate) fn mismatch(name: &str, expected: &'static str, found: &str) -> Self {
        Self::TypeMismatch { name: name.to_string(),
                             expected,
                             found: found.to_string() }
    }
}
