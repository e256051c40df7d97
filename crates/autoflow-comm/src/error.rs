use thiserror::Error;

/// Errores visibles para quien usa el `DeviceManager`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// El dispositivo no tiene perfil registrado o no está conectado.
    #[error("device not found or not connected: {0}")]
    DeviceNotFound(String),

    /// Fallo de transporte (timeout, reset, excepción Modbus, respuesta
    /// malformada). El dispositivo queda marcado como desconectado.
    #[error("communication error on '{device_id}': {message}")]
    Communication { device_id: String, message: String },

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unsupported command '{0}'")]
    UnsupportedCommand(String),

    /// Comando conocido con parámetros inválidos.
    #[error("invalid parameters for '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("device config error: {0}")]
    Config(String),
}

impl DeviceError {
    pub(crate) fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress { address: address.into(),
                               reason: reason.into() }
    }
}

/// Error interno de un transporte; el manager lo traduce a
/// `DeviceError::Communication` añadiendo el id del dispositivo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,

    #[error("comm error: {message}")]
    Comm { message: String },

    #[error("modbus exception: {0}")]
    Exception(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn comm(message: impl ToString) -> Self {
        Self::Comm { message: message.to_string() }
    }
}
