//! Transportes: cómo se abre, lee y escribe una conexión.
//!
//! La lógica de registro, timeouts y marcado de desconexión vive en
//! `DeviceManager`; un transporte sólo implementa I/O sobre su conexión.

use async_trait::async_trait;

use crate::address::RegisterArea;
use crate::error::TransportError;

pub mod modbus;
pub mod modbus_rtu;
pub mod modbus_tcp;
pub mod simulated;

pub use modbus::ModbusTransport;
pub use modbus_rtu::ModbusRtuConnector;
pub use modbus_tcp::ModbusTcpConnector;
pub use simulated::{SimulatedConnector, SimulatedDevice};

/// Conexión abierta con un dispositivo.
#[async_trait]
pub trait Transport: Send {
    /// `area` es `Holding` o `Input`.
    async fn read_words(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// `area` es `Coil` o `Discrete`.
    async fn read_bits(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<bool>, TransportError>;

    async fn write_words(&mut self, offset: u16, words: &[u16]) -> Result<(), TransportError>;

    async fn write_bits(&mut self, offset: u16, bits: &[bool]) -> Result<(), TransportError>;
}

/// Abre conexiones de un dispositivo concreto.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Descripción legible para logs, p. ej. `tcp://10.0.0.5:502?unitId=1`.
    fn describe(&self) -> String;
}
