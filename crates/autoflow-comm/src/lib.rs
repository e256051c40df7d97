//! autoflow-comm: capa de comunicación con dispositivos.
//!
//! Un único contrato asíncrono (`DeviceManager`) sobre transportes de red
//! (Modbus TCP), serie (Modbus RTU) y simulados. Las direcciones siguen el
//! modelo de registros Modbus, ver `address`.

pub mod address;
pub mod error;
pub mod manager;
pub mod profile;
pub mod transport;
pub mod value;

pub use address::{DeviceAddress, RegisterArea};
pub use error::{DeviceError, TransportError};
pub use manager::DeviceManager;
pub use profile::{DeviceConfig, DeviceProfile};
pub use transport::modbus_rtu::SerialParity;
pub use transport::{Connector, SimulatedConnector, SimulatedDevice, Transport};
pub use value::{DataType, DeviceScalar, DeviceValue, RawData};
