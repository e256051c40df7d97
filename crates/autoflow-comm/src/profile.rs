//! Perfiles de dispositivo: cómo se llega a cada uno.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::transport::modbus_rtu::SerialParity;
use crate::transport::{Connector, ModbusRtuConnector, ModbusTcpConnector, SimulatedDevice};

fn default_tcp_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum DeviceProfile {
    Tcp {
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
        #[serde(default = "default_unit_id")]
        unit_id: u8,
    },
    Serial {
        port: String,
        baud_rate: u32,
        parity: SerialParity,
        data_bits: u8,
        stop_bits: u8,
        #[serde(default = "default_unit_id")]
        slave_id: u8,
    },
    /// Dispositivo en memoria nuevo y vacío; para compartir la imagen con el
    /// llamador usar `DeviceManager::register_connector`.
    Simulated,
}

impl DeviceProfile {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        DeviceProfile::Tcp { host: host.into(),
                             port,
                             unit_id: default_unit_id() }
    }

    pub fn connector(&self) -> Result<Arc<dyn Connector>, DeviceError> {
        Ok(match self {
            DeviceProfile::Tcp { host, port, unit_id } => {
                if host.trim().is_empty() {
                    return Err(DeviceError::Config("tcp host must not be empty".into()));
                }
                Arc::new(ModbusTcpConnector::new(host.clone(), *port, *unit_id))
            }
            DeviceProfile::Serial { port,
                                    baud_rate,
                                    parity,
                                    data_bits,
                                    stop_bits,
                                    slave_id, } => {
                Arc::new(ModbusRtuConnector::new(port.clone(), *baud_rate, *parity, *data_bits, *stop_bits, *slave_id)?)
            }
            DeviceProfile::Simulated => Arc::new(SimulatedDevice::new().connector()),
        })
    }
}

/// Límites de tiempo del `DeviceManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl DeviceConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { connect_timeout: timeout,
               io_timeout: timeout }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::with_timeout(Duration::from_millis(3000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profiles_deserialize_from_tagged_json() {
        let p: DeviceProfile = serde_json::from_value(json!({"transport": "tcp", "host": "plc1"})).unwrap();
        assert_eq!(p, DeviceProfile::tcp("plc1", 502));

        let p: DeviceProfile = serde_json::from_value(json!({
            "transport": "serial", "port": "/dev/ttyS0", "baud_rate": 9600,
            "parity": "even", "data_bits": 8, "stop_bits": 1
        })).unwrap();
        assert!(matches!(p, DeviceProfile::Serial { slave_id: 1, parity: SerialParity::Even, .. }));
    }

    #[test]
    fn invalid_profiles_are_rejected_before_connecting() {
        assert!(matches!(DeviceProfile::tcp(" ", 502).connector(), Err(DeviceError::Config(_))));
        let serial = DeviceProfile::Serial { port: "/dev/ttyS0".into(),
                                             baud_rate: 9600,
                                             parity: SerialParity::None,
                                             data_bits: 4,
                                             stop_bits: 1,
                                             slave_id: 1 };
        assert!(serial.connector().is_err());
    }
}
