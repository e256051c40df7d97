//! Transporte serie: Modbus RTU (RS-485) sobre `tokio-serial`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_modbus::client::rtu;
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

use super::{Connector, ModbusTransport, Transport};
use crate::error::{DeviceError, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    None,
    Even,
    Odd,
}

#[derive(Debug)]
pub struct ModbusRtuConnector {
    port: String,
    baud_rate: u32,
    parity: Parity,
    data_bits: DataBits,
    stop_bits: StopBits,
    slave_id: u8,
}

impl ModbusRtuConnector {
    /// Valida los parámetros de línea al construir; un perfil inválido se
    /// rechaza al registrar el dispositivo y no al conectar.
    pub fn new(port: impl Into<String>,
               baud_rate: u32,
               parity: SerialParity,
               data_bits: u8,
               stop_bits: u8,
               slave_id: u8)
               -> Result<Self, DeviceError> {
        if baud_rate == 0 {
            return Err(DeviceError::Config("baud rate must be greater than zero".into()));
        }
        Ok(Self { port: port.into(),
                  baud_rate,
                  parity: map_parity(parity),
                  data_bits: map_data_bits(data_bits)?,
                  stop_bits: map_stop_bits(stop_bits)?,
                  slave_id })
    }
}

#[async_trait]
impl Connector for ModbusRtuConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        let builder = tokio_serial::new(self.port.as_str(), self.baud_rate).parity(self.parity)
                                                                           .data_bits(self.data_bits)
                                                                           .stop_bits(self.stop_bits);
        let stream = SerialStream::open(&builder).map_err(TransportError::comm)?;
        let ctx = rtu::attach_slave(stream, Slave(self.slave_id));
        Ok(Box::new(ModbusTransport::new(ctx)))
    }

    fn describe(&self) -> String {
        format!("rtu://{}?baud={}&parity={:?}&dataBits={:?}&stopBits={:?}&slaveId={}",
                self.port, self.baud_rate, self.parity, self.data_bits, self.stop_bits, self.slave_id)
    }
}

fn map_parity(parity: SerialParity) -> Parity {
    match parity {
        SerialParity::None => Parity::None,
        SerialParity::Even => Parity::Even,
        SerialParity::Odd => Parity::Odd,
    }
}

fn map_data_bits(bits: u8) -> Result<DataBits, DeviceError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(DeviceError::Config(format!("unsupported data bits: {other}"))),
    }
}

fn map_stop_bits(bits: u8) -> Result<StopBits, DeviceError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(DeviceError::Config(format!("unsupported stop bits: {other}"))),
    }
}
