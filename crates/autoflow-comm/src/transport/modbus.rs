//! Transporte Modbus común: TCP y RTU sólo difieren en cómo se abre el
//! `Context`; la lectura/escritura es idéntica.

use async_trait::async_trait;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use super::Transport;
use crate::address::RegisterArea;
use crate::error::TransportError;

pub struct ModbusTransport {
    ctx: Context,
}

impl ModbusTransport {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

fn check_len<T>(data: Vec<T>, expected: u16) -> Result<Vec<T>, TransportError> {
    if data.len() < expected as usize {
        return Err(TransportError::Malformed(format!("expected {expected} items, got {}", data.len())));
    }
    Ok(data)
}

#[async_trait]
impl Transport for ModbusTransport {
    async fn read_words(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let data = match area {
            RegisterArea::Holding => self.ctx.read_holding_registers(offset, count).await,
            RegisterArea::Input => self.ctx.read_input_registers(offset, count).await,
            other => {
                return Err(TransportError::comm(format!("{other:?} is not a register area")));
            }
        };
        let data = data.map_err(TransportError::comm)?
                       .map_err(|e| TransportError::Exception(e.to_string()))?;
        check_len(data, count)
    }

    async fn read_bits(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<bool>, TransportError> {
        let data = match area {
            RegisterArea::Coil => self.ctx.read_coils(offset, count).await,
            RegisterArea::Discrete => self.ctx.read_discrete_inputs(offset, count).await,
            other => {
                return Err(TransportError::comm(format!("{other:?} is not a bit area")));
            }
        };
        let data = data.map_err(TransportError::comm)?
                       .map_err(|e| TransportError::Exception(e.to_string()))?;
        check_len(data, count)
    }

    async fn write_words(&mut self, offset: u16, words: &[u16]) -> Result<(), TransportError> {
        self.ctx
            .write_multiple_registers(offset, words)
            .await
            .map_err(TransportError::comm)?
            .map_err(|e| TransportError::Exception(e.to_string()))
    }

    async fn write_bits(&mut self, offset: u16, bits: &[bool]) -> Result<(), TransportError> {
        self.ctx
            .write_multiple_coils(offset, bits)
            .await
            .map_err(TransportError::comm)?
            .map_err(|e| TransportError::Exception(e.to_string()))
    }
}
