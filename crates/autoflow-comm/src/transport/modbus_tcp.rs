//! Transporte de red: Modbus TCP.

use async_trait::async_trait;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

use super::{Connector, ModbusTransport, Transport};
use crate::error::TransportError;

#[derive(Clone, Debug)]
pub struct ModbusTcpConnector {
    host: String,
    port: u16,
    unit_id: u8,
}

impl ModbusTcpConnector {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self { host: host.into(),
               port,
               unit_id }
    }
}

#[async_trait]
impl Connector for ModbusTcpConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        // admite nombres de host, no sólo IPs literales
        let socket_addr = tokio::net::lookup_host((self.host.as_str(), self.port)).await
                                                                                 .map_err(TransportError::comm)?
                                                                                 .next()
                                                                                 .ok_or_else(|| {
                                                                                     TransportError::comm(format!("cannot resolve {}", self.host))
                                                                                 })?;
        let ctx = tcp::connect_slave(socket_addr, Slave(self.unit_id)).await
                                                                       .map_err(TransportError::comm)?;
        Ok(Box::new(ModbusTransport::new(ctx)))
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}?unitId={}", self.host, self.port, self.unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::RegisterArea;
    use std::env;

    #[test]
    fn describe_includes_unit_id() {
        let c = ModbusTcpConnector::new("10.0.0.5", 502, 3);
        assert_eq!(c.describe(), "tcp://10.0.0.5:502?unitId=3");
    }

    #[tokio::test]
    async fn it_can_read_holding_registers_when_enabled() {
        if env::var("AUTOFLOW_IT_ENABLE").ok().as_deref() != Some("1") {
            return;
        }
        let host = match env::var("AUTOFLOW_IT_TCP_HOST") {
            Ok(v) => v,
            Err(_) => return,
        };
        let port: u16 = match env::var("AUTOFLOW_IT_TCP_PORT").ok().and_then(|v| v.parse().ok()) {
            Some(v) => v,
            None => return,
        };

        let connector = ModbusTcpConnector::new(host, port, 1);
        let mut transport = connector.open().await.expect("open tcp");
        let words = transport.read_words(RegisterArea::Holding, 0, 2).await.expect("read");
        assert_eq!(words.len(), 2);
    }
}
