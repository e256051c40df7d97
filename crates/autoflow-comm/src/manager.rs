//! `DeviceManager`: registro de conexiones y operaciones de I/O uniformes
//! sobre cualquier transporte.
//!
//! Dos niveles de bloqueo:
//! - `registry` (parking_lot) sólo para buscar/insertar/quitar entradas;
//!   nunca se mantiene a través de un `.await`.
//! - cada conexión tiene su propio `tokio::sync::Mutex`, así la latencia de
//!   un dispositivo no bloquea `connect`/`disconnect` de otro.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::time::{error::Elapsed, timeout};

use crate::address::{DeviceAddress, RegisterArea};
use crate::error::{DeviceError, TransportError};
use crate::profile::{DeviceConfig, DeviceProfile};
use crate::transport::{Connector, Transport};
use crate::value::{DataType, DeviceScalar, DeviceValue, RawData};

/// Límites de una sola petición Modbus.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;
pub const MAX_BITS_PER_REQUEST: u16 = 2000;

struct Connection {
    transport: tokio::sync::Mutex<Box<dyn Transport>>,
    connected: AtomicBool,
    endpoint: String,
}

pub struct DeviceManager {
    config: DeviceConfig,
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
    registry: Mutex<HashMap<String, Arc<Connection>>>,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

impl DeviceManager {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config,
               connectors: RwLock::new(HashMap::new()),
               registry: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    /// Declara cómo se llega a `device_id`. Reemplaza un perfil previo; una
    /// conexión ya abierta no se toca hasta el próximo `connect`.
    pub fn register_device(&self, device_id: &str, profile: &DeviceProfile) -> Result<(), DeviceError> {
        let connector = profile.connector()?;
        self.register_connector(device_id, connector);
        Ok(())
    }

    pub fn register_connector(&self, device_id: &str, connector: Arc<dyn Connector>) {
        debug!("registering device '{}' at {}", device_id, connector.describe());
        if self.connectors
               .write()
               .insert(device_id.to_string(), connector)
               .is_some()
        {
            debug!("device '{}' profile replaced", device_id);
        }
    }

    pub fn is_registered(&self, device_id: &str) -> bool {
        self.connectors.read().contains_key(device_id)
    }

    /// Idempotente: si ya está conectado devuelve `Ok(true)` sin abrir nada.
    /// Un fallo al abrir (o timeout) se registra y devuelve `Ok(false)`.
    pub async fn connect(&self, device_id: &str) -> Result<bool, DeviceError> {
        if self.is_connected(device_id) {
            return Ok(true);
        }
        let connector = self.connectors
                            .read()
                            .get(device_id)
                            .cloned()
                            .ok_or_else(|| DeviceError::DeviceNotFound(device_id.to_string()))?;

        let transport = match timeout(self.config.connect_timeout, connector.open()).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                warn!("connect '{}' ({}) failed: {}", device_id, connector.describe(), e);
                return Ok(false);
            }
            Err(_) => {
                warn!("connect '{}' ({}) timed out after {:?}",
                      device_id,
                      connector.describe(),
                      self.config.connect_timeout);
                return Ok(false);
            }
        };

        let mut registry = self.registry.lock();
        // otra llamada concurrente pudo haber conectado mientras abríamos
        if let Some(existing) = registry.get(device_id) {
            if existing.connected.load(Ordering::SeqCst) {
                return Ok(true);
            }
        }
        registry.insert(device_id.to_string(),
                        Arc::new(Connection { transport: tokio::sync::Mutex::new(transport),
                                              connected: AtomicBool::new(true),
                                              endpoint: connector.describe() }));
        debug!("device '{}' connected", device_id);
        Ok(true)
    }

    pub fn disconnect(&self, device_id: &str) {
        if self.registry.lock().remove(device_id).is_some() {
            debug!("device '{}' disconnected", device_id);
        }
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.registry
            .lock()
            .get(device_id)
            .map(|c| c.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn connected_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry
                                       .lock()
                                       .iter()
                                       .filter(|(_, c)| c.connected.load(Ordering::SeqCst))
                                       .map(|(id, _)| id.clone())
                                       .collect();
        ids.sort();
        ids
    }

    pub async fn read_value<T: DeviceScalar>(&self, device_id: &str, address: &str) -> Result<T, DeviceError> {
        let value = self.read_dynamic(device_id, address, T::DATA_TYPE).await?;
        T::from_device_value(value).ok_or_else(|| DeviceError::Communication { device_id: device_id.to_string(),
                                                                               message: format!("unexpected value {value:?}") })
    }

    pub async fn write_value<T: DeviceScalar>(&self, device_id: &str, address: &str, value: T) -> Result<(), DeviceError> {
        self.write_dynamic(device_id, address, value.into_device_value()).await
    }

    /// Lectura con el tipo decidido en tiempo de ejecución.
    pub async fn read_dynamic(&self,
                              device_id: &str,
                              address: &str,
                              data_type: DataType)
                              -> Result<DeviceValue, DeviceError> {
        self.connection(device_id)?;
        let addr: DeviceAddress = address.parse()?;
        check_area(&addr, data_type, false)?;
        let raw = self.read_raw(device_id, addr, data_type.width()).await?;
        DeviceValue::decode(data_type, &raw).ok_or_else(|| DeviceError::Communication { device_id: device_id.to_string(),
                                                                                        message: format!("cannot decode {data_type:?} at {addr}") })
    }

    pub async fn write_dynamic(&self, device_id: &str, address: &str, value: DeviceValue) -> Result<(), DeviceError> {
        self.connection(device_id)?;
        let addr: DeviceAddress = address.parse()?;
        check_area(&addr, value.data_type(), true)?;
        self.write_raw(device_id, addr, value.encode()).await
    }

    /// Comandos genéricos, iguales para todos los transportes de registros:
    /// `read_registers`, `write_registers`, `read_bits`, `write_bits`, `ping`.
    /// El dispositivo se resuelve antes de mirar comando y parámetros.
    pub async fn send_command(&self, device_id: &str, command: &str, params: &Value) -> Result<Value, DeviceError> {
        let conn = self.connection(device_id)?;
        match command {
            "ping" => Ok(json!({ "device_id": device_id, "endpoint": conn.endpoint })),
            "read_registers" | "read_bits" => {
                let bits = command == "read_bits";
                let addr = address_param(command, params)?;
                if addr.area.is_bit() != bits {
                    return Err(DeviceError::invalid_address(addr.to_string(), format!("not valid for {command}")));
                }
                let max = if bits { MAX_BITS_PER_REQUEST } else { MAX_REGISTERS_PER_REQUEST };
                let count = match params.get("count") {
                    None => 1,
                    Some(v) => v.as_u64()
                                .filter(|n| (1..=max as u64).contains(n))
                                .ok_or_else(|| invalid_command(command, format!("'count' must be within 1..={max}")))?
                                as u16,
                };
                check_span(&addr, count)?;
                match self.read_raw(device_id, addr, count).await? {
                    RawData::Words(words) => Ok(json!(words)),
                    RawData::Bits(bits) => Ok(json!(bits)),
                }
            }
            "write_registers" => {
                let addr = address_param(command, params)?;
                if addr.area != RegisterArea::Holding {
                    return Err(DeviceError::invalid_address(addr.to_string(), "registers are only writable in HR"));
                }
                let words = list_param(command, params, MAX_REGISTERS_PER_REQUEST, |v| {
                                v.as_u64().filter(|n| *n <= u16::MAX as u64).map(|n| n as u16)
                            })?;
                check_span(&addr, words.len() as u16)?;
                let written = words.len();
                self.write_raw(device_id, addr, RawData::Words(words)).await?;
                Ok(json!({ "written": written }))
            }
            "write_bits" => {
                let addr = address_param(command, params)?;
                if addr.area != RegisterArea::Coil {
                    return Err(DeviceError::invalid_address(addr.to_string(), "bits are only writable in coils"));
                }
                let bits = list_param(command, params, MAX_BITS_PER_REQUEST, |v| {
                               v.as_bool().or_else(|| v.as_u64().filter(|n| *n <= 1).map(|n| n == 1))
                           })?;
                check_span(&addr, bits.len() as u16)?;
                let written = bits.len();
                self.write_raw(device_id, addr, RawData::Bits(bits)).await?;
                Ok(json!({ "written": written }))
            }
            other => Err(DeviceError::UnsupportedCommand(other.to_string())),
        }
    }

    fn connection(&self, device_id: &str) -> Result<Arc<Connection>, DeviceError> {
        self.registry
            .lock()
            .get(device_id)
            .filter(|c| c.connected.load(Ordering::SeqCst))
            .cloned()
            .ok_or_else(|| DeviceError::DeviceNotFound(device_id.to_string()))
    }

    async fn read_raw(&self, device_id: &str, addr: DeviceAddress, count: u16) -> Result<RawData, DeviceError> {
        let conn = self.connection(device_id)?;
        let mut transport = conn.transport.lock().await;
        if addr.area.is_bit() {
            let result = timeout(self.config.io_timeout, transport.read_bits(addr.area, addr.offset, count)).await;
            self.settle(device_id, &conn, result).map(RawData::Bits)
        } else {
            let result = timeout(self.config.io_timeout, transport.read_words(addr.area, addr.offset, count)).await;
            self.settle(device_id, &conn, result).map(RawData::Words)
        }
    }

    async fn write_raw(&self, device_id: &str, addr: DeviceAddress, raw: RawData) -> Result<(), DeviceError> {
        let conn = self.connection(device_id)?;
        let mut transport = conn.transport.lock().await;
        let result = match &raw {
            RawData::Words(words) => timeout(self.config.io_timeout, transport.write_words(addr.offset, words)).await,
            RawData::Bits(bits) => timeout(self.config.io_timeout, transport.write_bits(addr.offset, bits)).await,
        };
        self.settle(device_id, &conn, result)
    }

    /// Traduce el resultado del transporte; cualquier fallo marca el
    /// dispositivo como desconectado.
    fn settle<T>(&self,
                 device_id: &str,
                 conn: &Connection,
                 result: Result<Result<T, TransportError>, Elapsed>)
                 -> Result<T, DeviceError> {
        let err = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => TransportError::Timeout,
        };
        conn.connected.store(false, Ordering::SeqCst);
        warn!("device '{}' ({}) marked disconnected: {}", device_id, conn.endpoint, err);
        Err(DeviceError::Communication { device_id: device_id.to_string(),
                                         message: err.to_string() })
    }
}

fn check_area(addr: &DeviceAddress, data_type: DataType, write: bool) -> Result<(), DeviceError> {
    if addr.area.is_bit() != data_type.is_bit() {
        return Err(DeviceError::invalid_address(addr.to_string(),
                                                format!("{data_type:?} does not fit area {:?}", addr.area)));
    }
    if write && !addr.area.is_writable() {
        return Err(DeviceError::invalid_address(addr.to_string(), format!("area {:?} is read-only", addr.area)));
    }
    check_span(addr, data_type.width())
}

fn check_span(addr: &DeviceAddress, count: u16) -> Result<(), DeviceError> {
    if addr.offset as u32 + count as u32 > u16::MAX as u32 + 1 {
        return Err(DeviceError::invalid_address(addr.to_string(), format!("{count} items overflow the address space")));
    }
    Ok(())
}

fn invalid_command(command: &str, reason: impl Into<String>) -> DeviceError {
    DeviceError::InvalidCommand { command: command.to_string(),
                                  reason: reason.into() }
}

fn address_param(command: &str, params: &Value) -> Result<DeviceAddress, DeviceError> {
    params.get("address")
          .and_then(Value::as_str)
          .ok_or_else(|| invalid_command(command, "missing string parameter 'address'"))?
          .parse()
}

fn list_param<T>(command: &str,
                 params: &Value,
                 max: u16,
                 item: impl Fn(&Value) -> Option<T>)
                 -> Result<Vec<T>, DeviceError> {
    let values = params.get("values")
                       .and_then(Value::as_array)
                       .ok_or_else(|| invalid_command(command, "missing array parameter 'values'"))?;
    if values.is_empty() || values.len() > max as usize {
        return Err(invalid_command(command, format!("'values' must hold 1..={max} items")));
    }
    values.iter()
          .map(|v| item(v).ok_or_else(|| invalid_command(command, format!("invalid item {v}"))))
          .collect()
}
