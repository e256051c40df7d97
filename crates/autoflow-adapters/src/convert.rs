//! Conversiones entre parámetros JSON, valores de variable y valores de
//! dispositivo.

use autoflow_comm::{DataType, DeviceAddress, DeviceValue};
use autoflow_core::{EngineError, Instruction};
use autoflow_domain::VariableValue;
use serde_json::Value;

/// Valor de variable a partir de un parámetro; `null` no es un valor.
pub fn param_to_variable(instruction: &Instruction, name: &str) -> Result<VariableValue, EngineError> {
    let raw = instruction.require(name)?;
    VariableValue::from_json(raw).ok_or_else(|| EngineError::invalid_parameter(&instruction.id, name, "must not contain null"))
}

pub fn device_to_variable(value: DeviceValue) -> VariableValue {
    VariableValue::Numeric(value.as_f64())
}

/// Tipo de dato explícito (`data_type`) o el implícito por el área:
/// `bool` para bits, `u16` para registros.
pub fn data_type_for(instruction: &Instruction, address: &DeviceAddress) -> Result<DataType, EngineError> {
    match instruction.opt_str_param("data_type")? {
        Some(name) => name.parse().map_err(|e: autoflow_comm::DeviceError| {
                                       EngineError::invalid_parameter(&instruction.id, "data_type", e.to_string())
                                   }),
        None if address.area.is_bit() => Ok(DataType::Bool),
        None => Ok(DataType::U16),
    }
}

pub fn address_param(instruction: &Instruction) -> Result<DeviceAddress, EngineError> {
    let raw = instruction.str_param("address")?;
    raw.parse()
       .map_err(|e: autoflow_comm::DeviceError| EngineError::invalid_parameter(&instruction.id, "address", e.to_string()))
}

/// Valor de variable a dispositivo sin pérdida; `None` si no es
/// representable en `data_type`.
pub fn variable_to_device(value: &VariableValue, data_type: DataType) -> Option<DeviceValue> {
    value.as_f64().and_then(|v| DeviceValue::from_f64(data_type, v))
}

/// Chequeo de forma para `validate`: string no vacío.
pub fn is_name(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str).is_some_and(|s| !s.trim().is_empty())
}
