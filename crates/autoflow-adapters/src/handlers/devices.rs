//! Handlers sobre la capa de dispositivos.

use async_trait::async_trait;
use autoflow_comm::{DataType, DeviceAddress, DeviceError};
use autoflow_core::{EngineError, FlowContext, Instruction, InstructionHandler};
use autoflow_domain::VariableValue;
use log::warn;
use serde_json::{json, Value};

use crate::convert::{address_param, data_type_for, device_to_variable, is_name, param_to_variable, variable_to_device};

/// Dirección parseable y tipo compatible con su área.
fn valid_target(instruction: &Instruction, write: bool) -> bool {
    let Ok(address) = address_param(instruction) else {
        return false;
    };
    let Ok(data_type) = data_type_for(instruction, &address) else {
        return false;
    };
    fits(&address, data_type) && (!write || address.area.is_writable())
}

fn fits(address: &DeviceAddress, data_type: DataType) -> bool {
    address.area.is_bit() == data_type.is_bit()
}

/// `read_device { device_id, address, target, data_type? }`
pub struct ReadDeviceHandler;

#[async_trait]
impl InstructionHandler for ReadDeviceHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        is_name(instruction.param("device_id")) && is_name(instruction.param("target")) && valid_target(instruction, false)
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let device_id = instruction.str_param("device_id")?;
        let target = instruction.str_param("target")?;
        let address = address_param(instruction)?;
        let data_type = data_type_for(instruction, &address)?;

        let value = ctx.devices()
                       .read_dynamic(device_id, &address.to_string(), data_type)
                       .await?;
        ctx.variables().set(target, device_to_variable(value))?;
        Ok(())
    }
}

/// `write_device { device_id, address, value | source, data_type? }`
pub struct WriteDeviceHandler;

#[async_trait]
impl InstructionHandler for WriteDeviceHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        let has_value = instruction.param("value").is_some_and(|v| v.is_number() || v.is_boolean());
        let has_source = is_name(instruction.param("source"));
        is_name(instruction.param("device_id")) && (has_value != has_source) && valid_target(instruction, true)
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let device_id = instruction.str_param("device_id")?;
        let address = address_param(instruction)?;
        let data_type = data_type_for(instruction, &address)?;
        let value = match instruction.opt_str_param("source")? {
            Some(source) => ctx.variables().get_value(source)?,
            None => param_to_variable(instruction, "value")?,
        };
        let device_value = variable_to_device(&value, data_type).ok_or_else(|| {
                               EngineError::invalid_parameter(&instruction.id,
                                                              "value",
                                                              format!("{} value cannot be written as {data_type:?}",
                                                                      value.type_name()))
                           })?;

        ctx.devices()
           .write_dynamic(device_id, &address.to_string(), device_value)
           .await?;
        Ok(())
    }
}

/// `send_command { device_id, command, params?, target? }`. Si hay
/// `target`, la respuesta del dispositivo se guarda en esa variable.
pub struct SendCommandHandler;

#[async_trait]
impl InstructionHandler for SendCommandHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        let params_ok = instruction.param("params").map_or(true, |p| p.is_object() || p.is_null());
        let target_ok = instruction.param("target").map_or(true, |t| is_name(Some(t)));
        is_name(instruction.param("device_id")) && is_name(instruction.param("command")) && params_ok && target_ok
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let device_id = instruction.str_param("device_id")?;
        let command = instruction.str_param("command")?;
        let params = match instruction.param("params") {
            None | Some(Value::Null) => json!({}),
            Some(p) => p.clone(),
        };

        let response = ctx.devices().send_command(device_id, command, &params).await?;
        if let Some(target) = instruction.opt_str_param("target")? {
            let value = VariableValue::from_json(&response).ok_or_else(|| {
                            EngineError::Internal(format!("response of '{command}' cannot be stored: {response}"))
                        })?;
            ctx.variables().set(target, value)?;
        }
        Ok(())
    }
}

/// `connect_device { device_id, required? }`. Con `required: false` un
/// fallo de conexión se registra y la corrida sigue.
pub struct ConnectDeviceHandler;

#[async_trait]
impl InstructionHandler for ConnectDeviceHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        is_name(instruction.param("device_id")) && instruction.param("required").map_or(true, Value::is_boolean)
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let device_id = instruction.str_param("device_id")?;
        let required = instruction.param("required").and_then(Value::as_bool).unwrap_or(true);

        if ctx.devices().connect(device_id).await? {
            return Ok(());
        }
        if required {
            return Err(DeviceError::Communication { device_id: device_id.to_string(),
                                                    message: "connection could not be established".into() }.into());
        }
        warn!("flow '{}': optional device '{}' unavailable, continuing", ctx.flow_id(), device_id);
        Ok(())
    }
}

/// `disconnect_device { device_id }`; desconectar algo desconocido no falla.
pub struct DisconnectDeviceHandler;

#[async_trait]
impl InstructionHandler for DisconnectDeviceHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        is_name(instruction.param("device_id"))
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        ctx.devices().disconnect(instruction.str_param("device_id")?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(address: &str) -> Instruction {
        Instruction::new("w", "write_device").with_param("device_id", "PLC_01")
                                             .with_param("address", address)
                                             .with_param("value", 1)
    }

    #[test]
    fn write_validation_rejects_read_only_and_mismatched_areas() {
        let h = WriteDeviceHandler;
        assert!(h.validate(&write("D100")));
        assert!(h.validate(&write("M3")));
        assert!(!h.validate(&write("IR3")));
        assert!(!h.validate(&write("X3")));
        assert!(!h.validate(&write("D100").with_param("data_type", "bool")));
        assert!(!h.validate(&write("D100").with_param("source", "Speed")));
        assert!(!h.validate(&write("??")));
    }

    #[test]
    fn read_validation_requires_a_target() {
        let h = ReadDeviceHandler;
        let base = Instruction::new("r", "read_device").with_param("device_id", "PLC_01")
                                                       .with_param("address", "IR4")
                                                       .with_param("data_type", "f32");
        assert!(!h.validate(&base));
        assert!(h.validate(&base.with_param("target", "Temp")));
    }
}
