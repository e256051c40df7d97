//! autoflow-adapters: handlers de instrucciones incorporados.
//!
//! Conectan el motor (`autoflow-core`) con el store de variables y la capa
//! de dispositivos. Cada handler interpreta los parámetros JSON de su
//! instrucción; `validate` sólo mira la forma de los parámetros y
//! `execute` hace el trabajo a través del `FlowContext`.
//!
//! | tipo                | parámetros                                            |
//! |---------------------|-------------------------------------------------------|
//! | `set_variable`      | `name`, `value`                                       |
//! | `copy_variable`     | `source`, `target`                                    |
//! | `read_device`       | `device_id`, `address`, `target`, `data_type`?        |
//! | `write_device`      | `device_id`, `address`, `value` o `source`, `data_type`? |
//! | `send_command`      | `device_id`, `command`, `params`?, `target`?          |
//! | `delay`             | `ms`                                                  |
//! | `connect_device`    | `device_id`, `required`?                              |
//! | `disconnect_device` | `device_id`                                           |

pub mod convert;
pub mod handlers;

use std::sync::Arc;

use autoflow_core::InstructionRegistry;

pub use handlers::{
    ConnectDeviceHandler, CopyVariableHandler, DelayHandler, DisconnectDeviceHandler, ReadDeviceHandler,
    SendCommandHandler, SetVariableHandler, WriteDeviceHandler,
};

pub const SET_VARIABLE: &str = "set_variable";
pub const COPY_VARIABLE: &str = "copy_variable";
pub const READ_DEVICE: &str = "read_device";
pub const WRITE_DEVICE: &str = "write_device";
pub const SEND_COMMAND: &str = "send_command";
pub const DELAY: &str = "delay";
pub const CONNECT_DEVICE: &str = "connect_device";
pub const DISCONNECT_DEVICE: &str = "disconnect_device";

/// Registra todos los handlers incorporados bajo sus nombres canónicos.
pub fn register_builtin_handlers(registry: &InstructionRegistry) {
    registry.register(SET_VARIABLE, Arc::new(SetVariableHandler));
    registry.register(COPY_VARIABLE, Arc::new(CopyVariableHandler));
    registry.register(READ_DEVICE, Arc::new(ReadDeviceHandler));
    registry.register(WRITE_DEVICE, Arc::new(WriteDeviceHandler));
    registry.register(SEND_COMMAND, Arc::new(SendCommandHandler));
    registry.register(DELAY, Arc::new(DelayHandler));
    registry.register(CONNECT_DEVICE, Arc::new(ConnectDeviceHandler));
    registry.register(DISCONNECT_DEVICE, Arc::new(DisconnectDeviceHandler));
}
