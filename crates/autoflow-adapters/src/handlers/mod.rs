mod devices;
mod timing;
mod variables;

pub use devices::{ConnectDeviceHandler, DisconnectDeviceHandler, ReadDeviceHandler, SendCommandHandler, WriteDeviceHandler};
pub use timing::DelayHandler;
pub use variables::{CopyVariableHandler, SetVariableHandler};
