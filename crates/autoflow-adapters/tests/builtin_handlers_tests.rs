use std::sync::Arc;
use std::time::{Duration, Instant};

use autoflow_adapters::register_builtin_handlers;
use autoflow_comm::{DeviceConfig, DeviceError, DeviceManager, RegisterArea, SimulatedDevice};
use autoflow_core::{EngineError, FlowDefinition, FlowEngine, FlowStatus, Instruction, InstructionRegistry};
use autoflow_domain::{VariableDefinition, VariableKind, VariableStore, VariableValue};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

struct Plant {
    engine: FlowEngine,
    store: Arc<VariableStore>,
    devices: Arc<DeviceManager>,
    plc: SimulatedDevice,
}

fn plant() -> Plant {
    let store = Arc::new(VariableStore::default());
    let devices = Arc::new(DeviceManager::new(DeviceConfig::with_timeout(Duration::from_millis(500))));
    let registry = Arc::new(InstructionRegistry::new());
    register_builtin_handlers(&registry);
    let engine = FlowEngine::builder(store.clone(), devices.clone()).registry(registry)
                                                                     .build();
    let plc = SimulatedDevice::new();
    devices.register_connector("PLC_SIM", Arc::new(plc.connector()));
    Plant { engine,
            store,
            devices,
            plc }
}

impl Plant {
    async fn run(&self, flow_id: &str, instructions: Vec<Instruction>) -> Result<FlowStatus, EngineError> {
        self.engine
            .add_flow(FlowDefinition::new(flow_id, flow_id, instructions))
            .unwrap();
        self.engine.start_flow(flow_id).unwrap().wait().await
    }
}

fn set(id: &str, name: &str, value: serde_json::Value) -> Instruction {
    Instruction::new(id, "set_variable").with_param("name", name)
                                        .with_param("value", value)
}

fn connect(id: &str) -> Instruction {
    Instruction::new(id, "connect_device").with_param("device_id", "PLC_SIM")
}

#[tokio::test]
async fn write_to_unregistered_device_fails_after_setting_the_variable() {
    let p = plant();
    p.store.create(VariableKind::Numeric, "Speed", 1).unwrap();

    let steps = vec![set("i1", "Speed", json!(5)),
                     Instruction::new("i2", "write_device").with_param("device_id", "PLC_01")
                                                           .with_param("address", "D100")
                                                           .with_param("value", 5)];
    let err = assert_err!(p.run("f", steps).await);

    assert!(matches!(&err, EngineError::FlowExecution { instruction_id, .. } if instruction_id == "i2"));
    assert_eq!(err.root_cause(), &EngineError::Device(DeviceError::DeviceNotFound("PLC_01".into())));
    assert_eq!(p.engine.get_flow_status("f").unwrap(), FlowStatus::Error);
    assert_eq!(p.store.get::<f64>("Speed").unwrap(), 5.0);
    assert_eq!(p.store.export_history("Speed").unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_range_set_fails_the_run_without_touching_history() {
    let p = plant();
    p.store
     .create_with(VariableDefinition::numeric("Level", 1).with_range(0.0, 100.0))
     .unwrap();

    let err = p.run("f", vec![set("i1", "Level", json!(150))]).await.unwrap_err();
    assert!(matches!(err.root_cause(), EngineError::Variable(_)));
    assert!(p.store.variable("Level").unwrap().last_modified.is_none());
    assert!(p.store.export_history("Level").unwrap().is_empty());
}

#[tokio::test]
async fn device_round_trip_through_variables() {
    let p = plant();
    p.store.create(VariableKind::Numeric, "Setpoint", 1).unwrap();
    p.store.create(VariableKind::Numeric, "Feedback", 2).unwrap();
    p.store.create(VariableKind::Numeric, "Running", 3).unwrap();
    p.plc.set_bit(RegisterArea::Discrete, 0, true);

    let steps = vec![connect("c"),
                     set("s", "Setpoint", json!(-12.5)),
                     Instruction::new("w", "write_device").with_param("device_id", "PLC_SIM")
                                                          .with_param("address", "D10")
                                                          .with_param("data_type", "f32")
                                                          .with_param("source", "Setpoint"),
                     Instruction::new("r", "read_device").with_param("device_id", "PLC_SIM")
                                                         .with_param("address", "D10")
                                                         .with_param("data_type", "f32")
                                                         .with_param("target", "Feedback"),
                     Instruction::new("b", "read_device").with_param("device_id", "PLC_SIM")
                                                         .with_param("address", "X0")
                                                         .with_param("target", "Running")];
    let status = assert_ok!(p.run("f", steps).await);

    assert_eq!(status, FlowStatus::Stopped);
    assert_eq!(p.store.get::<f64>("Feedback").unwrap(), -12.5);
    assert!(p.store.get::<bool>("Running").unwrap());
    assert_eq!(p.plc.word(RegisterArea::Holding, 10), 0xC148);
}

#[tokio::test]
async fn lossy_device_write_is_an_invalid_parameter() {
    let p = plant();
    let err = p.run("f",
                    vec![connect("c"),
                         Instruction::new("w", "write_device").with_param("device_id", "PLC_SIM")
                                                              .with_param("address", "D1")
                                                              .with_param("value", 2.5)])
               .await
               .unwrap_err();
    assert!(matches!(err.root_cause(), EngineError::InvalidParameter { .. }));
    assert!(p.devices.is_connected("PLC_SIM"));
}

#[tokio::test]
async fn send_command_result_lands_in_target() {
    let p = plant();
    p.store.create(VariableKind::Array, "Block", 1).unwrap();
    p.plc.set_word(RegisterArea::Input, 4, 11);
    p.plc.set_word(RegisterArea::Input, 5, 12);

    p.run("f",
          vec![connect("c"),
               Instruction::new("cmd", "send_command").with_param("device_id", "PLC_SIM")
                                                      .with_param("command", "read_registers")
                                                      .with_param("params", json!({"address": "IR4", "count": 2}))
                                                      .with_param("target", "Block")])
     .await
     .unwrap();

    assert_eq!(p.store.get_value("Block").unwrap(),
               VariableValue::Array(vec![VariableValue::Numeric(11.0), VariableValue::Numeric(12.0)]));
}

#[tokio::test]
async fn unsupported_command_fails_the_run() {
    let p = plant();
    let err = p.run("f",
                    vec![connect("c"),
                         Instruction::new("cmd", "send_command").with_param("device_id", "PLC_SIM")
                                                                .with_param("command", "format_disk")])
               .await
               .unwrap_err();
    assert_eq!(err.root_cause(),
               &EngineError::Device(DeviceError::UnsupportedCommand("format_disk".into())));
}

#[tokio::test]
async fn copy_variable_coerces_into_the_target() {
    let p = plant();
    p.store.create(VariableKind::Numeric, "Count", 1).unwrap();
    p.store.create(VariableKind::String, "Label", 2).unwrap();

    p.run("f",
          vec![set("s", "Count", json!(42)),
               Instruction::new("c", "copy_variable").with_param("source", "Count")
                                                     .with_param("target", "Label")])
     .await
     .unwrap();
    assert_eq!(p.store.get::<String>("Label").unwrap(), "42");
}

#[tokio::test]
async fn optional_connect_tolerates_an_unreachable_device() {
    let p = plant();
    p.plc.refuse_connections(true);

    let status = p.run("opt", vec![connect("c").with_param("required", false)]).await;
    assert_eq!(status, Ok(FlowStatus::Stopped));

    let err = assert_err!(p.run("req", vec![connect("c")]).await);
    assert!(matches!(err.root_cause(), EngineError::Device(DeviceError::Communication { .. })));
}

#[tokio::test]
async fn disconnect_device_drops_the_connection() {
    let p = plant();
    p.run("f",
          vec![connect("c"),
               Instruction::new("d", "disconnect_device").with_param("device_id", "PLC_SIM")])
     .await
     .unwrap();
    assert!(!p.devices.is_connected("PLC_SIM"));
}

#[tokio::test]
async fn stop_cuts_a_long_delay_short() {
    let p = plant();
    p.store.create(VariableKind::Numeric, "After", 1).unwrap();
    p.engine
     .add_flow(FlowDefinition::new("f",
                                   "f",
                                   vec![Instruction::new("wait", "delay").with_param("ms", 60_000),
                                        set("s", "After", json!(1))]))
     .unwrap();

    let started = Instant::now();
    let handle = p.engine.start_flow("f").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(p.engine.stop_flow("f"));

    assert_eq!(handle.wait().await, Ok(FlowStatus::Stopped));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(p.store.get::<f64>("After").unwrap(), 0.0);
}

#[tokio::test]
async fn invalid_parameters_are_rejected_before_execution() {
    let p = plant();
    p.store.create(VariableKind::Numeric, "Speed", 1).unwrap();
    let err = p.run("f", vec![Instruction::new("d", "delay").with_param("ms", "soon")])
               .await
               .unwrap_err();
    assert!(matches!(err.root_cause(), EngineError::ValidationRejected { .. }));
}
