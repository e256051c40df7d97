//! Demo de AutoFlow contra un PLC simulado en memoria.
//!
//! `RUST_LOG=debug cargo run --bin autoflow-demo` muestra el rastro del motor.
use std::error::Error;
use std::sync::Arc;

use autoflow::{AppConfig, Runtime};
use autoflow_comm::{RegisterArea, SimulatedDevice};
use autoflow_core::{FlowDefinition, Instruction};
use autoflow_domain::{VariableDefinition, VariableKind};
use autoflow_persistence::InMemoryPersistence;
use serde_json::json;

const PLC: &str = "PLC_SIM";

fn demo_flow() -> FlowDefinition {
    let instructions = vec![Instruction::new("connect", "connect_device").with_param("device_id", PLC),
                            Instruction::new("setpoint", "set_variable").with_param("name", "Setpoint")
                                                                        .with_param("value", 42.5),
                            Instruction::new("push", "write_device").with_param("device_id", PLC)
                                                                    .with_param("address", "D100")
                                                                    .with_param("data_type", "f32")
                                                                    .with_param("source", "Setpoint"),
                            Instruction::new("settle", "delay").with_param("ms", 50),
                            Instruction::new("level", "read_device").with_param("device_id", PLC)
                                                                    .with_param("address", "IR0")
                                                                    .with_param("target", "Level"),
                            Instruction::new("pump", "read_device").with_param("device_id", PLC)
                                                                   .with_param("address", "X3")
                                                                   .with_param("target", "PumpRunning"),
                            Instruction::new("debug", "set_variable").with_param("name", "Setpoint")
                                                                     .with_param("value", 0)
                                                                     .disabled(),
                            Instruction::new("bye", "disconnect_device").with_param("device_id", PLC)];
    FlowDefinition::new("demo", "Lazo de demostración", instructions)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    autoflow::config::init_dotenv();

    let config = AppConfig::from_env()?;
    let runtime = Runtime::new(&config);

    // PLC simulado con algunos valores de proceso
    let plc = SimulatedDevice::new();
    plc.set_word(RegisterArea::Input, 0, 730);
    plc.set_bit(RegisterArea::Discrete, 3, true);
    runtime.devices().register_connector(PLC, Arc::new(plc.connector()));

    let vars = runtime.variables();
    vars.create_with(VariableDefinition::numeric("Setpoint", 1).with_range(0.0, 100.0)
                                                               .with_unit("%"))?;
    vars.create(VariableKind::Numeric, "Level", 2)?;
    vars.create(VariableKind::Numeric, "PumpRunning", 3)?;

    let engine = runtime.engine();
    engine.add_flow(demo_flow())?;
    let definition = engine.definition("demo")?;
    println!("flujo '{}' ({} instrucciones) hash={}",
             definition.name(),
             definition.len(),
             definition.definition_hash());

    let status = engine.start_flow("demo")?.wait().await?;
    println!("estado final: {status}");

    let trail: Vec<&str> = engine.events_for("demo").iter().map(|e| e.kind.code()).collect();
    println!("eventos: {}", trail.concat());

    for name in vars.names() {
        println!("  {name} = {}", vars.get_value(&name)?.to_json());
    }
    println!("HR100..HR101 = {:#06x} {:#06x}",
             plc.word(RegisterArea::Holding, 100),
             plc.word(RegisterArea::Holding, 101));
    println!("historial Setpoint: {}",
             serde_json::to_string(&vars.export_history("Setpoint")?)?);

    let persistence = InMemoryPersistence::new();
    let report = runtime.checkpoint(&persistence)?;
    println!("checkpoint: {} variables, {} registros de historial",
             report.variables, report.history_records);

    println!("{}", json!({ "connected": runtime.devices().connected_devices() }));
    Ok(())
}
