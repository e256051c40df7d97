use std::time::Duration;

use async_trait::async_trait;
use autoflow_core::{EngineError, FlowContext, Instruction, InstructionHandler};
use log::debug;

/// Una espera más larga casi siempre es un error de carga del flujo.
pub const MAX_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

/// `delay { ms }`. Termina antes si se pide `stop` sobre la corrida.
pub struct DelayHandler;

#[async_trait]
impl InstructionHandler for DelayHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        instruction.param("ms")
                   .and_then(|v| v.as_u64())
                   .is_some_and(|ms| ms <= MAX_DELAY_MS)
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let ms = instruction.u64_param("ms")?;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
            _ = ctx.stop_requested() => {
                debug!("flow '{}': delay '{}' cut short by stop", ctx.flow_id(), instruction.id);
            }
        }
        Ok(())
    }
}
