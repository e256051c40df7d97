//! Handlers sobre el store de variables.

use async_trait::async_trait;
use autoflow_core::{EngineError, FlowContext, Instruction, InstructionHandler};
use serde_json::Value;

use crate::convert::{is_name, param_to_variable};

/// `set_variable { name, value }`
pub struct SetVariableHandler;

#[async_trait]
impl InstructionHandler for SetVariableHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        is_name(instruction.param("name")) && instruction.param("value").is_some_and(|v| !v.is_null())
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let name = instruction.str_param("name")?;
        let value = param_to_variable(instruction, "value")?;
        ctx.variables().set(name, value)?;
        Ok(())
    }
}

/// `copy_variable { source, target }`: el valor pasa por la coerción del
/// destino, igual que un `set`.
pub struct CopyVariableHandler;

#[async_trait]
impl InstructionHandler for CopyVariableHandler {
    fn validate(&self, instruction: &Instruction) -> bool {
        is_name(instruction.param("source")) && is_name(instruction.param("target"))
        && instruction.param("source") != instruction.param("target")
    }

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError> {
        let source = instruction.str_param("source")?;
        let target = instruction.str_param("target")?;
        let value = ctx.variables().get_value(source)?;
        ctx.variables().set(target, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_checks_parameter_shape() {
        let h = SetVariableHandler;
        assert!(h.validate(&Instruction::new("i", "set_variable").with_param("name", "Speed").with_param("value", 5)));
        assert!(!h.validate(&Instruction::new("i", "set_variable").with_param("name", "Speed")));
        assert!(!h.validate(&Instruction::new("i", "set_variable").with_param("name", "")
                                                                    .with_param("value", 5)));
        assert!(!h.validate(&Instruction::new("i", "set_variable").with_param("name", "Speed")
                                                                    .with_param("value", Value::Null)));

        let c = CopyVariableHandler;
        assert!(!c.validate(&Instruction::new("i", "copy_variable").with_param("source", "A")
                                                                     .with_param("target", "A")));
        assert!(c.validate(&Instruction::new("i", "copy_variable").with_param("source", "A")
                                                                    .with_param("target", json!("B"))));
    }
}
