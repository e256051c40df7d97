//! Registro de handlers por tipo de instrucción.
//!
//! Last-write-wins: registrar un tipo existente reemplaza el handler. Una
//! corrida resuelve el handler al llegar a cada instrucción, así un cambio
//! sólo afecta a las instrucciones resueltas después.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;

use crate::engine::FlowContext;
use crate::errors::EngineError;
use crate::model::Instruction;

#[async_trait]
pub trait InstructionHandler: Send + Sync {
    /// Chequeo puro de parámetros; sin efectos.
    fn validate(&self, instruction: &Instruction) -> bool;

    async fn execute(&self, instruction: &Instruction, ctx: &FlowContext) -> Result<(), EngineError>;
}

#[derive(Default)]
pub struct InstructionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn InstructionHandler>>>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instruction_type: &str, handler: Arc<dyn InstructionHandler>) {
        if self.handlers
               .write()
               .insert(instruction_type.to_string(), handler)
               .is_some()
        {
            debug!("handler for '{}' replaced", instruction_type);
        } else {
            debug!("handler for '{}' registered", instruction_type);
        }
    }

    pub fn unregister(&self, instruction_type: &str) -> bool {
        self.handlers.write().remove(instruction_type).is_some()
    }

    pub fn resolve(&self, instruction_type: &str) -> Option<Arc<dyn InstructionHandler>> {
        self.handlers.read().get(instruction_type).cloned()
    }

    pub fn contains(&self, instruction_type: &str) -> bool {
        self.handlers.read().contains_key(instruction_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl InstructionHandler for Fixed {
        fn validate(&self, _instruction: &Instruction) -> bool {
            self.0
        }

        async fn execute(&self, _instruction: &Instruction, _ctx: &FlowContext) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn last_registration_wins() {
        let registry = InstructionRegistry::new();
        let probe = Instruction::new("i", "noop");
        registry.register("noop", Arc::new(Fixed(false)));
        registry.register("noop", Arc::new(Fixed(true)));

        let handler = registry.resolve("noop").unwrap();
        assert!(handler.validate(&probe));
        assert_eq!(registry.registered_types(), vec!["noop".to_string()]);
    }

    #[test]
    fn resolved_handlers_outlive_unregistration() {
        let registry = InstructionRegistry::new();
        registry.register("noop", Arc::new(Fixed(true)));
        let held = registry.resolve("noop").unwrap();
        assert!(registry.unregister("noop"));
        assert!(!registry.contains("noop"));
        assert!(held.validate(&Instruction::new("i", "noop")));
        assert!(registry.resolve("noop").is_none());
    }
}
