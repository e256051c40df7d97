//! Definición inmutable de un flujo.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Instruction;
use crate::constants::ENGINE_VERSION;
use crate::hashing::hash_value;

/// Secuencia lineal de instrucciones. El `definition_hash` se deriva del
/// contenido y nunca se toma del JSON de entrada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredDefinition")]
pub struct FlowDefinition {
    flow_id: String,
    name: String,
    instructions: Vec<Instruction>,
    definition_hash: String,
}

#[derive(Deserialize)]
struct StoredDefinition {
    flow_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    instructions: Vec<Instruction>,
}

impl From<StoredDefinition> for FlowDefinition {
    fn from(s: StoredDefinition) -> Self {
        FlowDefinition::new(s.flow_id, s.name, s.instructions)
    }
}

impl FlowDefinition {
    pub fn new(flow_id: impl Into<String>, name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        let definition_hash = compute_hash(&instructions);
        Self { flow_id: flow_id.into(),
               name: name.into(),
               instructions,
               definition_hash }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

// El nombre del flujo no entra: renombrar no cambia lo que se ejecuta.
fn compute_hash(instructions: &[Instruction]) -> String {
    hash_value(&json!({
        "engine_version": ENGINE_VERSION,
        "instructions": instructions,
    }))
}
