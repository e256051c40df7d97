use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EngineError;

fn enabled_by_default() -> bool {
    true
}

/// Unidad de trabajo de un flujo. El `instruction_type` selecciona el
/// handler; los parámetros son libres y los interpreta el handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub instruction_type: String,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
    /// Reservado: se conserva pero el motor no lo usa.
    #[serde(default)]
    pub is_breakpoint: bool,
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
}

impl Instruction {
    pub fn new(id: impl Into<String>, instruction_type: impl Into<String>) -> Self {
        Self { id: id.into(),
               instruction_type: instruction_type.into(),
               is_enabled: true,
               is_breakpoint: false,
               parameters: IndexMap::new() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    pub fn breakpoint(mut self) -> Self {
        self.is_breakpoint = true;
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, EngineError> {
        self.param(name)
            .ok_or_else(|| EngineError::invalid_parameter(&self.id, name, "is missing"))
    }

    pub fn str_param(&self, name: &str) -> Result<&str, EngineError> {
        self.require(name)?
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| EngineError::invalid_parameter(&self.id, name, "must be a non-empty string"))
    }

    pub fn u64_param(&self, name: &str) -> Result<u64, EngineError> {
        self.require(name)?
            .as_u64()
            .ok_or_else(|| EngineError::invalid_parameter(&self.id, name, "must be a non-negative integer"))
    }

    /// Parámetro opcional de texto; `Ok(None)` si no está.
    pub fn opt_str_param(&self, name: &str) -> Result<Option<&str>, EngineError> {
        match self.param(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str_param(name).map(Some),
        }
    }
}
