//! Snapshots: captura inmutable nombre → valor en un instante dado.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VariableError;
use crate::value::VariableValue;

/// Una vez creado no expone API de mutación; se clona o se serializa tal cual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    values: IndexMap<String, VariableValue>,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, values: IndexMap<String, VariableValue>) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               created_at: Utc::now(),
               values }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn values(&self) -> &IndexMap<String, VariableValue> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resultado de un restore best-effort: lo aplicado no se revierte.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub applied: Vec<String>,
    /// Nombres del snapshot que ya no existen en el store.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, VariableError)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}
