//! Variable de proceso: variante cerrada + restricciones + metadatos.
//!
//! Cada variante lleva sus propias restricciones como datos (rango numérico,
//! longitud máxima, número máximo de elementos) y la validación se resuelve
//! con `match`, sin jerarquías ni casts en tiempo de ejecución. La variante se
//! fija al crear la variable y no cambia nunca.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::VariableError;
use crate::value::VariableValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Numeric,
    String,
    DateTime,
    Array,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VariableData {
    Numeric { value: f64, min_value: f64, max_value: f64 },
    /// `max_length` en caracteres; 0 = sin límite.
    String { value: String, max_length: usize },
    DateTime { value: DateTime<Utc> },
    /// `max_items`; 0 = sin límite.
    Array { items: Vec<VariableValue>, max_items: usize },
    Struct { fields: IndexMap<String, VariableValue> },
}

impl VariableData {
    /// Instancia por defecto de la variante, sin restricciones.
    pub fn new(kind: VariableKind) -> Self {
        match kind {
            VariableKind::Numeric => VariableData::Numeric { value: 0.0,
                                                             min_value: f64::MIN,
                                                             max_value: f64::MAX },
            VariableKind::String => VariableData::String { value: String::new(),
                                                           max_length: 0 },
            VariableKind::DateTime => VariableData::DateTime { value: DateTime::<Utc>::UNIX_EPOCH },
            VariableKind::Array => VariableData::Array { items: Vec::new(),
                                                         max_items: 0 },
            VariableKind::Struct => VariableData::Struct { fields: IndexMap::new() },
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            VariableData::Numeric { .. } => VariableKind::Numeric,
            VariableData::String { .. } => VariableKind::String,
            VariableData::DateTime { .. } => VariableKind::DateTime,
            VariableData::Array { .. } => VariableKind::Array,
            VariableData::Struct { .. } => VariableKind::Struct,
        }
    }

    pub fn value(&self) -> VariableValue {
        match self {
            VariableData::Numeric { value, .. } => VariableValue::Numeric(*value),
            VariableData::String { value, .. } => VariableValue::String(value.clone()),
            VariableData::DateTime { value } => VariableValue::DateTime(*value),
            VariableData::Array { items, .. } => VariableValue::Array(items.clone()),
            VariableData::Struct { fields } => VariableValue::Struct(fields.clone()),
        }
    }

    /// Convierte `candidate` a la variante y aplica sus restricciones. No
    /// modifica nada: el store sólo asigna si esto devuelve `Ok`.
    pub fn check(&self, name: &str, candidate: VariableValue) -> Result<VariableValue, VariableError> {
        let found = candidate.type_name();
        match self {
            VariableData::Numeric { min_value, max_value, .. } => {
                let v = candidate.as_f64().ok_or_else(|| VariableError::mismatch(name, "numeric", found))?;
                if v.is_nan() {
                    return Err(VariableError::validation(name, "NaN is not a valid value"));
                }
                if v < *min_value || v > *max_value {
                    return Err(VariableError::validation(name,
                                                         format!("{v} is outside {min_value}..={max_value}")));
                }
                Ok(VariableValue::Numeric(v))
            }
            VariableData::String { max_length, .. } => {
                let s = candidate.to_display_string()
                                 .ok_or_else(|| VariableError::mismatch(name, "string", found))?;
                let len = s.chars().count();
                if *max_length > 0 && len > *max_length {
                    return Err(VariableError::validation(name,
                                                         format!("length {len} exceeds max length {max_length}")));
                }
                Ok(VariableValue::String(s))
            }
            VariableData::DateTime { .. } => match candidate {
                VariableValue::DateTime(d) => Ok(VariableValue::DateTime(d)),
                VariableValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|d| VariableValue::DateTime(d.with_timezone(&Utc)))
                    .map_err(|_| VariableError::mismatch(name, "datetime", found)),
                _ => Err(VariableError::mismatch(name, "datetime", found)),
            },
            VariableData::Array { max_items, .. } => match candidate {
                VariableValue::Array(items) => {
                    if *max_items > 0 && items.len() > *max_items {
                        return Err(VariableError::validation(name,
                                                             format!("{} items exceed max items {max_items}",
                                                                     items.len())));
                    }
                    Ok(VariableValue::Array(items))
                }
                _ => Err(VariableError::mismatch(name, "array", found)),
            },
            VariableData::Struct { .. } => match candidate {
                VariableValue::Struct(fields) => Ok(VariableValue::Struct(fields)),
                _ => Err(VariableError::mismatch(name, "struct", found)),
            },
        }
    }

    /// Asigna un valor ya validado con `check`. Un valor de otra variante se
    /// ignora (no puede ocurrir si se respetó el contrato de `check`).
    pub(crate) fn assign(&mut self, accepted: VariableValue) {
        match (self, accepted) {
            (VariableData::Numeric { value, .. }, VariableValue::Numeric(v)) => *value = v,
            (VariableData::String { value, .. }, VariableValue::String(v)) => *value = v,
            (VariableData::DateTime { value }, VariableValue::DateTime(v)) => *value = v,
            (VariableData::Array { items, .. }, VariableValue::Array(v)) => *items = v,
            (VariableData::Struct { fields }, VariableValue::Struct(v)) => *fields = v,
            _ => {}
        }
    }

    /// Comprueba que las restricciones sean coherentes y que el valor actual
    /// las cumpla (se usa al crear con definición o al importar).
    pub(crate) fn validate_self(&self, name: &str) -> Result<(), VariableError> {
        if let VariableData::Numeric { min_value, max_value, .. } = self {
            if min_value > max_value {
                return Err(VariableError::validation(name, format!("min {min_value} is greater than max {max_value}")));
            }
        }
        self.check(name, self.value()).map(|_| ())
    }
}

/// Metadatos descriptivos editables sin tocar el valor ni el historial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub description: String,
    pub unit: String,
    pub is_marked: bool,
    pub is_read_only: bool,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub index: u32,
    pub info: VariableInfo,
    /// `None` hasta la primera mutación exitosa.
    pub last_modified: Option<DateTime<Utc>>,
    pub aliases: BTreeSet<String>,
    pub group: Option<String>,
    pub data: VariableData,
}

impl Variable {
    pub fn kind(&self) -> VariableKind {
        self.data.kind()
    }

    pub fn value(&self) -> VariableValue {
        self.data.value()
    }
}

/// Entrada de historial inmutable: (timestamp, valor en ese instante).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    timestamp: DateTime<Utc>,
    value: VariableValue,
}

impl HistoryRecord {
    pub fn new(timestamp: DateTime<Utc>, value: VariableValue) -> Self {
        Self { timestamp, value }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> &VariableValue {
        &self.value
    }
}

/// Definición completa para `VariableStore::create_with`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub index: u32,
    pub data: VariableData,
    pub info: VariableInfo,
}

impl VariableDefinition {
    pub fn new(kind: VariableKind, name: impl Into<String>, index: u32) -> Self {
        Self { name: name.into(),
               index,
               data: VariableData::new(kind),
               info: VariableInfo::default() }
    }

    pub fn numeric(name: impl Into<String>, index: u32) -> Self {
        Self::new(VariableKind::Numeric, name, index)
    }

    pub fn string(name: impl Into<String>, index: u32) -> Self {
        Self::new(VariableKind::String, name, index)
    }

    /// Fija el rango de una variable numérica. Si el valor inicial queda
    /// fuera, se lleva al extremo más cercano.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        if let VariableData::Numeric { value, min_value, max_value } = &mut self.data {
            *min_value = min;
            *max_value = max;
            if min <= max {
                *value = value.clamp(min, max);
            }
        }
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        if let VariableData::String { max_length, .. } = &mut self.data {
            *max_length = max;
        }
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        if let VariableData::Array { max_items, .. } = &mut self.data {
            *max_items = max;
        }
        self
    }

    /// Valor inicial; se valida contra las restricciones al crear.
    pub fn with_initial(mut self, value: impl Into<VariableValue>) -> Self {
        self.data.assign(value.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.info.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.info.is_read_only = true;
        self
    }

    pub fn marked(mut self) -> Self {
        self.info.is_marked = true;
        self
    }
}
