//! Valor crudo de una variable de proceso y conversiones tipadas.
//!
//! `VariableValue` es el tipo suma cerrado que viaja entre el store, los
//! snapshots, el historial y los handlers de instrucciones. Las lecturas
//! tipadas (`VariableStore::get::<T>`) pasan por `FromVariableValue`, que
//! nunca trunca en silencio: un `2.5` no se convierte en entero.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum VariableValue {
    Numeric(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Array(Vec<VariableValue>),
    Struct(IndexMap<String, VariableValue>),
}

impl VariableValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableValue::Numeric(_) => "numeric",
            VariableValue::String(_) => "string",
            VariableValue::DateTime(_) => "datetime",
            VariableValue::Array(_) => "array",
            VariableValue::Struct(_) => "struct",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableValue::Numeric(v) => Some(*v),
            VariableValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Representación textual usada por las coerciones numérico/fecha → string.
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            VariableValue::Numeric(v) => Some(format!("{v}")),
            VariableValue::String(s) => Some(s.clone()),
            VariableValue::DateTime(d) => Some(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VariableValue::Numeric(v) => serde_json::Number::from_f64(*v).map(serde_json::Value::Number)
                                                                         .unwrap_or(serde_json::Value::Null),
            VariableValue::String(s) => serde_json::Value::String(s.clone()),
            VariableValue::DateTime(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            VariableValue::Array(items) => serde_json::Value::Array(items.iter().map(|i| i.to_json()).collect()),
            VariableValue::Struct(fields) => {
                serde_json::Value::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }

    /// Convierte un valor JSON (p. ej. un parámetro de instrucción) en valor
    /// de variable. `null` no tiene representación y devuelve `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(VariableValue::Numeric(if *b { 1.0 } else { 0.0 })),
            serde_json::Value::Number(n) => n.as_f64().map(VariableValue::Numeric),
            serde_json::Value::String(s) => Some(VariableValue::String(s.clone())),
            serde_json::Value::Array(items) => {
                items.iter().map(Self::from_json).collect::<Option<Vec<_>>>().map(VariableValue::Array)
            }
            serde_json::Value::Object(map) => map.iter()
                                                 .map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                                                 .collect::<Option<IndexMap<_, _>>>()
                                                 .map(VariableValue::Struct),
        }
    }
}

impl From<f64> for VariableValue {
    fn from(v: f64) -> Self {
        VariableValue::Numeric(v)
    }
}

macro_rules! numeric_into_value {
    ($($t:ty),*) => {
        $(impl From<$t> for VariableValue {
            fn from(v: $t) -> Self {
                VariableValue::Numeric(v as f64)
            }
        })*
    };
}

numeric_into_value!(f32, i16, i32, i64, u16, u32, u64);

impl From<bool> for VariableValue {
    fn from(v: bool) -> Self {
        VariableValue::Numeric(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for VariableValue {
    fn from(v: &str) -> Self {
        VariableValue::String(v.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(v: String) -> Self {
        VariableValue::String(v)
    }
}

impl From<DateTime<Utc>> for VariableValue {
    fn from(v: DateTime<Utc>) -> Self {
        VariableValue::DateTime(v)
    }
}

impl From<Vec<VariableValue>> for VariableValue {
    fn from(v: Vec<VariableValue>) -> Self {
        VariableValue::Array(v)
    }
}

impl From<IndexMap<String, VariableValue>> for VariableValue {
    fn from(v: IndexMap<String, VariableValue>) -> Self {
        VariableValue::Struct(v)
    }
}

/// Lectura tipada desde un `VariableValue`.
///
/// `None` significa que la coerción no es posible sin pérdida; el store lo
/// traduce a `VariableError::TypeMismatch`.
pub trait FromVariableValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_variable_value(value: &VariableValue) -> Option<Self>;
}

impl FromVariableValue for VariableValue {
    const TYPE_NAME: &'static str = "value";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromVariableValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        value.as_f64()
    }
}

macro_rules! integer_from_value {
    ($($t:ty),*) => {
        $(impl FromVariableValue for $t {
            const TYPE_NAME: &'static str = stringify!($t);

            fn from_variable_value(value: &VariableValue) -> Option<Self> {
                let v = value.as_f64()?;
                // MAX as f64 + 1 es exacto para los tipos pequeños y redondea a 2^63 / 2^64 en los grandes
                if v.fract() == 0.0 && v >= <$t>::MIN as f64 && v < (<$t>::MAX as f64) + 1.0 {
                    Some(v as $t)
                } else {
                    None
                }
            }
        })*
    };
}

integer_from_value!(i16, i32, i64, u16, u32, u64);

impl FromVariableValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::Numeric(v) if *v == 0.0 => Some(false),
            VariableValue::Numeric(v) if *v == 1.0 => Some(true),
            VariableValue::String(s) => s.trim().parse::<bool>().ok(),
            _ => None,
        }
    }
}

impl FromVariableValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        value.to_display_string()
    }
}

impl FromVariableValue for DateTime<Utc> {
    const TYPE_NAME: &'static str = "datetime";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::DateTime(d) => Some(*d),
            VariableValue::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok().map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl FromVariableValue for Vec<VariableValue> {
    const TYPE_NAME: &'static str = "array";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::Array(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromVariableValue for IndexMap<String, VariableValue> {
    const TYPE_NAME: &'static str = "struct";

    fn from_variable_value(value: &VariableValue) -> Option<Self> {
        match value {
            VariableValue::Struct(fields) => Some(fields.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_refuse_fractional_values() {
        assert_eq!(i32::from_variable_value(&VariableValue::Numeric(5.0)), Some(5));
        assert_eq!(i32::from_variable_value(&VariableValue::Numeric(5.5)), None);
        assert_eq!(u16::from_variable_value(&VariableValue::Numeric(-1.0)), None);
        assert_eq!(u16::from_variable_value(&VariableValue::Numeric(65536.0)), None);
        assert_eq!(i64::from_variable_value(&VariableValue::Numeric(9.3e18)), None);
    }

    #[test]
    fn numeric_string_coercions() {
        assert_eq!(String::from_variable_value(&VariableValue::Numeric(5.0)), Some("5".to_string()));
        assert_eq!(String::from_variable_value(&VariableValue::Numeric(2.5)), Some("2.5".to_string()));
        assert_eq!(f64::from_variable_value(&VariableValue::String(" 12.5 ".into())), Some(12.5));
        assert_eq!(f64::from_variable_value(&VariableValue::String("abc".into())), None);
        assert_eq!(f64::from_variable_value(&VariableValue::Array(vec![])), None);
    }

    #[test]
    fn json_conversion_keeps_structure() {
        let v = VariableValue::from_json(&json!({"a": 1, "b": ["x", true]})).expect("convertible");
        let VariableValue::Struct(fields) = &v else { panic!("expected struct") };
        assert_eq!(fields.get("a"), Some(&VariableValue::Numeric(1.0)));
        assert_eq!(fields.get("b"),
                   Some(&VariableValue::Array(vec![VariableValue::String("x".into()), VariableValue::Numeric(1.0)])));
        assert_eq!(v.to_json(), json!({"a": 1.0, "b": ["x", 1.0]}));
        assert!(VariableValue::from_json(&json!(null)).is_none());
    }
}
