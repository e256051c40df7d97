//! Codec entre datos crudos (bits / registros de 16 bits) y valores tipados.
//!
//! Convención: `bool` sólo desde áreas de bits; los tipos de 32 y 64 bits
//! ocupan 2 y 4 registros con la palabra alta primero (big-endian).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq)]
pub enum RawData {
    Bits(Vec<bool>),
    Words(Vec<u16>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl DataType {
    /// Cantidad de bits (para `Bool`) o de registros a leer.
    pub fn width(self) -> u16 {
        match self {
            DataType::Bool | DataType::U16 | DataType::I16 => 1,
            DataType::U32 | DataType::I32 | DataType::F32 => 2,
            DataType::F64 => 4,
        }
    }

    pub fn is_bit(self) -> bool {
        matches!(self, DataType::Bool)
    }
}

impl FromStr for DataType {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "bit" => Ok(DataType::Bool),
            "u16" | "uint16" | "word" => Ok(DataType::U16),
            "i16" | "int16" | "int" => Ok(DataType::I16),
            "u32" | "uint32" | "dword" => Ok(DataType::U32),
            "i32" | "int32" | "dint" => Ok(DataType::I32),
            "f32" | "float32" | "real" => Ok(DataType::F32),
            "f64" | "float64" | "lreal" => Ok(DataType::F64),
            other => Err(DeviceError::Config(format!("unknown data type '{other}'"))),
        }
    }
}

/// Valor dinámico de dispositivo, usado por los handlers de instrucciones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl DeviceValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DeviceValue::Bool(_) => DataType::Bool,
            DeviceValue::U16(_) => DataType::U16,
            DeviceValue::I16(_) => DataType::I16,
            DeviceValue::U32(_) => DataType::U32,
            DeviceValue::I32(_) => DataType::I32,
            DeviceValue::F32(_) => DataType::F32,
            DeviceValue::F64(_) => DataType::F64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            DeviceValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            DeviceValue::U16(v) => v as f64,
            DeviceValue::I16(v) => v as f64,
            DeviceValue::U32(v) => v as f64,
            DeviceValue::I32(v) => v as f64,
            DeviceValue::F32(v) => v as f64,
            DeviceValue::F64(v) => v,
        }
    }

    /// Construye un valor del tipo pedido; `None` si `v` no es representable
    /// sin truncar (fracción en un entero, fuera de rango, bool distinto de 0/1).
    pub fn from_f64(data_type: DataType, v: f64) -> Option<Self> {
        fn integral(v: f64, min: f64, max: f64) -> bool {
            v.fract() == 0.0 && v >= min && v <= max
        }
        match data_type {
            DataType::Bool if v == 0.0 || v == 1.0 => Some(DeviceValue::Bool(v == 1.0)),
            DataType::Bool => None,
            DataType::U16 if integral(v, 0.0, u16::MAX as f64) => Some(DeviceValue::U16(v as u16)),
            DataType::I16 if integral(v, i16::MIN as f64, i16::MAX as f64) => Some(DeviceValue::I16(v as i16)),
            DataType::U32 if integral(v, 0.0, u32::MAX as f64) => Some(DeviceValue::U32(v as u32)),
            DataType::I32 if integral(v, i32::MIN as f64, i32::MAX as f64) => Some(DeviceValue::I32(v as i32)),
            DataType::F32 if v.is_finite() && v.abs() <= f32::MAX as f64 => Some(DeviceValue::F32(v as f32)),
            DataType::F64 if v.is_finite() => Some(DeviceValue::F64(v)),
            _ => None,
        }
    }

    pub fn encode(&self) -> RawData {
        match *self {
            DeviceValue::Bool(b) => RawData::Bits(vec![b]),
            DeviceValue::U16(v) => RawData::Words(vec![v]),
            DeviceValue::I16(v) => RawData::Words(vec![v as u16]),
            DeviceValue::U32(v) => RawData::Words(split_u32(v).to_vec()),
            DeviceValue::I32(v) => RawData::Words(split_u32(v as u32).to_vec()),
            DeviceValue::F32(v) => RawData::Words(split_u32(v.to_bits()).to_vec()),
            DeviceValue::F64(v) => {
                let bits = v.to_bits();
                RawData::Words(vec![(bits >> 48) as u16, (bits >> 32) as u16, (bits >> 16) as u16, bits as u16])
            }
        }
    }

    /// `None` si faltan bits/registros o el área no corresponde al tipo.
    pub fn decode(data_type: DataType, raw: &RawData) -> Option<Self> {
        let width = data_type.width() as usize;
        match (data_type, raw) {
            (DataType::Bool, RawData::Bits(bits)) => bits.first().copied().map(DeviceValue::Bool),
            (_, RawData::Words(words)) if words.len() >= width => {
                let w = &words[..width];
                match data_type {
                    DataType::U16 => Some(DeviceValue::U16(w[0])),
                    DataType::I16 => Some(DeviceValue::I16(w[0] as i16)),
                    DataType::U32 => Some(DeviceValue::U32(join_u32(w[0], w[1]))),
                    DataType::I32 => Some(DeviceValue::I32(join_u32(w[0], w[1]) as i32)),
                    DataType::F32 => Some(DeviceValue::F32(f32::from_bits(join_u32(w[0], w[1])))),
                    DataType::F64 => {
                        let bits = w.iter().fold(0u64, |acc, word| (acc << 16) | *word as u64);
                        Some(DeviceValue::F64(f64::from_bits(bits)))
                    }
                    DataType::Bool => None,
                }
            }
            _ => None,
        }
    }
}

fn split_u32(v: u32) -> [u16; 2] {
    [(v >> 16) as u16, v as u16]
}

fn join_u32(hi: u16, lo: u16) -> u32 {
    ((hi as u32) << 16) | lo as u32
}

/// Tipos escalares con lectura/escritura tipada (`read_value::<T>`).
pub trait DeviceScalar: Sized + Send {
    const DATA_TYPE: DataType;

    fn into_device_value(self) -> DeviceValue;

    fn from_device_value(value: DeviceValue) -> Option<Self>;
}

macro_rules! device_scalar {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl DeviceScalar for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_device_value(self) -> DeviceValue {
                DeviceValue::$variant(self)
            }

            fn from_device_value(value: DeviceValue) -> Option<Self> {
                match value {
                    DeviceValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        })*
    };
}

device_scalar!(bool => Bool, u16 => U16, i16 => I16, u32 => U32, i32 => I32, f32 => F32, f64 => F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_uses_high_word_first() {
        let raw = DeviceValue::F32(1.0).encode();
        assert_eq!(raw, RawData::Words(vec![0x3F80, 0x0000]));
        assert_eq!(DeviceValue::decode(DataType::F32, &raw), Some(DeviceValue::F32(1.0)));
    }

    #[test]
    fn signed_values_survive_the_register_image() {
        let raw = DeviceValue::I32(-2).encode();
        assert_eq!(raw, RawData::Words(vec![0xFFFF, 0xFFFE]));
        assert_eq!(DeviceValue::decode(DataType::I32, &raw), Some(DeviceValue::I32(-2)));
        assert_eq!(DeviceValue::decode(DataType::I16, &RawData::Words(vec![0x8000])),
                   Some(DeviceValue::I16(i16::MIN)));
    }

    #[test]
    fn decode_requires_enough_words_and_matching_area() {
        assert_eq!(DeviceValue::decode(DataType::F64, &RawData::Words(vec![1, 2])), None);
        assert_eq!(DeviceValue::decode(DataType::Bool, &RawData::Words(vec![1])), None);
        assert_eq!(DeviceValue::decode(DataType::U16, &RawData::Bits(vec![true])), None);
    }

    #[test]
    fn from_f64_refuses_lossy_conversions() {
        assert_eq!(DeviceValue::from_f64(DataType::U16, 5.0), Some(DeviceValue::U16(5)));
        assert_eq!(DeviceValue::from_f64(DataType::U16, 5.5), None);
        assert_eq!(DeviceValue::from_f64(DataType::U16, -1.0), None);
        assert_eq!(DeviceValue::from_f64(DataType::Bool, 2.0), None);
        assert_eq!(DeviceValue::from_f64(DataType::F64, f64::NAN), None);
    }

    #[test]
    fn parses_plc_style_type_names() {
        assert_eq!("REAL".parse::<DataType>().unwrap(), DataType::F32);
        assert_eq!("dint".parse::<DataType>().unwrap(), DataType::I32);
        assert!("string".parse::<DataType>().is_err());
    }
}
