//! Direcciones de dispositivo: `"<área><offset>"`.
//!
//! | prefijo          | área                     |
//! |------------------|--------------------------|
//! | (ninguno), HR, D | holding register         |
//! | IR               | input register (lectura) |
//! | C, M, Y          | coil                     |
//! | DI, X            | discrete input (lectura) |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterArea {
    Holding,
    Input,
    Coil,
    Discrete,
}

impl RegisterArea {
    pub fn is_bit(self) -> bool {
        matches!(self, RegisterArea::Coil | RegisterArea::Discrete)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, RegisterArea::Holding | RegisterArea::Coil)
    }

    fn prefix(self) -> &'static str {
        match self {
            RegisterArea::Holding => "HR",
            RegisterArea::Input => "IR",
            RegisterArea::Coil => "C",
            RegisterArea::Discrete => "DI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    pub area: RegisterArea,
    pub offset: u16,
}

impl DeviceAddress {
    pub fn new(area: RegisterArea, offset: u16) -> Self {
        Self { area, offset }
    }
}

impl FromStr for DeviceAddress {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let split = raw.find(|c: char| c.is_ascii_digit())
                       .ok_or_else(|| DeviceError::invalid_address(s, "missing numeric offset"))?;
        let (prefix, digits) = raw.split_at(split);
        let area = match prefix.to_ascii_uppercase().as_str() {
            "" | "HR" | "D" => RegisterArea::Holding,
            "IR" => RegisterArea::Input,
            "C" | "M" | "Y" => RegisterArea::Coil,
            "DI" | "X" => RegisterArea::Discrete,
            other => return Err(DeviceError::invalid_address(s, format!("unknown area prefix '{other}'"))),
        };
        let offset = digits.parse::<u16>()
                           .map_err(|e| DeviceError::invalid_address(s, format!("bad offset: {e}")))?;
        Ok(Self { area, offset })
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.area.prefix(), self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_prefixes() {
        assert_eq!("D100".parse::<DeviceAddress>().unwrap(), DeviceAddress::new(RegisterArea::Holding, 100));
        assert_eq!("40".parse::<DeviceAddress>().unwrap(), DeviceAddress::new(RegisterArea::Holding, 40));
        assert_eq!("ir3".parse::<DeviceAddress>().unwrap(), DeviceAddress::new(RegisterArea::Input, 3));
        assert_eq!("M12".parse::<DeviceAddress>().unwrap(), DeviceAddress::new(RegisterArea::Coil, 12));
        assert_eq!("X0".parse::<DeviceAddress>().unwrap(), DeviceAddress::new(RegisterArea::Discrete, 0));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "HR", "Q10", "D70000", "D1x"] {
            assert!(matches!(bad.parse::<DeviceAddress>(), Err(DeviceError::InvalidAddress { .. })), "{bad}");
        }
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!("d100".parse::<DeviceAddress>().unwrap().to_string(), "HR100");
    }
}
