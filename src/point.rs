//! Register addressing model and request validation
//!
//! Callers hand over raw, wide-typed parameters (the CLI forwards numeric
//! literals without range checks); validation narrows them into a legal
//! [`Request`] or fails before any network activity. Pure functions, no side
//! effects.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{
    COIL_ON, FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS,
    FC_READ_INPUT_REGISTERS, FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_READ_BITS,
    MAX_READ_REGISTERS,
};
use crate::error::ValidationError;

/// The four addressable Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Read-write 16-bit registers (FC03 read, FC06 write)
    Holding,
    /// Read-only 16-bit registers (FC04)
    Input,
    /// Read-write single-bit outputs (FC01 read, FC05 write)
    Coil,
    /// Read-only single-bit inputs (FC02)
    Discrete,
}

impl RegisterKind {
    /// Single-bit kinds pack eight values per response byte.
    pub fn is_bit(self) -> bool {
        matches!(self, RegisterKind::Coil | RegisterKind::Discrete)
    }

    /// Function code used to read this kind.
    pub fn read_function(self) -> u8 {
        match self {
            RegisterKind::Holding => FC_READ_HOLDING_REGISTERS,
            RegisterKind::Input => FC_READ_INPUT_REGISTERS,
            RegisterKind::Coil => FC_READ_COILS,
            RegisterKind::Discrete => FC_READ_DISCRETE_INPUTS,
        }
    }

    /// Function code used to write this kind (single write).
    pub fn write_function(self) -> u8 {
        if self.is_bit() {
            FC_WRITE_SINGLE_COIL
        } else {
            FC_WRITE_SINGLE_REGISTER
        }
    }

    /// Per-kind ceiling on the count field of a read.
    pub fn max_read_count(self) -> u16 {
        if self.is_bit() {
            MAX_READ_BITS
        } else {
            MAX_READ_REGISTERS
        }
    }
}

impl FromStr for RegisterKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "holding" => Ok(RegisterKind::Holding),
            "input" => Ok(RegisterKind::Input),
            "coil" => Ok(RegisterKind::Coil),
            "discrete" => Ok(RegisterKind::Discrete),
            _ => Err(ValidationError::UnknownRegisterKind(s.to_string())),
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegisterKind::Holding => "holding",
            RegisterKind::Input => "input",
            RegisterKind::Coil => "coil",
            RegisterKind::Discrete => "discrete",
        };
        f.write_str(name)
    }
}

/// Unvalidated operation parameters as supplied by the caller.
#[derive(Debug, Clone)]
pub enum RawRequest {
    Read {
        address: u64,
        count: u32,
        kind: String,
    },
    Write {
        address: u64,
        value: u64,
        kind: String,
    },
}

impl RawRequest {
    /// Validate into a wire-representable [`Request`].
    ///
    /// Checks run in structural order: register kind first, then address,
    /// then count or value. The first violation is reported.
    pub fn validate(&self) -> Result<Request, ValidationError> {
        match self {
            RawRequest::Read {
                address,
                count,
                kind,
            } => {
                let kind: RegisterKind = kind.parse()?;
                let address = validate_address(*address)?;
                let count = validate_count(*count, kind)?;
                Ok(Request::ReadRegisters {
                    address,
                    count,
                    kind,
                })
            }
            RawRequest::Write {
                address,
                value,
                kind,
            } => {
                let kind: RegisterKind = kind.parse()?;
                let address = validate_address(*address)?;
                if kind.is_bit() {
                    let value = validate_coil_value(*value)?;
                    Ok(Request::WriteCoil { address, value })
                } else {
                    let value = validate_register_value(*value)?;
                    Ok(Request::WriteRegister { address, value })
                }
            }
        }
    }
}

/// Accept addresses that fit the 2-byte wire field, 0-65535 inclusive.
pub fn validate_address(candidate: u64) -> Result<u16, ValidationError> {
    u16::try_from(candidate).map_err(|_| ValidationError::AddressOutOfRange(candidate))
}

/// Accept counts of 1 up to the kind's limit (125 registers, 2000 bits).
pub fn validate_count(count: u32, kind: RegisterKind) -> Result<u16, ValidationError> {
    let max = kind.max_read_count();
    if count == 0 || count > u32::from(max) {
        return Err(ValidationError::CountOutOfRange { count, max });
    }
    Ok(count as u16)
}

/// Register writes carry an unsigned 16-bit value.
pub fn validate_register_value(value: u64) -> Result<u16, ValidationError> {
    u16::try_from(value).map_err(|_| ValidationError::ValueOutOfRange {
        value,
        reason: "register value must fit 16 bits",
    })
}

/// Coil writes accept only the boolean-coercible values: 0, 1 or the wire
/// encoding 0xFF00.
pub fn validate_coil_value(value: u64) -> Result<bool, ValidationError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        v if v == u64::from(COIL_ON) => Ok(true),
        _ => Err(ValidationError::ValueOutOfRange {
            value,
            reason: "coil value must be 0, 1 or 0xFF00",
        }),
    }
}

/// A validated register operation, ready for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ReadRegisters {
        address: u16,
        count: u16,
        kind: RegisterKind,
    },
    WriteRegister {
        address: u16,
        value: u16,
    },
    WriteCoil {
        address: u16,
        value: bool,
    },
}

impl Request {
    /// Function code this request goes out with.
    pub fn function_code(&self) -> u8 {
        match self {
            Request::ReadRegisters { kind, .. } => kind.read_function(),
            Request::WriteRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Request::WriteCoil { .. } => FC_WRITE_SINGLE_COIL,
        }
    }
}

/// Decoded register values, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Values {
    /// 16-bit words from holding/input register reads
    Words(Vec<u16>),
    /// Bits from coil/discrete input reads
    Bits(Vec<bool>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Words(w) => w.len(),
            Values::Bits(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Successful outcome of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Response {
    /// Server echoed a single write
    WriteAck { address: u16, value: u16 },
    /// Register or bit read results
    ReadResult(Values),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bounds() {
        assert_eq!(validate_address(0).unwrap(), 0);
        assert_eq!(validate_address(65_535).unwrap(), 65_535);
        assert_eq!(
            validate_address(65_536).unwrap_err(),
            ValidationError::AddressOutOfRange(65_536)
        );
        assert_eq!(
            validate_address(650_000).unwrap_err(),
            ValidationError::AddressOutOfRange(650_000)
        );
    }

    #[test]
    fn count_bounds_per_kind() {
        assert_eq!(validate_count(1, RegisterKind::Holding).unwrap(), 1);
        assert_eq!(validate_count(125, RegisterKind::Input).unwrap(), 125);
        assert!(validate_count(126, RegisterKind::Holding).is_err());
        assert!(validate_count(0, RegisterKind::Holding).is_err());

        assert_eq!(validate_count(2000, RegisterKind::Coil).unwrap(), 2000);
        assert!(validate_count(2001, RegisterKind::Discrete).is_err());
    }

    #[test]
    fn kind_tokens() {
        assert_eq!("holding".parse::<RegisterKind>().unwrap(), RegisterKind::Holding);
        assert_eq!("Input".parse::<RegisterKind>().unwrap(), RegisterKind::Input);
        assert_eq!("COIL".parse::<RegisterKind>().unwrap(), RegisterKind::Coil);
        assert_eq!(
            "potato".parse::<RegisterKind>().unwrap_err(),
            ValidationError::UnknownRegisterKind("potato".into())
        );
    }

    #[test]
    fn kind_error_reported_before_address_error() {
        // Both the kind and the address are invalid; the kind is the first
        // structural violation and must win.
        let raw = RawRequest::Read {
            address: 650_000,
            count: 1,
            kind: "potato".into(),
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::UnknownRegisterKind("potato".into())
        );
    }

    #[test]
    fn write_value_domains() {
        assert_eq!(validate_register_value(0xFFFF).unwrap(), 0xFFFF);
        assert!(validate_register_value(0x1_0000).is_err());

        assert!(!validate_coil_value(0).unwrap());
        assert!(validate_coil_value(1).unwrap());
        assert!(validate_coil_value(0xFF00).unwrap());
        assert!(validate_coil_value(2).is_err());
    }

    #[test]
    fn raw_write_selects_function() {
        let reg = RawRequest::Write {
            address: 420,
            value: 2,
            kind: "holding".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(reg.function_code(), FC_WRITE_SINGLE_REGISTER);
        assert_eq!(
            reg,
            Request::WriteRegister {
                address: 420,
                value: 2
            }
        );

        let coil = RawRequest::Write {
            address: 7,
            value: 1,
            kind: "coil".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(coil.function_code(), FC_WRITE_SINGLE_COIL);
    }

    #[test]
    fn no_bytes_until_valid() {
        // Validation is a pure function; an invalid request never constructs
        // a Request at all.
        let raw = RawRequest::Write {
            address: 650_000,
            value: 2,
            kind: "holding".into(),
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::AddressOutOfRange(650_000)
        );
    }
}
