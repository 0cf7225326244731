//! Modbus protocol constants based on the official specification
//!
//! Register/coil limits are derived from the 253-byte PDU ceiling the
//! protocol inherits from its RS485 origins.

/// MBAP header length for TCP, excluding the unit identifier.
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes;
/// the Length field counts everything after itself, starting with Unit ID.
pub const MBAP_HEADER_LEN: usize = 6;

/// Full MBAP prefix including the unit identifier (7 bytes).
pub const MBAP_PREFIX_LEN: usize = MBAP_HEADER_LEN + 1;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification:
/// RS485 ADU (256) - slave address (1) - CRC (2) = 253 bytes.
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum legal value of the MBAP Length field: Unit ID + max PDU.
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Maximum registers per FC03/FC04 read.
///
/// Response PDU: FC(1) + byte count(1) + N*2 <= 253, so N <= 125.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum coils/discrete inputs per FC01/FC02 read (spec-defined limit).
pub const MAX_READ_BITS: u16 = 2000;

// Function codes

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;
/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// High bit a server sets on the echoed function code of an exception reply.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Coil ON value for FC05 payloads; OFF is 0x0000.
pub const COIL_ON: u16 = 0xFF00;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Modbus TCP default port.
pub const DEFAULT_TCP_PORT: u16 = 502;
