//! Wire codec for Modbus over TCP
//!
//! Encoding builds the 7-byte MBAP header (transaction id, protocol id 0,
//! length, unit id) followed by the PDU; decoding walks the same layout back
//! and classifies the PDU as a normal response or a server exception. All
//! multi-byte fields are big-endian. Anything that does not line up is a
//! `MalformedFrame` — the codec never guesses.

use std::fmt;

use tracing::debug;

use crate::constants::{
    COIL_ON, EXCEPTION_FLAG, FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_MBAP_LENGTH,
    MBAP_HEADER_LEN, MBAP_PREFIX_LEN,
};
use crate::error::{ClientError, Result};
use crate::pdu::Pdu;
use crate::point::{Request, Response, Values};

/// Server-reported exception codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    /// Code outside the standard table, preserved verbatim
    Other(u8),
}

impl ExceptionCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetFailed,
            other => ExceptionCode::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetFailed => 0x0B,
            ExceptionCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => write!(f, "Illegal Function"),
            ExceptionCode::IllegalDataAddress => write!(f, "Illegal Data Address"),
            ExceptionCode::IllegalDataValue => write!(f, "Illegal Data Value"),
            ExceptionCode::ServerDeviceFailure => write!(f, "Server Device Failure"),
            ExceptionCode::Acknowledge => write!(f, "Acknowledge"),
            ExceptionCode::ServerDeviceBusy => write!(f, "Server Device Busy"),
            ExceptionCode::MemoryParityError => write!(f, "Memory Parity Error"),
            ExceptionCode::GatewayPathUnavailable => write!(f, "Gateway Path Unavailable"),
            ExceptionCode::GatewayTargetFailed => {
                write!(f, "Gateway Target Device Failed to Respond")
            }
            ExceptionCode::Other(code) => write!(f, "Unknown Exception ({code:#04x})"),
        }
    }
}

/// One received TCP frame, header fields unpacked and PDU detached.
#[derive(Debug, Clone)]
pub struct TcpFrame {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub pdu: Pdu,
}

/// Encode a validated request into a complete TCP ADU.
pub fn encode_request(transaction_id: u16, unit_id: u8, request: &Request) -> Result<Vec<u8>> {
    let pdu = encode_pdu(request)?;
    let length = (pdu.len() + 1) as u16; // PDU + unit id

    let mut frame = Vec::with_capacity(MBAP_PREFIX_LEN + pdu.len());
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes()); // protocol id
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(pdu.as_slice());

    debug!(
        "frame built: txn={:04X}, unit={}, fc={:02X}, len={}",
        transaction_id,
        unit_id,
        request.function_code(),
        frame.len()
    );
    Ok(frame)
}

fn encode_pdu(request: &Request) -> Result<Pdu> {
    let mut pdu = Pdu::new();
    match *request {
        Request::ReadRegisters { address, count, kind } => {
            pdu.push(kind.read_function())?;
            pdu.push_u16(address)?;
            pdu.push_u16(count)?;
        }
        Request::WriteRegister { address, value } => {
            pdu.push(FC_WRITE_SINGLE_REGISTER)?;
            pdu.push_u16(address)?;
            pdu.push_u16(value)?;
        }
        Request::WriteCoil { address, value } => {
            pdu.push(FC_WRITE_SINGLE_COIL)?;
            pdu.push_u16(address)?;
            pdu.push_u16(if value { COIL_ON } else { 0x0000 })?;
        }
    }
    Ok(pdu)
}

/// Decode one complete frame as received off the wire.
///
/// The slice must hold exactly the frame: MBAP header plus the number of
/// bytes the Length field announces.
pub fn decode_frame(data: &[u8]) -> Result<TcpFrame> {
    if data.len() < MBAP_PREFIX_LEN + 1 {
        return Err(ClientError::malformed(format!(
            "frame too short: {} bytes",
            data.len()
        )));
    }

    let transaction_id = u16::from_be_bytes([data[0], data[1]]);
    let protocol_id = u16::from_be_bytes([data[2], data[3]]);
    let length = u16::from_be_bytes([data[4], data[5]]) as usize;
    let unit_id = data[6];

    if protocol_id != 0 {
        return Err(ClientError::malformed(format!(
            "protocol id {protocol_id} (expected 0)"
        )));
    }
    if length == 0 || length > MAX_MBAP_LENGTH {
        return Err(ClientError::malformed(format!("length field {length}")));
    }
    if data.len() != MBAP_HEADER_LEN + length {
        return Err(ClientError::malformed(format!(
            "length field announces {} bytes, frame has {}",
            MBAP_HEADER_LEN + length,
            data.len()
        )));
    }

    let pdu = Pdu::from_slice(&data[MBAP_PREFIX_LEN..])?;
    debug!(
        "frame parsed: txn={:04X}, unit={}, pdu={}B",
        transaction_id,
        unit_id,
        pdu.len()
    );

    Ok(TcpFrame {
        transaction_id,
        unit_id,
        pdu,
    })
}

/// Interpret a correlated PDU against the request that produced it.
///
/// An exception PDU becomes `ServerRejected`; a normal PDU is parsed per the
/// request's function code.
pub fn decode_response(request: &Request, pdu: &Pdu) -> Result<Response> {
    let fc = pdu
        .function_code()
        .ok_or_else(|| ClientError::malformed("empty PDU"))?;

    if pdu.is_exception() {
        let body = pdu.as_slice();
        if body.len() < 2 {
            return Err(ClientError::malformed("exception PDU without code byte"));
        }
        return Err(ClientError::ServerRejected {
            function: fc & !EXCEPTION_FLAG,
            exception: ExceptionCode::from_u8(body[1]),
        });
    }

    if fc != request.function_code() {
        return Err(ClientError::malformed(format!(
            "function code {:#04x} does not match request {:#04x}",
            fc,
            request.function_code()
        )));
    }

    let body = &pdu.as_slice()[1..];
    match *request {
        Request::ReadRegisters { count, kind, .. } if kind.is_bit() => {
            Ok(Response::ReadResult(Values::Bits(parse_bits(body, count)?)))
        }
        Request::ReadRegisters { count, .. } => {
            Ok(Response::ReadResult(Values::Words(parse_words(body, count)?)))
        }
        Request::WriteRegister { .. } | Request::WriteCoil { .. } => {
            let (address, value) = parse_write_echo(body)?;
            Ok(Response::WriteAck { address, value })
        }
    }
}

/// FC03/FC04 body: byte count then `count` big-endian words.
fn parse_words(body: &[u8], count: u16) -> Result<Vec<u16>> {
    let Some((&byte_count, words)) = body.split_first() else {
        return Err(ClientError::malformed("read response missing byte count"));
    };
    if usize::from(byte_count) != words.len() || words.len() != usize::from(count) * 2 {
        return Err(ClientError::malformed(format!(
            "read response byte count {} for {} requested registers ({} bytes present)",
            byte_count,
            count,
            words.len()
        )));
    }
    Ok(words
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

/// FC01/FC02 body: byte count then packed bits, LSB first within each byte.
fn parse_bits(body: &[u8], count: u16) -> Result<Vec<bool>> {
    let Some((&byte_count, packed)) = body.split_first() else {
        return Err(ClientError::malformed("read response missing byte count"));
    };
    let expected = usize::from(count).div_ceil(8);
    if usize::from(byte_count) != packed.len() || packed.len() != expected {
        return Err(ClientError::malformed(format!(
            "bit response byte count {} for {} requested bits ({} bytes present)",
            byte_count,
            count,
            packed.len()
        )));
    }
    Ok((0..usize::from(count))
        .map(|i| packed[i / 8] & (1 << (i % 8)) != 0)
        .collect())
}

/// FC05/FC06 body: the server echoes address and value.
fn parse_write_echo(body: &[u8]) -> Result<(u16, u16)> {
    if body.len() != 4 {
        return Err(ClientError::malformed(format!(
            "write echo of {} bytes (expected 4)",
            body.len()
        )));
    }
    let address = u16::from_be_bytes([body[0], body[1]]);
    let value = u16::from_be_bytes([body[2], body[3]]);
    Ok((address, value))
}
