//! Result rendering for the command line
//!
//! One line per register, `address: value`, with the value radix chosen by
//! the user. JSON output emits a single object for scripting.

use clap::ValueEnum;
use serde_json::json;

use crate::point::{Response, Values};

/// Value radix for printed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Decimal (default)
    Dec,
    /// Hexadecimal, zero-padded to 16 bits
    Hex,
    /// Binary, zero-padded to 16 bits
    Bin,
    /// Single JSON object
    Json,
}

/// Render a completed exchange. `address` is the request's start address,
/// used to label each value on multi-register reads.
pub fn render(response: &Response, address: u16, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => render_json(response, address),
        _ => render_lines(response, address, format),
    }
}

fn render_lines(response: &Response, address: u16, format: OutputFormat) -> String {
    match response {
        Response::WriteAck { address, value } => {
            format!("{}: {}", address, format_word(*value, format))
        }
        Response::ReadResult(Values::Words(words)) => words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                format!(
                    "{}: {}",
                    address.wrapping_add(i as u16),
                    format_word(*w, format)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Response::ReadResult(Values::Bits(bits)) => bits
            .iter()
            .enumerate()
            .map(|(i, b)| {
                format!("{}: {}", address.wrapping_add(i as u16), u8::from(*b))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_json(response: &Response, address: u16) -> String {
    let value = match response {
        Response::WriteAck { address, value } => json!({
            "address": address,
            "value": value,
        }),
        Response::ReadResult(values) => json!({
            "address": address,
            "count": values.len(),
            "values": values,
        }),
    };
    value.to_string()
}

fn format_word(value: u16, format: OutputFormat) -> String {
    match format {
        OutputFormat::Hex => format!("{value:#06x}"),
        OutputFormat::Bin => format!("{value:#018b}"),
        _ => value.to_string(),
    }
}
