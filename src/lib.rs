//! Modbus TCP client library
//!
//! Layered bottom-up: a stack-allocated PDU buffer, the MBAP wire codec, a
//! TCP transport session, and a request/response engine that correlates
//! replies by transaction id. Request parameters are validated before any
//! bytes are sent.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use modcli::{ModbusClient, RawRequest};
//!
//! # async fn demo() -> modcli::Result<()> {
//! let request = RawRequest::Read {
//!     address: 100,
//!     count: 4,
//!     kind: "holding".into(),
//! }
//! .validate()?;
//!
//! let mut client = ModbusClient::connect("10.0.0.5:502", 1, Duration::from_secs(5)).await?;
//! let response = client.execute(&request).await?;
//! println!("{response:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod constants;
pub mod error;
pub mod frame;
pub mod output;
pub mod pdu;
pub mod point;
pub mod session;

pub use client::ModbusClient;
pub use error::{ClientError, Result, ValidationError};
pub use frame::ExceptionCode;
pub use output::OutputFormat;
pub use point::{RawRequest, RegisterKind, Request, Response, Values};
pub use session::TcpSession;
