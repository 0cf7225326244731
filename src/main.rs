//! Command-line Modbus TCP client
//!
//! `modcli <host:port> read-register -a 100 -k holding -c 4`
//! `modcli <host:port> write-register -a 420 -v 2`

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use modcli::constants::{DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS};
use modcli::output::{self, OutputFormat};
use modcli::{ClientError, ModbusClient, RawRequest, Request, ValidationError};

const EXIT_USAGE: u8 = 64;

#[derive(Parser)]
#[command(author, version, about = "Modbus TCP command-line client", long_about = None)]
struct Cli {
    /// Server endpoint, host:port (port defaults to 502)
    endpoint: String,

    /// Per-exchange timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read registers or bits
    ReadRegister {
        /// Start address (0-65535)
        #[arg(short, long)]
        address: u64,

        /// Register kind: holding, input, coil or discrete
        #[arg(short, long)]
        kind: String,

        /// Number of consecutive values to read
        #[arg(short, long, default_value_t = 1)]
        count: u32,

        /// Unit identifier
        #[arg(short, long, default_value_t = 1)]
        unit_id: u8,

        /// Value radix for printed results: dec, hex, bin or json
        #[arg(short, long, default_value = "dec")]
        presentation: String,

        /// Repeat the read every second until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Write a single register or coil
    WriteRegister {
        /// Target address (0-65535)
        #[arg(short, long)]
        address: u64,

        /// Value to write (registers: 0-65535; coils: 0, 1 or 0xFF00)
        #[arg(short, long)]
        value: u64,

        /// Register kind: holding or coil
        #[arg(short, long, default_value = "holding")]
        kind: String,

        /// Unit identifier
        #[arg(short, long, default_value_t = 1)]
        unit_id: u8,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help/version are not usage errors
            if e.use_stderr() {
                let _ = e.print();
                return ExitCode::from(EXIT_USAGE);
            }
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_USAGE)
        }
        Err(CliError::Client(err)) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let endpoint = normalize_endpoint(&cli.endpoint);
    let timeout = Duration::from_millis(cli.timeout_ms);

    match cli.command {
        Command::ReadRegister {
            address,
            kind,
            count,
            unit_id,
            presentation,
            watch,
        } => {
            // Validate before opening the socket.
            let request = RawRequest::Read {
                address,
                count,
                kind,
            }
            .validate()?;
            // Kind resolves through the validator above before the
            // presentation token is even looked at.
            let presentation = parse_presentation(&presentation)?;
            let start = match request {
                Request::ReadRegisters { address, .. } => address,
                _ => unreachable!("read request validates to ReadRegisters"),
            };

            let mut client = ModbusClient::connect(&endpoint, unit_id, timeout).await?;
            loop {
                let response = client.execute(&request).await?;
                println!("{}", output::render(&response, start, presentation));
                if !watch {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        Command::WriteRegister {
            address,
            value,
            kind,
            unit_id,
        } => {
            let request = RawRequest::Write {
                address,
                value,
                kind,
            }
            .validate()?;
            let start = match request {
                Request::WriteRegister { address, .. } | Request::WriteCoil { address, .. } => {
                    address
                }
                Request::ReadRegisters { .. } => {
                    unreachable!("write request validates to a write variant")
                }
            };

            let mut client = ModbusClient::connect(&endpoint, unit_id, timeout).await?;
            let response = client.execute(&request).await?;
            println!("{}", output::render(&response, start, OutputFormat::Dec));
        }
    }
    Ok(())
}

/// Append the well-known port when the endpoint names only a host.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains(':') {
        endpoint.to_string()
    } else {
        format!("{endpoint}:{DEFAULT_TCP_PORT}")
    }
}

/// Failures the binary reports: protocol errors keep their per-kind exit
/// code, usage errors exit 64.
#[derive(Debug)]
enum CliError {
    Client(ClientError),
    Usage(String),
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        CliError::Client(err)
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::Client(err.into())
    }
}

fn parse_presentation(token: &str) -> Result<OutputFormat, CliError> {
    OutputFormat::from_str(token, true).map_err(|_| {
        CliError::Usage(format!(
            "invalid presentation '{token}' (expected dec, hex, bin or json)"
        ))
    })
}

fn exit_code(err: &ClientError) -> u8 {
    match err {
        ClientError::Validation(_) => 2,
        ClientError::Connect { .. } => 3,
        ClientError::Timeout(_) => 4,
        ClientError::ConnectionClosed => 5,
        ClientError::MalformedFrame(_) => 6,
        ClientError::ServerRejected { .. } => 7,
    }
}
