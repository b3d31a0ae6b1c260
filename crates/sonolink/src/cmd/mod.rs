use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use sonolink_transport::serial::DEFAULT_BAUD_RATE;
use sonolink_transport::{open_serial, LinkStream, SerialConfig};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod codec;
pub mod monitor;
pub mod ports;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read frames from a link and print each reading.
    Monitor(MonitorArgs),
    /// Run a simulated sensor node that sends readings over a link.
    Simulate(SimulateArgs),
    /// Encode a reading into an 11-byte frame.
    Encode(EncodeArgs),
    /// Decode and validate an 11-byte frame given as hex.
    Decode(DecodeArgs),
    /// List serial ports on this machine.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Encode(args) => codec::encode(args, format),
        Command::Decode(args) => codec::decode(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the link lives. Exactly one of the two must be given.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct LinkArgs {
    /// Serial device (e.g. /dev/ttyACM0, COM15).
    #[arg(long, env = "SONOLINK_PORT", value_name = "DEVICE")]
    pub port: Option<String>,
    /// Unix socket standing in for the serial wire.
    #[arg(long, env = "SONOLINK_SOCKET", value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Serial line speed.
    #[arg(long, env = "SONOLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Read timeout between shutdown checks (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Skip the pause after opening a serial port.
    #[arg(long)]
    pub no_settle: bool,
    /// Exit after printing N readings.
    #[arg(long)]
    pub count: Option<u64>,
    /// Reopen the link at this interval after it closes (e.g. 2s).
    #[arg(long, value_name = "DURATION")]
    pub reconnect: Option<String>,
    /// Number of recent readings summarized on exit.
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    pub window: u64,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Serial line speed.
    #[arg(long, env = "SONOLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Sampling interval (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Stop after sending N readings.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Distance in centimetres.
    #[arg(long, allow_negative_numbers = true)]
    pub distance: f32,
    /// Raw light level.
    #[arg(long, allow_negative_numbers = true)]
    pub light: i32,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex. Spaces between bytes are allowed.
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A resolved link endpoint.
#[derive(Debug)]
pub enum LinkTarget {
    Serial(SerialConfig),
    #[cfg(unix)]
    Socket(PathBuf),
}

impl LinkArgs {
    pub fn target(&self, baud: u32, timeout: Duration, settle: bool) -> CliResult<LinkTarget> {
        if let Some(port) = &self.port {
            let mut config = SerialConfig::new(port.clone());
            config.baud_rate = baud;
            config.timeout = timeout;
            if !settle {
                config.settle = Duration::ZERO;
            }
            return Ok(LinkTarget::Serial(config));
        }

        match &self.socket {
            #[cfg(unix)]
            Some(path) => Ok(LinkTarget::Socket(path.clone())),
            #[cfg(not(unix))]
            Some(_) => Err(CliError::new(
                USAGE,
                "--socket is only supported on unix platforms",
            )),
            None => Err(CliError::new(USAGE, "one of --port or --socket is required")),
        }
    }
}

impl LinkTarget {
    /// Open the link as a client: a serial port, or a connection to a
    /// listening socket.
    pub fn open(&self) -> sonolink_transport::Result<LinkStream> {
        match self {
            LinkTarget::Serial(config) => open_serial(config),
            #[cfg(unix)]
            LinkTarget::Socket(path) => sonolink_transport::UnixDomainSocket::connect(path),
        }
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Sleep for `total`, waking early once `running` is cleared.
pub fn sleep_while_running(total: Duration, running: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(100);

    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        std::thread::sleep(left.min(SLICE));
    }
}
