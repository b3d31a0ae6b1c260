use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// Baud rate the sensor firmware runs at.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default per-read timeout. Short enough that a poll loop stays responsive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60);

/// Boards that reset when the port opens need time before they start sending.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Serial port settings. Framing is always 8N1 with no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path (`/dev/ttyACM0`, `COM15`, ...).
    pub path: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Read/write timeout applied to the open port.
    pub timeout: Duration,
    /// Pause after opening, before the link is handed to the caller.
    pub settle: Duration,
}

impl SerialConfig {
    /// Default settings for the given device path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            settle: DEFAULT_SETTLE,
        }
    }
}

/// Open a serial port and wrap it as a [`LinkStream`].
///
/// Both OS buffers are cleared after opening so the first bytes read belong to
/// the current session, then the call sleeps for `config.settle`.
pub fn open_serial(config: &SerialConfig) -> Result<LinkStream> {
    let port = serialport::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.timeout)
        .open()
        .map_err(|source| TransportError::Open {
            path: config.path.clone(),
            source,
        })?;

    port.clear(ClearBuffer::All)?;
    info!(path = %config.path, baud = config.baud_rate, "serial link open");

    if !config.settle.is_zero() {
        debug!(settle = ?config.settle, "waiting for board to settle");
        std::thread::sleep(config.settle);
    }

    Ok(LinkStream::from_serial(port))
}

/// What kind of device a serial port is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortKind {
    Usb {
        vid: u16,
        pid: u16,
        product: Option<String>,
    },
    Pci,
    Bluetooth,
    Unknown,
}

impl PortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Usb { .. } => "usb",
            PortKind::Pci => "pci",
            PortKind::Bluetooth => "bluetooth",
            PortKind::Unknown => "unknown",
        }
    }
}

/// A serial port visible on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
}

/// Enumerate serial ports.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(port_info).collect())
}

fn port_info(port: serialport::SerialPortInfo) -> PortInfo {
    let kind = match port.port_type {
        SerialPortType::UsbPort(usb) => PortKind::Usb {
            vid: usb.vid,
            pid: usb.pid,
            product: usb.product,
        },
        SerialPortType::PciPort => PortKind::Pci,
        SerialPortType::BluetoothPort => PortKind::Bluetooth,
        SerialPortType::Unknown => PortKind::Unknown,
    };
    PortInfo {
        name: port.port_name,
        kind,
    }
}
