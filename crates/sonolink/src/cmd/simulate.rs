use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use sonolink_frame::FrameError;
use sonolink_node::{NodeError, SensorNode, SimulatedSensor};
use sonolink_transport::open_serial;
use sonolink_transport::serial::DEFAULT_TIMEOUT;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, LinkTarget, SimulateArgs};
use crate::exit::{node_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_reading, OutputFormat};

/// Longest single sleep, so Ctrl-C is noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let target = link_target(&args)?;

    let running = install_ctrlc_handler()?;

    // The socket file lives as long as the listener; keep it alive for the
    // whole session.
    #[cfg(unix)]
    let mut _listener = None;

    let link = match &target {
        LinkTarget::Serial(config) => {
            open_serial(config).map_err(|err| transport_error("open failed", err))?
        }
        #[cfg(unix)]
        LinkTarget::Socket(path) => {
            let listener = sonolink_transport::UnixDomainSocket::bind(path)
                .map_err(|err| transport_error("bind failed", err))?;
            info!(path = %path.display(), "waiting for a monitor to connect");
            let link = listener
                .accept()
                .map_err(|err| transport_error("accept failed", err))?;
            _listener = Some(listener);
            link
        }
    };

    let mut node = SensorNode::new(SimulatedSensor::new(), link, interval);
    info!(interval = ?interval, "simulated node running");

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        match node.poll(now) {
            Ok(Some(reading)) => {
                print_reading(&reading, node.zone(), format);
                if args.count.is_some_and(|count| node.sent() >= count) {
                    break;
                }
            }
            Ok(None) => std::thread::sleep(node.next_due(now).min(POLL_SLICE)),
            Err(err) if is_disconnect(&err) => {
                info!(%err, "monitor went away");
                break;
            }
            Err(err) => return Err(node_error("send failed", err)),
        }
    }

    info!(sent = node.sent(), "simulation stopped");
    node.into_link().close();
    Ok(SUCCESS)
}

/// Serial I/O uses the port's own timeout, independent of the sampling
/// interval. The node side never waits for a board reset.
fn link_target(args: &SimulateArgs) -> CliResult<LinkTarget> {
    args.link.target(args.baud, DEFAULT_TIMEOUT, false)
}

fn is_disconnect(err: &NodeError) -> bool {
    match err {
        NodeError::Send(FrameError::TransportClosed) => true,
        NodeError::Send(FrameError::Io(io)) => matches!(
            io.kind(),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected
        ),
        NodeError::Send(_) => false,
    }
}
