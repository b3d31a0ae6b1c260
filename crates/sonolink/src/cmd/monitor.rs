use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sonolink_frame::{FrameError, FrameReader, LinkConfig, Reading, ReceiverStats};
use sonolink_node::Thresholds;
use sonolink_transport::LinkStream;
use tracing::{debug, info, warn};

use crate::cmd::{
    install_ctrlc_handler, parse_duration, sleep_while_running, LinkTarget, MonitorArgs,
};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_reading, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let read_timeout = parse_duration(&args.timeout)?;
    let reconnect = args.reconnect.as_deref().map(parse_duration).transpose()?;
    let target = args.link.target(args.baud, read_timeout, !args.no_settle)?;

    let running = install_ctrlc_handler()?;

    let link = target
        .open()
        .map_err(|err| transport_error("open failed", err))?;
    let config = LinkConfig {
        read_timeout: Some(read_timeout),
        ..LinkConfig::default()
    };
    let mut reader = FrameReader::with_config_link(link, config)
        .map_err(|err| frame_error("link setup failed", err))?;

    let thresholds = Thresholds::default();
    let mut summary = Summary::new(args.window as usize);
    let mut printed = 0u64;

    while running.load(Ordering::SeqCst) {
        match reader.read_reading() {
            Ok(reading) => {
                print_reading(&reading, thresholds.classify(reading.distance_cm), format);
                summary.push(reading);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(FrameError::Io(err)) if is_timeout(err.kind()) => continue,
            Err(err) if is_hangup(&err) => {
                let Some(interval) = reconnect else {
                    info!(%err, "link closed");
                    break;
                };
                warn!(%err, retry_in = ?interval, "link closed, reconnecting");
                match reopen(&target, interval, read_timeout, &running) {
                    Some(link) => reader.reconnect(link).close(),
                    None => break,
                }
            }
            Err(err) => {
                log_session(reader.stats(), &summary);
                return Err(frame_error("read failed", err));
            }
        }
    }

    log_session(reader.stats(), &summary);
    reader.into_inner().close();
    Ok(SUCCESS)
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// EOF, or the far end dropping the connection under us.
fn is_hangup(err: &FrameError) -> bool {
    match err {
        FrameError::TransportClosed => true,
        FrameError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Retry opening the link at a fixed interval until it succeeds or the
/// process is asked to stop.
fn reopen(
    target: &LinkTarget,
    interval: Duration,
    read_timeout: Duration,
    running: &AtomicBool,
) -> Option<LinkStream> {
    loop {
        sleep_while_running(interval, running);
        if !running.load(Ordering::SeqCst) {
            return None;
        }

        match target.open() {
            Ok(mut link) => match link.set_read_timeout(Some(read_timeout)) {
                Ok(()) => {
                    info!(kind = link.kind().as_str(), "link reopened");
                    return Some(link);
                }
                Err(err) => warn!(%err, "reopened link rejected read timeout"),
            },
            Err(err) => debug!(%err, "reconnect attempt failed"),
        }
    }
}

fn log_session(stats: &ReceiverStats, summary: &Summary) {
    info!(
        readings = stats.readings,
        discarded_bytes = stats.discarded_bytes,
        checksum_mismatches = stats.checksum_mismatches,
        bad_end_markers = stats.bad_end_markers,
        overflow_bytes = stats.overflow_bytes,
        "receiver stats"
    );

    if let Some(d) = summary.distance() {
        info!(
            window = d.count,
            min = d.min,
            max = d.max,
            mean = d.mean,
            "distance_cm"
        );
    }
    if let Some(l) = summary.light() {
        info!(
            window = l.count,
            min = l.min,
            max = l.max,
            mean = l.mean,
            "light_level"
        );
    }
}

/// Rolling window over the most recent readings.
#[derive(Debug)]
pub struct Summary {
    window: usize,
    recent: VecDeque<Reading>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Summary {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(reading);
    }

    /// Spread of the finite distances in the window.
    pub fn distance(&self) -> Option<Spread> {
        spread(
            self.recent
                .iter()
                .map(|r| f64::from(r.distance_cm))
                .filter(|d| d.is_finite()),
        )
    }

    pub fn light(&self) -> Option<Spread> {
        spread(self.recent.iter().map(|r| f64::from(r.light_level)))
    }
}

fn spread(values: impl Iterator<Item = f64>) -> Option<Spread> {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for v in values {
        count += 1;
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }

    (count > 0).then(|| Spread {
        count,
        min,
        max,
        mean: sum / count as f64,
    })
}
