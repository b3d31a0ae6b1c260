use std::io::Write;
use std::time::{Duration, Instant};

use sonolink_frame::{FrameWriter, Reading};
use tracing::debug;

use crate::error::Result;
use crate::indicator::{Indicator, LedZone, Thresholds};
use crate::source::SensorSource;
use crate::timer::SampleTimer;

/// The sensor node's main loop body.
///
/// Call [`poll`](Self::poll) as often as convenient. When the sample timer is
/// due, the node samples its source, writes the frame inline, and updates the
/// indicator. There is a single writer, so the link is never contended.
pub struct SensorNode<S, W> {
    source: S,
    writer: FrameWriter<W>,
    timer: SampleTimer,
    thresholds: Thresholds,
    indicator: Option<Box<dyn Indicator + Send>>,
    zone: LedZone,
}

impl<S: SensorSource, W: Write> SensorNode<S, W> {
    pub fn new(source: S, link: W, interval: Duration) -> Self {
        Self {
            source,
            writer: FrameWriter::new(link),
            timer: SampleTimer::new(interval),
            thresholds: Thresholds::default(),
            indicator: None,
            zone: LedZone::Off,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_indicator(mut self, indicator: Box<dyn Indicator + Send>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Sample and send if the interval has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Reading>> {
        if !self.timer.ready(now) {
            return Ok(None);
        }
        self.sample_now().map(Some)
    }

    /// Sample, send, and update the indicator right away.
    pub fn sample_now(&mut self) -> Result<Reading> {
        let reading = self.source.sample();
        self.writer.send(&reading)?;

        let zone = self.thresholds.classify(reading.distance_cm);
        if zone != self.zone {
            debug!(from = self.zone.as_str(), to = zone.as_str(), "zone changed");
        }
        self.zone = zone;
        if let Some(indicator) = self.indicator.as_mut() {
            indicator.show(zone);
        }

        debug!(
            distance_cm = reading.distance_cm,
            light_level = reading.light_level,
            seq = self.writer.sent(),
            "reading sent"
        );
        Ok(reading)
    }

    /// Time until the next sample is due.
    pub fn next_due(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }

    /// Zone shown after the latest sample.
    pub fn zone(&self) -> LedZone {
        self.zone
    }

    /// Frames written so far.
    pub fn sent(&self) -> u64 {
        self.writer.sent()
    }

    /// Borrow the sensor source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consume the node and return the link.
    pub fn into_link(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use sonolink_frame::{FrameError, FrameReceiver, FRAME_SIZE};

    use super::*;
    use crate::error::NodeError;
    use crate::sim::SimulatedSensor;

    #[derive(Clone, Default)]
    struct RecordingIndicator {
        zones: Arc<Mutex<Vec<LedZone>>>,
    }

    impl Indicator for RecordingIndicator {
        fn show(&mut self, zone: LedZone) {
            self.zones.lock().unwrap().push(zone);
        }
    }

    #[test]
    fn poll_sends_only_when_due() {
        let start = Instant::now();
        let mut node = SensorNode::new(
            SimulatedSensor::new(),
            Cursor::new(Vec::new()),
            Duration::from_millis(500),
        );

        assert!(node.poll(start).unwrap().is_some());
        assert!(node.poll(start + Duration::from_millis(100)).unwrap().is_none());
        assert!(node.poll(start + Duration::from_millis(500)).unwrap().is_some());
        assert_eq!(node.sent(), 2);
        assert_eq!(node.source().step(), 2);

        let wire = node.into_link().into_inner();
        assert_eq!(wire.len(), 2 * FRAME_SIZE);
    }

    #[test]
    fn host_receiver_sees_what_node_sent() {
        let start = Instant::now();
        let mut node = SensorNode::new(
            SimulatedSensor::new(),
            Cursor::new(Vec::new()),
            Duration::from_millis(10),
        );

        let mut sent = Vec::new();
        for i in 0..5u64 {
            let now = start + Duration::from_millis(10 * i);
            sent.push(node.poll(now).unwrap().unwrap());
        }

        let wire = node.into_link().into_inner();
        let mut rx = FrameReceiver::new();
        let got: Vec<Reading> = rx.feed(&wire).map(|r| r.unwrap()).collect();
        assert_eq!(got, sent);
    }

    #[test]
    fn indicator_follows_distance() {
        let indicator = RecordingIndicator::default();
        let zones = Arc::clone(&indicator.zones);

        let mut distances = vec![5.0f32, 12.0, 20.0, 10.0].into_iter();
        let source = move || Reading::new(distances.next().unwrap_or(0.0), 0);
        let mut node = SensorNode::new(source, Cursor::new(Vec::new()), Duration::ZERO)
            .with_indicator(Box::new(indicator));

        for _ in 0..4 {
            node.sample_now().unwrap();
        }

        assert_eq!(
            *zones.lock().unwrap(),
            vec![LedZone::Near, LedZone::Mid, LedZone::Far, LedZone::Off]
        );
        assert_eq!(node.zone(), LedZone::Off);
    }

    #[test]
    fn custom_thresholds_apply() {
        let source = || Reading::new(30.0, 0);
        let mut node = SensorNode::new(source, Cursor::new(Vec::new()), Duration::ZERO)
            .with_thresholds(Thresholds {
                lower_cm: 20.0,
                upper_cm: 40.0,
            });

        node.sample_now().unwrap();
        assert_eq!(node.zone(), LedZone::Mid);
    }

    #[test]
    fn closed_link_is_reported() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut node = SensorNode::new(SimulatedSensor::new(), Closed, Duration::ZERO);
        let err = node.sample_now().unwrap_err();

        assert!(err.is_closed());
        assert!(matches!(err, NodeError::Send(FrameError::TransportClosed)));
        assert_eq!(node.sent(), 0);
    }
}
