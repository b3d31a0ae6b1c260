use std::time::Duration;

use sonolink_frame::Reading;

/// Speed of sound at room temperature, in centimetres per microsecond.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Anything that can produce a reading on demand.
pub trait SensorSource {
    fn sample(&mut self) -> Reading;
}

impl<F> SensorSource for F
where
    F: FnMut() -> Reading,
{
    fn sample(&mut self) -> Reading {
        self()
    }
}

/// An ultrasonic range finder's echo line.
pub trait EchoPulse {
    /// Trigger a ping and return how long the echo line stayed high, or
    /// `None` if no echo came back in time.
    fn echo(&mut self) -> Option<Duration>;
}

/// An analog light sensor.
pub trait LightSensor {
    /// Raw ADC level.
    fn level(&mut self) -> i32;
}

/// Convert an echo pulse width into a distance.
///
/// The pulse covers the round trip, so the microsecond count is halved
/// (integer division, matching the firmware) before scaling by the speed of
/// sound.
pub fn echo_to_distance_cm(echo: Duration) -> f32 {
    let micros = u64::try_from(echo.as_micros()).unwrap_or(u64::MAX);
    (micros / 2) as f32 * SPEED_OF_SOUND_CM_PER_US
}

/// The node's real sensor pair: a range finder plus a photocell.
#[derive(Debug)]
pub struct ProbeSensor<E, L> {
    echo: E,
    light: L,
}

impl<E: EchoPulse, L: LightSensor> ProbeSensor<E, L> {
    pub fn new(echo: E, light: L) -> Self {
        Self { echo, light }
    }

    /// Release the underlying sensors.
    pub fn into_parts(self) -> (E, L) {
        (self.echo, self.light)
    }
}

impl<E: EchoPulse, L: LightSensor> SensorSource for ProbeSensor<E, L> {
    fn sample(&mut self) -> Reading {
        let light_level = self.light.level();
        let distance_cm = self.echo.echo().map_or(0.0, echo_to_distance_cm);
        Reading::new(distance_cm, light_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEcho(Option<Duration>);

    impl EchoPulse for FixedEcho {
        fn echo(&mut self) -> Option<Duration> {
            self.0
        }
    }

    struct FixedLight(i32);

    impl LightSensor for FixedLight {
        fn level(&mut self) -> i32 {
            self.0
        }
    }

    #[test]
    fn echo_conversion_halves_then_scales() {
        assert_eq!(echo_to_distance_cm(Duration::ZERO), 0.0);
        // 1000 us round trip -> 500 us one way -> 17.15 cm
        let d = echo_to_distance_cm(Duration::from_micros(1000));
        assert!((d - 17.15).abs() < 1e-4);
    }

    #[test]
    fn odd_pulse_width_truncates() {
        assert_eq!(
            echo_to_distance_cm(Duration::from_micros(583)),
            echo_to_distance_cm(Duration::from_micros(582))
        );
    }

    #[test]
    fn probe_combines_both_sensors() {
        let mut probe = ProbeSensor::new(
            FixedEcho(Some(Duration::from_micros(700))),
            FixedLight(640),
        );
        let reading = probe.sample();

        assert!((reading.distance_cm - 350.0 * SPEED_OF_SOUND_CM_PER_US).abs() < 1e-4);
        assert_eq!(reading.light_level, 640);
    }

    #[test]
    fn missing_echo_reads_as_zero_distance() {
        let mut probe = ProbeSensor::new(FixedEcho(None), FixedLight(10));
        assert_eq!(probe.sample(), Reading::new(0.0, 10));
    }

    #[test]
    fn closures_are_sources() {
        let mut n = 0;
        let mut source = || {
            n += 1;
            Reading::new(n as f32, n)
        };
        assert_eq!(source.sample(), Reading::new(1.0, 1));
        assert_eq!(source.sample(), Reading::new(2.0, 2));
    }
}
