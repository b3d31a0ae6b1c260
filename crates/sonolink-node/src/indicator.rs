/// Which of the three indicator LEDs is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedZone {
    /// Closer than the lower threshold.
    Near,
    /// Strictly between the two thresholds.
    Mid,
    /// Farther than the upper threshold.
    Far,
    /// Exactly on a threshold, or not a number. All LEDs off.
    Off,
}

impl LedZone {
    pub fn as_str(self) -> &'static str {
        match self {
            LedZone::Near => "near",
            LedZone::Mid => "mid",
            LedZone::Far => "far",
            LedZone::Off => "off",
        }
    }

    /// LED states in board order: near, mid, far.
    pub fn leds(self) -> [bool; 3] {
        match self {
            LedZone::Near => [true, false, false],
            LedZone::Mid => [false, true, false],
            LedZone::Far => [false, false, true],
            LedZone::Off => [false, false, false],
        }
    }
}

/// Distance thresholds between the LED zones, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub lower_cm: f32,
    pub upper_cm: f32,
}

impl Thresholds {
    pub fn classify(&self, distance_cm: f32) -> LedZone {
        if distance_cm < self.lower_cm {
            LedZone::Near
        } else if distance_cm > self.lower_cm && distance_cm < self.upper_cm {
            LedZone::Mid
        } else if distance_cm > self.upper_cm {
            LedZone::Far
        } else {
            LedZone::Off
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            lower_cm: 10.0,
            upper_cm: 15.0,
        }
    }
}

/// Something that can show the current zone (LEDs on a board, a log line).
pub trait Indicator {
    fn show(&mut self, zone: LedZone);
}
