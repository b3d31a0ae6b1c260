//! Sensor-node side of the sonolink telemetry link.
//!
//! A node samples an ultrasonic range finder and a photocell on a fixed
//! interval, sends each sample as a frame, and drives three indicator LEDs
//! from the measured distance. Hardware access sits behind small traits
//! ([`EchoPulse`], [`LightSensor`], [`Indicator`]) so the same loop runs on a
//! board, against a simulator, or in tests.

pub mod error;
pub mod indicator;
pub mod node;
pub mod sim;
pub mod source;
pub mod timer;

pub use error::{NodeError, Result};
pub use indicator::{Indicator, LedZone, Thresholds};
pub use node::SensorNode;
pub use sim::SimulatedSensor;
pub use source::{echo_to_distance_cm, EchoPulse, LightSensor, ProbeSensor, SensorSource};
pub use timer::{SampleTimer, DEFAULT_SAMPLE_INTERVAL};
