//! Analog sensor to background bed balance

use serde::Serialize;
use tracing::trace;

use crate::sensor::AnalogReader;
use crate::slot::Side;

/// Complementary gains for the two halves of the bed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Blend {
    pub a: f32,
    pub b: f32,
}

impl Blend {
    /// Linear fade position from a raw reading. Readings above `sensor_max`
    /// clamp to full A.
    pub fn from_raw(raw: u16, sensor_max: u16) -> Self {
        let a = if sensor_max == 0 {
            1.0
        } else {
            (raw as f32 / sensor_max as f32).clamp(0.0, 1.0)
        };
        Self { a, b: 1.0 - a }
    }

    pub fn gain(&self, side: Side) -> f32 {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }
}

impl Default for Blend {
    fn default() -> Self {
        Self { a: 0.5, b: 0.5 }
    }
}

pub struct CrossfadeController {
    reader: AnalogReader,
    sensor_max: u16,
    last: Option<Blend>,
}

impl CrossfadeController {
    pub fn new(reader: AnalogReader, sensor_max: u16) -> Self {
        Self {
            reader,
            sensor_max,
            last: None,
        }
    }

    /// Read the sensor once and compute the blend
    pub fn sample(&mut self) -> Blend {
        let raw = self.reader.read();
        let blend = Blend::from_raw(raw, self.sensor_max);
        trace!(raw, a = blend.a, b = blend.b, "crossfade sample");
        self.last = Some(blend);
        blend
    }

    /// Most recent blend, if the sensor has been sampled
    pub fn last(&self) -> Option<Blend> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SharedDial;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_from_raw_reference_points() {
        let mid = Blend::from_raw(481, 962);
        assert!((mid.a - 0.5).abs() < 0.002);
        assert!((mid.b - 0.5).abs() < 0.002);

        assert_eq!(Blend::from_raw(962, 962), Blend { a: 1.0, b: 0.0 });
        assert_eq!(Blend::from_raw(0, 962), Blend { a: 0.0, b: 1.0 });
    }

    #[test]
    fn test_from_raw_clamps_high() {
        assert_eq!(Blend::from_raw(1024, 962), Blend { a: 1.0, b: 0.0 });
        assert_eq!(Blend::from_raw(u16::MAX, 962).a, 1.0);
    }

    #[test]
    fn test_blend_sums_to_one() {
        for raw in (0..=1024).step_by(7) {
            let blend = Blend::from_raw(raw, 962);
            assert!((blend.a + blend.b - 1.0).abs() < EPS, "raw {}", raw);
        }
    }

    #[test]
    fn test_controller_samples_sensor() {
        let dial = SharedDial::new(962);
        let reader = AnalogReader::new(Box::new(dial.clone()), 512);
        let mut crossfade = CrossfadeController::new(reader, 962);
        assert_eq!(crossfade.last(), None);

        assert_eq!(crossfade.sample().a, 1.0);
        dial.set(0);
        let blend = crossfade.sample();
        assert_eq!(blend.b, 1.0);
        assert_eq!(crossfade.last(), Some(blend));
    }
}
