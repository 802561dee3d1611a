//! Machine vibration: harmonic series plus decaying impact spikes.

use std::f64::consts::PI;

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;

/// Spike envelope below which the impulse is dropped.
const SPIKE_CUTOFF: f64 = 0.01;

/// Spike decay rate in 1/s.
const SPIKE_DECAY_RATE: f64 = 5.0;

/// `base + sum(amplitude/i * sin(2*pi*i*f*t))` with linear spike addition.
#[derive(Debug)]
pub struct Vibration {
    core: DeviceCore,
    base: f64,
    amplitude: f64,
    frequency: f64,
    harmonics: u32,
    spike_prob: f64,
    spike_amp: f64,
    noise_std_dev: f64,
    min: f64,
    max: f64,
    last_spike: f64,
    spike_level: f64,
}

impl Vibration {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "vibration";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let harmonics = p.integer("harmonics", 3)?;
        let harmonics = u32::try_from(harmonics)
            .map_err(|e| p.invalid("harmonics", format!("must not be negative, got {harmonics}: {e}")))?;
        let (min, max) = p.bounds("minValue", 0.0, "maxValue", 50.0)?;
        Ok(Self {
            core: DeviceCore::new(def, seed),
            base: p.float("baseLevel", 2.0)?,
            amplitude: p.float("amplitude", 1.0)?,
            frequency: p.float("frequency", 50.0)?,
            harmonics,
            spike_prob: p.probability("spikeProb", 0.01)?,
            spike_amp: p.float("spikeAmp", 5.0)?,
            noise_std_dev: p.non_negative("noiseStdDev", 0.2)?,
            min,
            max,
            last_spike: 0.0,
            spike_level: 0.0,
        })
    }

    fn harmonic_sum(&self, t: f64) -> f64 {
        (1..=self.harmonics)
            .map(f64::from)
            .map(|i| self.amplitude / i * (2.0 * PI * i * self.frequency * t).sin())
            .sum()
    }
}

impl DeviceModel for Vibration {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let mut value = self.base + self.harmonic_sum(t);

        if self.core.chance(self.spike_prob) {
            self.last_spike = t;
            self.spike_level = self.spike_amp;
        }
        if self.spike_level > SPIKE_CUTOFF {
            self.spike_level = self.spike_amp * (-(t - self.last_spike) * SPIKE_DECAY_RATE).exp();
            value += self.spike_level;
        }

        if self.noise_std_dev > 0.0 {
            value += self.core.gaussian(self.noise_std_dev);
        }

        value.max(0.0).clamp(self.min, self.max)
    }

    fn quiescent_value(&self) -> f64 {
        0.0
    }

    fn reset_state(&mut self) {
        self.last_spike = 0.0;
        self.spike_level = 0.0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn quiet() -> DeviceDefinition {
        DeviceDefinition::new("V1", "vibration", "%DF6")
            .with_parameter("spikeProb", 0.0)
            .with_parameter("noiseStdDev", 0.0)
    }

    #[test]
    fn harmonics_shrink_with_order() {
        let def = quiet()
            .with_parameter("frequency", 1.0)
            .with_parameter("harmonics", 1)
            .with_parameter("baseLevel", 10.0)
            .with_parameter("amplitude", 4.0);
        let mut model = Vibration::from_definition(&def, 1).unwrap();
        let v = model.update(Duration::from_millis(250));
        assert!((v - 14.0).abs() < 1e-9, "{v}");
    }

    #[test]
    fn spike_adds_then_decays() {
        let def = quiet()
            .with_parameter("spikeProb", 1.0)
            .with_parameter("amplitude", 0.0)
            .with_parameter("spikeAmp", 5.0);
        let mut model = Vibration::from_definition(&def, 1).unwrap();
        // Every tick retriggers, so the full spike is added each time.
        assert!((model.update(Duration::from_millis(100)) - 7.0).abs() < 1e-9);

        model.spike_prob = 0.0;
        let later = model.update(Duration::from_millis(200));
        let expected = 2.0 + 5.0 * (-0.2_f64 * 5.0).exp();
        assert!((later - expected).abs() < 1e-9, "{later} vs {expected}");
    }

    #[test]
    fn never_negative_and_clamped() {
        let def = DeviceDefinition::new("V1", "vibration", "%DF6")
            .with_parameter("baseLevel", 0.0)
            .with_parameter("amplitude", 30.0)
            .with_parameter("spikeProb", 0.2)
            .with_parameter("spikeAmp", 100.0)
            .with_parameter("noiseStdDev", 3.0);
        let mut model = Vibration::from_definition(&def, 21).unwrap();
        for _ in 0..2000 {
            let v = model.update(Duration::from_millis(7));
            assert!((0.0..=50.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn negative_harmonics_rejected() {
        let def = quiet().with_parameter("harmonics", -1);
        assert!(Vibration::from_definition(&def, 0).is_err());
    }
}
