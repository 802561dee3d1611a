//! Acoustic noise level in dB following a machinery duty cycle.

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::{cosine_ease, cycle_time};

/// How long a spike stays audible, in seconds.
const SPIKE_DURATION: f64 = 0.3;

/// Spike decay rate in 1/s.
const SPIKE_DECAY_RATE: f64 = 10.0;

/// Power sum of two sound levels in dB.
fn db_sum(a: f64, b: f64) -> f64 {
    10.0 * (10f64.powf(a / 10.0) + 10f64.powf(b / 10.0)).log10()
}

/// Ambient to peak and back with cosine easing; spikes mix in as a power sum.
#[derive(Debug)]
pub struct Noise {
    core: DeviceCore,
    ambient: f64,
    peak: f64,
    cycle_period: f64,
    duty_cycle: f64,
    noise_std_dev: f64,
    spike_prob: f64,
    spike_level: f64,
    min: f64,
    max: f64,
    last_spike: f64,
    spike_active: bool,
}

impl Noise {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "noise";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let duty_cycle = p.float("dutyCycle", 0.6)?;
        if !(duty_cycle > 0.0 && duty_cycle < 1.0) {
            return Err(p.invalid("dutyCycle", format!("must be within (0, 1), got {duty_cycle}")));
        }
        let (min, max) = p.bounds("minValue", 30.0, "maxValue", 120.0)?;
        Ok(Self {
            core: DeviceCore::new(def, seed),
            ambient: p.float("ambientLevel", 55.0)?,
            peak: p.float("peakLevel", 85.0)?,
            cycle_period: p.positive("cyclePeriod", 30.0)?,
            duty_cycle,
            noise_std_dev: p.non_negative("noiseStdDev", 2.0)?,
            spike_prob: p.probability("spikeProb", 0.02)?,
            spike_level: p.float("spikeLevel", 95.0)?,
            min,
            max,
            last_spike: 0.0,
            spike_active: false,
        })
    }

    fn duty_level(&self, t: f64) -> f64 {
        let position = cycle_time(t, self.cycle_period) / self.cycle_period;
        let swing = self.peak - self.ambient;
        if position < self.duty_cycle {
            swing.mul_add(cosine_ease(position / self.duty_cycle), self.ambient)
        } else {
            let progress = (position - self.duty_cycle) / (1.0 - self.duty_cycle);
            (-swing).mul_add(cosine_ease(progress), self.peak)
        }
    }
}

impl DeviceModel for Noise {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let mut level = self.duty_level(t);

        if self.core.chance(self.spike_prob) {
            self.last_spike = t;
            self.spike_active = true;
        }
        if self.spike_active {
            let since = t - self.last_spike;
            if since < SPIKE_DURATION {
                let spike = self.spike_level * (-since * SPIKE_DECAY_RATE).exp();
                level = db_sum(level, spike);
            } else {
                self.spike_active = false;
            }
        }

        if self.noise_std_dev > 0.0 {
            level += self.core.gaussian(self.noise_std_dev);
        }

        level.clamp(self.min, self.max)
    }

    fn quiescent_value(&self) -> f64 {
        self.ambient
    }

    fn reset_state(&mut self) {
        self.last_spike = 0.0;
        self.spike_active = false;
    }
}
