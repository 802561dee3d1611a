//! Ramp-hold-ramp pressure cycle.

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::cycle_time;

/// Linear ramp up, hold at maximum, linear ramp down, repeat.
#[derive(Debug)]
pub struct Pressure {
    core: DeviceCore,
    min: f64,
    max: f64,
    ramp_up: f64,
    hold: f64,
    ramp_down: f64,
    noise_std_dev: f64,
}

impl Pressure {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "pressure";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let (min, max) = p.bounds("minPressure", 0.0, "maxPressure", 10.0)?;
        Ok(Self {
            core: DeviceCore::new(def, seed),
            min,
            max,
            ramp_up: p.positive("rampUpTime", 20.0)?,
            hold: p.non_negative("holdTime", 10.0)?,
            ramp_down: p.positive("rampDownTime", 15.0)?,
            noise_std_dev: p.non_negative("noiseStdDev", 0.1)?,
        })
    }

    const fn cycle(&self) -> f64 {
        self.ramp_up + self.hold + self.ramp_down
    }

    fn profile(&self, t: f64) -> f64 {
        let c = cycle_time(t, self.cycle());
        let span = self.max - self.min;
        if c < self.ramp_up {
            span.mul_add(c / self.ramp_up, self.min)
        } else if c < self.ramp_up + self.hold {
            self.max
        } else {
            let into_ramp = c - self.ramp_up - self.hold;
            (-span).mul_add(into_ramp / self.ramp_down, self.max)
        }
    }
}

impl DeviceModel for Pressure {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let value = self.profile(t) + self.core.gaussian(self.noise_std_dev);
        value.clamp(self.min, self.max)
    }

    fn quiescent_value(&self) -> f64 {
        self.min
    }

    fn reset_state(&mut self) {}
}
