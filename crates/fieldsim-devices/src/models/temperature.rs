//! Sinusoidal temperature with Gaussian noise.

use std::f64::consts::PI;

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;

/// `base + amplitude * sin(2*pi*t / period) + noise`, clamped.
#[derive(Debug)]
pub struct Temperature {
    core: DeviceCore,
    base: f64,
    amplitude: f64,
    period: f64,
    noise_std_dev: f64,
    min: f64,
    max: f64,
}

impl Temperature {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "temperature";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let (min, max) = p.bounds("minValue", 0.0, "maxValue", 100.0)?;
        Ok(Self {
            core: DeviceCore::new(def, seed),
            base: p.float("baseTemp", 25.0)?,
            amplitude: p.float("amplitude", 10.0)?,
            period: p.positive("period", 30.0)?,
            noise_std_dev: p.non_negative("noiseStdDev", 0.5)?,
            min,
            max,
        })
    }
}

impl DeviceModel for Temperature {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let wave = self.amplitude * (2.0 * PI * t / self.period).sin();
        let value = self.base + wave + self.core.gaussian(self.noise_std_dev);
        value.clamp(self.min, self.max)
    }

    fn quiescent_value(&self) -> f64 {
        self.base.clamp(self.min, self.max)
    }

    fn reset_state(&mut self) {}
}
