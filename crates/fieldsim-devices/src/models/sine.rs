//! Plain sine wave with optional noise and bounds.

use std::f64::consts::PI;

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;

/// `offset + amplitude * sin(2*pi*f*t + phase)`.
#[derive(Debug)]
pub struct Sine {
    core: DeviceCore,
    offset: f64,
    amplitude: f64,
    frequency: f64,
    phase: f64,
    noise_std_dev: f64,
    bounds: Option<(f64, f64)>,
}

impl Sine {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "sine";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        Ok(Self {
            core: DeviceCore::new(def, seed),
            offset: p.float("offset", 0.0)?,
            amplitude: p.float("amplitude", 1.0)?,
            frequency: p.float("frequency", 1.0)?,
            phase: p.float("phase", 0.0)?,
            noise_std_dev: p.non_negative("noiseStdDev", 0.0)?,
            bounds: p.optional_bounds("minValue", "maxValue")?,
        })
    }
}

impl DeviceModel for Sine {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let angle = (2.0 * PI * self.frequency).mul_add(t, self.phase);
        let mut value = self.amplitude.mul_add(angle.sin(), self.offset);
        if self.noise_std_dev > 0.0 {
            value += self.core.gaussian(self.noise_std_dev);
        }
        self.bounds.map_or(value, |(min, max)| value.clamp(min, max))
    }

    fn quiescent_value(&self) -> f64 {
        self.offset
    }

    fn reset_state(&mut self) {}
}
