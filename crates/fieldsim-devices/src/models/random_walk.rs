//! Bounded random walk.

use fieldsim_types::DeviceDefinition;
use rand::Rng;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;

/// Each step moves by at most `change_rate * dt` in either direction.
/// There is no pull back toward the middle; the walk only stops at the
/// bounds.
#[derive(Debug)]
pub struct RandomWalk {
    core: DeviceCore,
    min: f64,
    max: f64,
    change_rate: f64,
    value: f64,
}

impl RandomWalk {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "random";

    /// Build from a definition. The starting point is drawn from the
    /// model's own RNG.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let (min, max) = p.bounds("minValue", 0.0, "maxValue", 100.0)?;
        let mut model = Self {
            core: DeviceCore::new(def, seed),
            min,
            max,
            change_rate: p.non_negative("changeRate", 1.0)?,
            value: min,
        };
        model.value = model.initial_value();
        Ok(model)
    }

    fn initial_value(&mut self) -> f64 {
        let span = self.max - self.min;
        self.core.rng().random::<f64>().mul_add(span, self.min)
    }
}

impl DeviceModel for RandomWalk {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, _t: f64, dt: f64) -> f64 {
        let direction = self.core.rng().random::<f64>().mul_add(2.0, -1.0);
        self.value = (direction * self.change_rate)
            .mul_add(dt, self.value)
            .clamp(self.min, self.max);
        self.value
    }

    fn quiescent_value(&self) -> f64 {
        self.value
    }

    fn reset_state(&mut self) {
        self.value = self.initial_value();
    }
}
