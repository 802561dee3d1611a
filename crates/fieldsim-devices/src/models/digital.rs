//! Digital input patterns.

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::{Toggle, cycle_time};

/// Period of the alarm blink in seconds; on for the first half.
const ALARM_CYCLE: f64 = 1.0;

/// Digital signal shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalPattern {
    /// Flip every toggle period.
    Toggle,
    /// High for `pulse_width` at the start of every pulse period.
    Pulse,
    /// Independent Bernoulli draw each tick.
    Random,
    /// Fast 1 Hz blink.
    Alarm,
}

impl DigitalPattern {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "toggle" => Some(Self::Toggle),
            "pulse" => Some(Self::Pulse),
            "random" => Some(Self::Random),
            "alarm" => Some(Self::Alarm),
            _ => None,
        }
    }
}

/// Boolean input reported as `1.0` / `0.0`.
#[derive(Debug)]
pub struct Digital {
    core: DeviceCore,
    pattern: DigitalPattern,
    toggle: Toggle,
    pulse_width: f64,
    pulse_period: f64,
    random_prob: f64,
    state: bool,
}

impl Digital {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "digital";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        Ok(Self {
            core: DeviceCore::new(def, seed),
            pattern: p.choice("pattern", "toggle", DigitalPattern::parse)?,
            toggle: Toggle::new(false, p.positive("togglePeriod", 5.0)?),
            pulse_width: p.non_negative("pulseWidth", 1.0)?,
            pulse_period: p.positive("pulsePeriod", 5.0)?,
            random_prob: p.probability("randomProb", 0.5)?,
            state: false,
        })
    }
}

impl DeviceModel for Digital {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        self.state = match self.pattern {
            DigitalPattern::Toggle => self.toggle.advance(t),
            DigitalPattern::Pulse => cycle_time(t, self.pulse_period) < self.pulse_width,
            DigitalPattern::Random => self.core.chance(self.random_prob),
            DigitalPattern::Alarm => cycle_time(t, ALARM_CYCLE) < ALARM_CYCLE / 2.0,
        };
        if self.state { 1.0 } else { 0.0 }
    }

    fn quiescent_value(&self) -> f64 {
        0.0
    }

    fn reset_state(&mut self) {
        self.toggle.reset(false);
        self.state = false;
    }
}
