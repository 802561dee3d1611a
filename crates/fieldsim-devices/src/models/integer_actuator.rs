//! Integer setpoint actuator with manual and automatic modes.

use std::f64::consts::PI;

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::cycle_time;

/// Automatic waveform of an [`IntegerActuator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerPattern {
    /// Triangle between min and max at `ramp_rate` units per second.
    Ramp,
    /// Sine around the midpoint with period `step_period`.
    Sine,
    /// Square wave: max for one step period, min for the next.
    Step,
}

impl IntegerPattern {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ramp" => Some(Self::Ramp),
            "sine" => Some(Self::Sine),
            "step" => Some(Self::Step),
            _ => None,
        }
    }
}

/// An integer output clamped to `[min, max]`.
#[derive(Debug)]
pub struct IntegerActuator {
    core: DeviceCore,
    min: i32,
    max: i32,
    default_value: i32,
    auto_mode: bool,
    pattern: IntegerPattern,
    ramp_rate: f64,
    step_period: f64,
    value: i32,
}

impl IntegerActuator {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "integer";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let min = p.integer("minValue", 0)?;
        let max = p.integer("maxValue", 100)?;
        if min > max {
            return Err(p.invalid("minValue", format!("minValue ({min}) exceeds maxValue ({max})")));
        }
        let auto_mode = p.boolean("autoMode", false)?;
        let pattern = p.choice("autoPattern", "ramp", IntegerPattern::parse)?;
        if auto_mode && pattern == IntegerPattern::Ramp && min == max {
            return Err(p.invalid("maxValue", "ramp needs maxValue above minValue"));
        }
        let default_value = p.integer("defaultValue", 0)?.clamp(min, max);
        Ok(Self {
            core: DeviceCore::new(def, seed),
            min,
            max,
            default_value,
            auto_mode,
            pattern,
            ramp_rate: p.positive("rampRate", 1.0)?,
            step_period: p.positive("stepPeriod", 10.0)?,
            value: default_value,
        })
    }

    /// Waveform value at `t`, worked in `f64` so wide ranges cannot
    /// overflow.
    fn auto_value(&self, t: f64) -> i32 {
        let (min, max) = (f64::from(self.min), f64::from(self.max));
        let value = match self.pattern {
            IntegerPattern::Ramp => {
                let span = max - min;
                let ramp_period = span / self.ramp_rate;
                let c = cycle_time(t, 2.0 * ramp_period);
                if c < ramp_period {
                    min + (span * (c / ramp_period)).trunc()
                } else {
                    max - (span * ((c - ramp_period) / ramp_period)).trunc()
                }
            }
            IntegerPattern::Sine => {
                // Whole-number midpoint and half-span.
                let mid = ((max + min) / 2.0).trunc();
                let amplitude = ((max - min) / 2.0).trunc();
                let wave = (2.0 * PI * t / self.step_period).sin();
                amplitude.mul_add(wave, mid).trunc()
            }
            IntegerPattern::Step => {
                if cycle_time(t, 2.0 * self.step_period) < self.step_period {
                    max
                } else {
                    min
                }
            }
        };
        self.setpoint(value)
    }

    /// Narrow an integral `value` into the configured range.
    #[allow(clippy::cast_possible_truncation)]
    fn setpoint(&self, value: f64) -> i32 {
        value.clamp(f64::from(self.min), f64::from(self.max)) as i32
    }

    /// Current output.
    pub const fn value(&self) -> i32 {
        self.value
    }
}

impl DeviceModel for IntegerActuator {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        if self.auto_mode {
            self.value = self.auto_value(t);
        }
        self.value = self.value.clamp(self.min, self.max);
        f64::from(self.value)
    }

    fn quiescent_value(&self) -> f64 {
        f64::from(self.default_value)
    }

    fn reset_state(&mut self) {
        self.value = self.default_value;
    }

    fn command(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.value = self.setpoint(value.trunc());
        true
    }

    fn follows_tag_commands(&self) -> bool {
        !self.auto_mode
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn auto(pattern: &str) -> DeviceDefinition {
        DeviceDefinition::new("A1", "integer", "%DW1")
            .with_parameter("autoMode", true)
            .with_parameter("autoPattern", pattern)
            .with_parameter("rampRate", 10.0)
    }

    #[test]
    fn ramp_up_and_back_down() {
        let mut model = IntegerActuator::from_definition(&auto("ramp"), 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(5)), 50.0);
        assert_eq!(model.update(Duration::from_secs(10)), 50.0);
        assert_eq!(model.update(Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn step_pattern_alternates() {
        let def = auto("step").with_parameter("stepPeriod", 2.0);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(1)), 100.0);
        assert_eq!(model.update(Duration::from_secs(2)), 0.0);
        assert_eq!(model.update(Duration::from_secs(2)), 100.0);
    }

    #[test]
    fn sine_pattern_truncates() {
        let def = auto("sine").with_parameter("stepPeriod", 4.0);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(1)), 100.0);
        assert_eq!(model.update(Duration::from_secs(2)), 0.0);
    }

    #[test]
    fn sine_pattern_spans_the_full_integer_range() {
        let def = auto("sine")
            .with_parameter("minValue", i32::MIN)
            .with_parameter("maxValue", i32::MAX)
            .with_parameter("stepPeriod", 4.0);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(1)), f64::from(i32::MAX));
        assert_eq!(model.update(Duration::from_secs(2)), f64::from(-i32::MAX));

        let def = auto("sine")
            .with_parameter("minValue", 1)
            .with_parameter("maxValue", i32::MAX)
            .with_parameter("stepPeriod", 4.0);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(1)), f64::from(i32::MAX));
        assert_eq!(model.update(Duration::from_secs(2)), 1.0);
    }

    #[test]
    fn ramp_over_the_full_integer_range_stays_in_bounds() {
        let def = auto("ramp")
            .with_parameter("minValue", i32::MIN)
            .with_parameter("maxValue", i32::MAX)
            .with_parameter("rampRate", 1.0e8);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        for _ in 0..200 {
            let v = model.update(Duration::from_millis(700));
            assert!((f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&v), "{v}");
        }
    }

    #[test]
    fn manual_commands_are_clamped() {
        let def = DeviceDefinition::new("A1", "integer", "%DW1")
            .with_parameter("minValue", 10)
            .with_parameter("maxValue", 20)
            .with_parameter("defaultValue", 15);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert!(model.follows_tag_commands());
        assert_eq!(model.update(Duration::from_millis(100)), 15.0);

        assert!(model.command(99.0));
        assert_eq!(model.update(Duration::from_millis(100)), 20.0);
        assert!(model.command(-4.0));
        assert_eq!(model.update(Duration::from_millis(100)), 10.0);
        assert!(!model.command(f64::NAN));

        model.reset();
        assert_eq!(model.value(), 15);
    }

    #[test]
    fn default_outside_range_is_clamped() {
        let def = DeviceDefinition::new("A1", "integer", "%DW1")
            .with_parameter("minValue", 10)
            .with_parameter("maxValue", 20);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_millis(100)), 10.0);

        let def = auto("ramp")
            .with_parameter("minValue", 10)
            .with_parameter("maxValue", 20)
            .with_parameter("defaultValue", 50)
            .with_enabled(false);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.quiescent_value(), 20.0);
        assert_eq!(model.update(Duration::from_millis(100)), 20.0);
    }

    #[test]
    fn disabled_reports_default() {
        let def = auto("ramp").with_parameter("defaultValue", 7).with_enabled(false);
        let mut model = IntegerActuator::from_definition(&def, 0).unwrap();
        assert_eq!(model.update(Duration::from_secs(5)), 7.0);
        assert_eq!(model.elapsed(), 0.0);
    }

    #[test]
    fn invalid_ranges_rejected() {
        let def = DeviceDefinition::new("A1", "integer", "%DW1")
            .with_parameter("minValue", 5)
            .with_parameter("maxValue", 1);
        assert!(IntegerActuator::from_definition(&def, 0).is_err());

        let def = auto("ramp").with_parameter("maxValue", 0);
        assert!(IntegerActuator::from_definition(&def, 0).is_err());

        let def = auto("wobble");
        assert!(IntegerActuator::from_definition(&def, 0).is_err());
    }
}
