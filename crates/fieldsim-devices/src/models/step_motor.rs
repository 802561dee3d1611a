//! Stepper motor position under a trapezoidal motion profile.

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::cycle_time;

/// Position error treated as "arrived", in steps.
const POSITION_DEADBAND: f64 = 0.01;

/// Target trajectory in automatic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPattern {
    /// Triangle 0 -> one revolution -> 0 over each period.
    Oscillate,
    /// Continuous rotation, one revolution per period.
    Rotate,
    /// Quarter-turn positions, advancing every period.
    Step,
}

impl StepPattern {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "oscillate" => Some(Self::Oscillate),
            "rotate" => Some(Self::Rotate),
            "step" => Some(Self::Step),
            _ => None,
        }
    }
}

/// Reports position in steps.
#[derive(Debug)]
pub struct StepMotor {
    core: DeviceCore,
    max_speed: f64,
    acceleration: f64,
    steps_per_rev: f64,
    auto_mode: bool,
    pattern: StepPattern,
    auto_period: f64,
    position: f64,
    velocity: f64,
    target: f64,
}

impl StepMotor {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "stepmotor";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let steps_per_rev = p.integer("stepsPerRev", 200)?;
        if steps_per_rev <= 0 {
            return Err(p.invalid("stepsPerRev", format!("must be positive, got {steps_per_rev}")));
        }
        Ok(Self {
            core: DeviceCore::new(def, seed),
            max_speed: p.positive("maxSpeed", 1000.0)?,
            acceleration: p.positive("acceleration", 5000.0)?,
            steps_per_rev: f64::from(steps_per_rev),
            auto_mode: p.boolean("autoMode", true)?,
            pattern: p.choice("autoPattern", "oscillate", StepPattern::parse)?,
            auto_period: p.positive("autoPeriod", 20.0)?,
            position: 0.0,
            velocity: 0.0,
            target: 0.0,
        })
    }

    /// Current velocity in steps per second.
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Current target position in steps.
    pub const fn target(&self) -> f64 {
        self.target
    }

    fn auto_target(&self, t: f64) -> f64 {
        match self.pattern {
            StepPattern::Oscillate => {
                let progress = cycle_time(t, self.auto_period) / self.auto_period;
                if progress < 0.5 {
                    self.steps_per_rev * progress * 2.0
                } else {
                    self.steps_per_rev * progress.mul_add(-2.0, 2.0)
                }
            }
            StepPattern::Rotate => t * self.steps_per_rev / self.auto_period,
            StepPattern::Step => {
                let quarter = (t / self.auto_period).floor().rem_euclid(4.0);
                self.steps_per_rev * quarter / 4.0
            }
        }
    }

    fn desired_velocity(&self) -> f64 {
        let error = self.target - self.position;
        if error.abs() < POSITION_DEADBAND {
            return 0.0;
        }
        let direction = error.signum();
        let braking_distance = self.velocity * self.velocity / (2.0 * self.acceleration);
        if error.abs() <= braking_distance {
            direction * (2.0 * self.acceleration * error.abs()).sqrt()
        } else {
            direction * self.max_speed
        }
    }
}

impl DeviceModel for StepMotor {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, dt: f64) -> f64 {
        if self.auto_mode {
            self.target = self.auto_target(t);
        }

        let desired = self.desired_velocity();
        let max_change = self.acceleration * dt;
        let change = (desired - self.velocity).clamp(-max_change, max_change);
        self.velocity = (self.velocity + change).clamp(-self.max_speed, self.max_speed);
        self.position = self.velocity.mul_add(dt, self.position);

        if self.auto_mode && self.pattern == StepPattern::Rotate {
            self.position = cycle_time(self.position, self.steps_per_rev);
        }
        self.position
    }

    fn quiescent_value(&self) -> f64 {
        self.position
    }

    fn reset_state(&mut self) {
        self.position = 0.0;
        self.velocity = 0.0;
        self.target = 0.0;
    }

    fn command(&mut self, value: f64) -> bool {
        if self.auto_mode || !value.is_finite() {
            return false;
        }
        self.target = value;
        true
    }
}
