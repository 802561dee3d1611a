//! Servo motor: PID velocity loop driving first-order rotor dynamics.

use std::f64::consts::PI;

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::cycle_time;

/// RPM to rad/s.
const RPM_TO_RAD_PER_SEC: f64 = 2.0 * PI / 60.0;

/// Degrees travelled per second at 1 RPM.
const DEGREES_PER_RPM_SECOND: f64 = 6.0;

/// Target velocity profile in automatic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPattern {
    /// `0.7 * max * sin(2*pi*t / period)`.
    Sine,
    /// Triangle 0 -> max -> 0 over each period.
    Ramp,
    /// 0, 50 % and 80 % of max, advancing every period.
    Step,
}

impl ServoPattern {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "sine" => Some(Self::Sine),
            "ramp" => Some(Self::Ramp),
            "step" => Some(Self::Step),
            _ => None,
        }
    }
}

/// Which quantity the servo reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoOutput {
    /// Shaft speed in RPM.
    Velocity,
    /// Shaft angle in degrees, `[0, 360)`.
    Position,
}

impl ServoOutput {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "velocity" => Some(Self::Velocity),
            "position" => Some(Self::Position),
            _ => None,
        }
    }
}

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gains {
    kp: f64,
    ki: f64,
    kd: f64,
}

/// Reports velocity (RPM) or position (degrees).
#[derive(Debug)]
pub struct ServoMotor {
    core: DeviceCore,
    max_velocity: f64,
    max_torque: f64,
    inertia: f64,
    damping: f64,
    load_torque: f64,
    output: ServoOutput,
    auto_mode: bool,
    pattern: ServoPattern,
    auto_period: f64,
    gains: Gains,
    position: f64,
    velocity: f64,
    torque: f64,
    target_velocity: f64,
    integral: f64,
    last_error: f64,
}

impl ServoMotor {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "servomotor";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        Ok(Self {
            core: DeviceCore::new(def, seed),
            max_velocity: p.positive("maxVelocity", 3000.0)?,
            max_torque: p.positive("maxTorque", 10.0)?,
            inertia: p.positive("inertia", 0.001)?,
            damping: p.non_negative("damping", 0.01)?,
            load_torque: p.float("loadTorque", 0.0)?,
            output: p.choice("outputMode", "velocity", ServoOutput::parse)?,
            auto_mode: p.boolean("autoMode", true)?,
            pattern: p.choice("autoPattern", "sine", ServoPattern::parse)?,
            auto_period: p.positive("autoPeriod", 30.0)?,
            gains: Gains {
                kp: p.float("kp", 0.5)?,
                ki: p.non_negative("ki", 0.1)?,
                kd: p.float("kd", 0.01)?,
            },
            position: 0.0,
            velocity: 0.0,
            torque: 0.0,
            target_velocity: 0.0,
            integral: 0.0,
            last_error: 0.0,
        })
    }

    /// Shaft speed in RPM.
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Shaft angle in degrees.
    pub const fn position(&self) -> f64 {
        self.position
    }

    /// Last commanded torque in Nm.
    pub const fn torque(&self) -> f64 {
        self.torque
    }

    /// Current velocity setpoint in RPM.
    pub const fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    const fn output_value(&self) -> f64 {
        match self.output {
            ServoOutput::Velocity => self.velocity,
            ServoOutput::Position => self.position,
        }
    }

    fn auto_target(&self, t: f64) -> f64 {
        match self.pattern {
            ServoPattern::Sine => 0.7 * self.max_velocity * (2.0 * PI * t / self.auto_period).sin(),
            ServoPattern::Ramp => {
                let progress = cycle_time(t, self.auto_period) / self.auto_period;
                if progress < 0.5 {
                    self.max_velocity * progress * 2.0
                } else {
                    self.max_velocity * progress.mul_add(-2.0, 2.0)
                }
            }
            ServoPattern::Step => {
                let index = (t / self.auto_period).floor().rem_euclid(3.0);
                let fraction = if index < 1.0 {
                    0.0
                } else if index < 2.0 {
                    0.5
                } else {
                    0.8
                };
                self.max_velocity * fraction
            }
        }
    }

    fn pid(&mut self, dt: f64) -> f64 {
        let Gains { kp, ki, kd } = self.gains;
        let error = self.target_velocity - self.velocity;

        self.integral = error.mul_add(dt, self.integral);
        if ki > 0.0 {
            let limit = self.max_torque / ki;
            self.integral = self.integral.clamp(-limit, limit);
        }

        let derivative = if dt > 0.0 {
            kd * (error - self.last_error) / dt
        } else {
            0.0
        };
        self.last_error = error;

        kp.mul_add(error, ki.mul_add(self.integral, derivative))
            .clamp(-self.max_torque, self.max_torque)
    }

    fn integrate(&mut self, dt: f64) {
        let net = self.damping.mul_add(-self.velocity, self.torque - self.load_torque);
        let omega = self.velocity.mul_add(RPM_TO_RAD_PER_SEC, net / self.inertia * dt);
        self.velocity = (omega / RPM_TO_RAD_PER_SEC).clamp(-self.max_velocity, self.max_velocity);
        let travelled = (self.velocity * DEGREES_PER_RPM_SECOND).mul_add(dt, self.position);
        self.position = cycle_time(travelled, 360.0);
    }
}

impl DeviceModel for ServoMotor {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, dt: f64) -> f64 {
        if self.auto_mode {
            self.target_velocity = self.auto_target(t);
        }
        self.torque = self.pid(dt);
        self.integrate(dt);
        self.output_value()
    }

    fn quiescent_value(&self) -> f64 {
        self.output_value()
    }

    fn reset_state(&mut self) {
        self.position = 0.0;
        self.velocity = 0.0;
        self.torque = 0.0;
        self.target_velocity = 0.0;
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    fn command(&mut self, value: f64) -> bool {
        if self.auto_mode || !value.is_finite() {
            return false;
        }
        self.target_velocity = value.clamp(-self.max_velocity, self.max_velocity);
        true
    }
}
