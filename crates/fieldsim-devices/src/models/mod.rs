//! The built-in device models, one module per type.

pub mod digital;
pub mod integer_actuator;
pub mod noise;
pub mod pressure;
pub mod random_walk;
pub mod relay;
pub mod servo_motor;
pub mod sine;
pub mod step_motor;
pub mod temperature;
pub mod vibration;

pub use digital::{Digital, DigitalPattern};
pub use integer_actuator::{IntegerActuator, IntegerPattern};
pub use noise::Noise;
pub use pressure::Pressure;
pub use random_walk::RandomWalk;
pub use relay::Relay;
pub use servo_motor::{ServoMotor, ServoOutput, ServoPattern};
pub use sine::Sine;
pub use step_motor::{StepMotor, StepPattern};
pub use temperature::Temperature;
pub use vibration::Vibration;
