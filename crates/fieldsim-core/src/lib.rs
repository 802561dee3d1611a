//! Configuration loading and the simulation scheduler for fieldsim.
//!
//! This crate turns a settings file and a device definitions file into a
//! running simulation: definitions are validated, the tag store and device
//! models are built, and the [`SimulationScheduler`] advances every model on
//! a fixed interval, committing results to the shared store.
//!
//! # Modules
//!
//! - [`config`] -- [`SimulatorConfig`], definition loading and validation,
//!   and [`build_simulation`].
//! - [`control`] -- [`TaskControl`], the stop flag shared by periodic tasks.
//! - [`scheduler`] -- [`SimulationScheduler`] and [`TickReport`].

pub mod config;
pub mod control;
pub mod scheduler;

pub use config::{
    ConfigError, DefinitionFormat, LogFormat, Simulation, SimulatorConfig, ValidationError,
    build_simulation, load_definitions, parse_definitions, validate_definitions,
};
pub use control::TaskControl;
pub use scheduler::{SchedulerError, SimulationScheduler, TickReport};
