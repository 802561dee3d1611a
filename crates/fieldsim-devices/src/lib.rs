//! Device models for the fieldsim industrial device simulator.
//!
//! Each configured device becomes one [`DeviceModel`]: a small
//! continuous-time simulation that produces a new value whenever the
//! scheduler advances it. Shared bookkeeping (name, clock, enabled flag,
//! seeded RNG) lives in [`DeviceCore`]; model-specific dynamics live in the
//! types under [`models`].
//!
//! # Modules
//!
//! - [`catalog`] -- [`ModelCatalog`], the explicit constructor table, and
//!   per-device seed resolution.
//! - [`error`] -- [`DeviceError`].
//! - [`model`] -- [`DeviceModel`] and [`DeviceCore`].
//! - [`models`] -- the eleven built-in models.
//! - [`params`] -- validated parameter access for constructors.
//! - [`signal`] -- Gaussian noise, easing, and toggle helpers.

pub mod catalog;
pub mod error;
pub mod model;
pub mod models;
pub mod params;
pub mod signal;

pub use catalog::{Constructor, ModelCatalog, derive_seed, device_seed};
pub use error::DeviceError;
pub use model::{DeviceCore, DeviceModel};
pub use params::ParamReader;
