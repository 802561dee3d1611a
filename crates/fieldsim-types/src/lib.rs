//! Shared value types for the fieldsim industrial device simulator.
//!
//! Everything that more than one fieldsim crate needs to agree on lives here:
//! the closed set of tag kinds and values with their coercion rules, and the
//! device definitions that seed both the tag store and the device models.
//!
//! # Modules
//!
//! - [`value`] -- [`TagKind`], [`TagValue`], kind-directed coercion, and the
//!   address-prefix to kind mapping.
//! - [`definition`] -- [`DeviceDefinition`] and typed [`Parameters`] access.

pub mod definition;
pub mod value;

pub use definition::{DeviceDefinition, ParameterError, Parameters, SEED_PARAMETER};
pub use value::{CoercionError, TagKind, TagValue};
