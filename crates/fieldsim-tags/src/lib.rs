//! Typed, concurrency-safe tag store for the fieldsim simulator.
//!
//! The store maps tag names to typed values and is the single source of truth
//! shared by the simulation scheduler, the script bridge, and any protocol
//! adaptor. Writes are coerced into each tag's fixed kind or rejected.
//!
//! # Modules
//!
//! - [`error`] -- [`TagError`].
//! - [`store`] -- [`TagStore`], snapshots, and the [`TagAccess`] adaptor
//!   surface.

pub mod error;
pub mod store;

pub use error::TagError;
pub use store::{Tag, TagAccess, TagSnapshot, TagStore, TagSummary};
