//! Lua logic bridge for the fieldsim simulator.
//!
//! A [`ScriptBridge`] loads a Lua script, mirrors every tag into a global
//! table, and calls the script's `run_logic()` on its own scan interval,
//! writing the table back into the tag store after each scan.
//!
//! # Modules
//!
//! - [`bridge`] -- [`ScriptBridge`], its lifecycle, and the host functions.
//! - [`error`] -- [`ScriptError`].
//! - [`template`] -- [`render_template`] for generating a starter script.

pub mod bridge;
pub mod error;
pub mod template;

pub use bridge::{BridgeContext, BridgeState, ScanReport, ScriptBridge, ScriptSource};
pub use error::ScriptError;
pub use template::{render_template, write_template_if_missing};
