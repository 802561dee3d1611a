//! Error types for the script bridge.

use std::path::PathBuf;

use crate::bridge::BridgeState;

/// Errors raised by the script bridge.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("failed to read script {}: {source}", path.display())]
    Read {
        /// The script path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The script failed to compile or its top-level chunk raised an error.
    #[error("failed to load script {name}: {source}")]
    Load {
        /// Chunk name (file path or inline name).
        name: String,
        /// The interpreter error.
        #[source]
        source: mlua::Error,
    },

    /// The script does not define a `run_logic` function.
    #[error("script {name} must define a run_logic() function")]
    MissingEntryPoint {
        /// Chunk name (file path or inline name).
        name: String,
    },

    /// A scan failed while running script code.
    #[error("script runtime error: {source}")]
    Runtime {
        /// The interpreter error.
        #[source]
        source: mlua::Error,
    },

    /// The operation is not allowed in the bridge's current state.
    #[error("cannot {operation} while the bridge is {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// State at the time.
        state: BridgeState,
    },
}
