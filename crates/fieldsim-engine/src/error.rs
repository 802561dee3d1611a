//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine, so the
//! startup path can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Settings or device definitions could not be loaded or built.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: fieldsim_core::ConfigError,
    },

    /// The script bridge could not be started.
    #[error("script error: {source}")]
    Script {
        /// The underlying script error.
        #[from]
        source: fieldsim_script::ScriptError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
