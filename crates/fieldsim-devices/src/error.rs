//! Error types for the `fieldsim-devices` crate.

use fieldsim_types::ParameterError;

/// Errors raised while building device models from definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// No constructor is registered for this type name.
    #[error("unknown device type `{device_type}` for device {device}")]
    UnknownType {
        /// The device being built.
        device: String,
        /// The unregistered type name.
        device_type: String,
    },

    /// A parameter has the right type but an unusable value.
    #[error("device {device}: invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        /// The device being built.
        device: String,
        /// The offending parameter key.
        parameter: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A parameter has the wrong JSON type.
    #[error("device {device}: {source}")]
    Parameter {
        /// The device being built.
        device: String,
        /// The typed-access failure.
        #[source]
        source: ParameterError,
    },
}

impl DeviceError {
    /// Shorthand for [`DeviceError::InvalidParameter`].
    pub fn invalid(device: &str, parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            device: device.to_owned(),
            parameter: parameter.to_owned(),
            reason: reason.into(),
        }
    }
}
