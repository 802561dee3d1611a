//! Validated parameter reading for model constructors.

use fieldsim_types::{ParameterError, Parameters};

use crate::error::DeviceError;

/// Typed access to one definition's parameters with errors attributed to
/// the device being built.
#[derive(Debug, Clone, Copy)]
pub struct ParamReader<'a> {
    device: &'a str,
    params: &'a Parameters,
}

impl<'a> ParamReader<'a> {
    /// Reader over `params` for the device called `device`.
    pub const fn new(device: &'a str, params: &'a Parameters) -> Self {
        Self { device, params }
    }

    /// Name of the device being built.
    pub const fn device(&self) -> &'a str {
        self.device
    }

    fn wrap(&self, source: ParameterError) -> DeviceError {
        DeviceError::Parameter {
            device: self.device.to_owned(),
            source,
        }
    }

    /// A finite floating point parameter.
    pub fn float(&self, key: &str, default: f64) -> Result<f64, DeviceError> {
        let value = self.params.float(key, default).map_err(|e| self.wrap(e))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(key, "must be finite"))
        }
    }

    /// A floating point parameter that must be strictly positive.
    pub fn positive(&self, key: &str, default: f64) -> Result<f64, DeviceError> {
        let value = self.float(key, default)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(key, format!("must be greater than zero, got {value}")))
        }
    }

    /// A floating point parameter that must not be negative.
    pub fn non_negative(&self, key: &str, default: f64) -> Result<f64, DeviceError> {
        let value = self.float(key, default)?;
        if value >= 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(key, format!("must not be negative, got {value}")))
        }
    }

    /// A probability in `[0, 1]`.
    pub fn probability(&self, key: &str, default: f64) -> Result<f64, DeviceError> {
        let value = self.float(key, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid(key, format!("must be within [0, 1], got {value}")))
        }
    }

    /// A `(min, max)` pair with `min <= max`.
    pub fn bounds(
        &self,
        min_key: &str,
        min_default: f64,
        max_key: &str,
        max_default: f64,
    ) -> Result<(f64, f64), DeviceError> {
        let min = self.float(min_key, min_default)?;
        let max = self.float(max_key, max_default)?;
        if min <= max {
            Ok((min, max))
        } else {
            Err(self.invalid(
                min_key,
                format!("{min_key} ({min}) exceeds {max_key} ({max})"),
            ))
        }
    }

    /// Optional bounds: both keys present, neither, or an error.
    pub fn optional_bounds(
        &self,
        min_key: &str,
        max_key: &str,
    ) -> Result<Option<(f64, f64)>, DeviceError> {
        match (self.params.contains(min_key), self.params.contains(max_key)) {
            (false, false) => Ok(None),
            (true, true) => self.bounds(min_key, 0.0, max_key, 0.0).map(Some),
            (true, false) => Err(self.invalid(max_key, format!("required when {min_key} is set"))),
            (false, true) => Err(self.invalid(min_key, format!("required when {max_key} is set"))),
        }
    }

    /// An integer parameter narrowed to `i32`.
    pub fn integer(&self, key: &str, default: i32) -> Result<i32, DeviceError> {
        let value = self
            .params
            .integer(key, i64::from(default))
            .map_err(|e| self.wrap(e))?;
        i32::try_from(value).map_err(|e| self.invalid(key, format!("{value} is out of range: {e}")))
    }

    /// A boolean parameter.
    pub fn boolean(&self, key: &str, default: bool) -> Result<bool, DeviceError> {
        self.params.boolean(key, default).map_err(|e| self.wrap(e))
    }

    /// A string parameter.
    pub fn text(&self, key: &str, default: &str) -> Result<String, DeviceError> {
        self.params.text(key, default).map_err(|e| self.wrap(e))
    }

    /// A string parameter naming one of a fixed set of choices.
    pub fn choice<T>(
        &self,
        key: &str,
        default: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, DeviceError> {
        let raw = self.text(key, default)?;
        parse(&raw).ok_or_else(|| self.invalid(key, format!("unknown value `{raw}`")))
    }

    /// An [`DeviceError::InvalidParameter`] for this device.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> DeviceError {
        DeviceError::invalid(self.device, key, reason)
    }
}
