//! Device definitions as read from the definitions file.
//!
//! The on-disk layout uses camelCase keys (`updateIntervalMs`) and a free-form
//! `parameters` object. Model constructors read parameters through the typed
//! accessors on [`Parameters`]; an absent key yields the model's default, a
//! key of the wrong JSON type is an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter key that pins a device's private random seed.
pub const SEED_PARAMETER: &str = "seed";

/// Default update interval for definitions built in code.
pub const DEFAULT_UPDATE_INTERVAL_MS: i64 = 100;

/// A parameter was present but held a value of the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parameter `{key}` must be {expected}, found `{found}`")]
pub struct ParameterError {
    /// The offending key.
    pub key: String,
    /// Human-readable name of the expected type.
    pub expected: &'static str,
    /// JSON rendering of the value that was found.
    pub found: String,
}

impl ParameterError {
    fn new(key: &str, expected: &'static str, found: &Value) -> Self {
        Self {
            key: key.to_owned(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Free-form model parameters with typed, defaulted access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw access to a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A floating point parameter. Integers are widened.
    pub fn float(&self, key: &str, default: f64) -> Result<f64, ParameterError> {
        self.0.get(key).map_or(Ok(default), |value| {
            value
                .as_f64()
                .ok_or_else(|| ParameterError::new(key, "a number", value))
        })
    }

    /// An integer parameter. Fractional numbers are truncated toward zero.
    pub fn integer(&self, key: &str, default: i64) -> Result<i64, ParameterError> {
        let Some(value) = self.0.get(key) else {
            return Ok(default);
        };
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        // The bounds round to +/-2^63; `as` saturates at the top end.
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let truncated = value
            .as_f64()
            .map(f64::trunc)
            .filter(|f| (i64::MIN as f64..=i64::MAX as f64).contains(f))
            .map(|f| f as i64);
        truncated.ok_or_else(|| ParameterError::new(key, "an integer", value))
    }

    /// A boolean parameter.
    pub fn boolean(&self, key: &str, default: bool) -> Result<bool, ParameterError> {
        self.0.get(key).map_or(Ok(default), |value| {
            value
                .as_bool()
                .ok_or_else(|| ParameterError::new(key, "a boolean", value))
        })
    }

    /// A string parameter.
    pub fn text(&self, key: &str, default: &str) -> Result<String, ParameterError> {
        self.0.get(key).map_or_else(
            || Ok(default.to_owned()),
            |value| {
                value
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| ParameterError::new(key, "a string", value))
            },
        )
    }

    /// The explicit per-device seed, if one was configured.
    ///
    /// Negative integers are accepted and reinterpreted bitwise.
    pub fn seed(&self) -> Result<Option<u64>, ParameterError> {
        let Some(value) = self.0.get(SEED_PARAMETER) else {
            return Ok(None);
        };
        if let Some(u) = value.as_u64() {
            return Ok(Some(u));
        }
        value
            .as_i64()
            .map(|i| Some(u64::from_ne_bytes(i.to_ne_bytes())))
            .ok_or_else(|| ParameterError::new(SEED_PARAMETER, "an integer seed", value))
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

const fn default_enabled() -> bool {
    true
}

/// One configured device: the recipe for a device model and its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDefinition {
    /// Unique device name; also the name of the device's tag.
    pub name: String,
    /// Model type name (`temperature`, `relay`, `servomotor`, ...).
    #[serde(rename = "type")]
    pub device_type: String,
    /// Disabled devices report their quiescent value.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// External address token, e.g. `%DF100`.
    pub address: String,
    /// Advisory per-device update interval.
    #[serde(default)]
    pub update_interval_ms: i64,
    /// Model-specific parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Free text copied onto the tag.
    #[serde(default)]
    pub description: String,
}

impl DeviceDefinition {
    /// An enabled definition with no parameters and the default interval.
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            enabled: true,
            address: address.into(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            parameters: Parameters::new(),
            description: String::new(),
        }
    }

    /// Builder-style parameter insert.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Builder-style enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder-style description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
