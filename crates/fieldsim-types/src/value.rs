//! Tag kinds, tag values, and the coercion rules between them.
//!
//! Every tag has a [`TagKind`] fixed at creation. Writers hand the store a
//! [`TagValue`] of whatever variant they have at hand; [`TagValue::coerce`]
//! converts it into the tag's kind or rejects it. The rules are:
//!
//! | target    | accepts                                  |
//! |-----------|------------------------------------------|
//! | `Float`   | `Float`, `Integer` (widened)             |
//! | `Integer` | `Integer`, `Float` (truncated to zero)   |
//! | `Boolean` | `Boolean`, `Float`/`Integer` (nonzero)   |
//! | `Text`    | anything, via canonical formatting       |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address prefix for double-float data words (analog sensors and motors).
pub const FLOAT_ADDRESS_PREFIX: &str = "%DF";

/// Address prefix for memory bits (digital inputs and relays).
pub const BOOL_ADDRESS_PREFIX: &str = "%MW";

/// Address prefix for integer data words (integer actuators).
pub const INTEGER_ADDRESS_PREFIX: &str = "%DW";

/// The data type of a tag. Fixed when the tag is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// 64-bit floating point.
    Float,
    /// 32-bit signed integer.
    Integer,
    /// Single bit.
    Boolean,
    /// UTF-8 string.
    Text,
}

impl TagKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 4] = [Self::Float, Self::Integer, Self::Boolean, Self::Text];

    /// Derive the kind of a tag from its external address.
    ///
    /// The address prefix wins (`%DF` float, `%MW` bit, `%DW` integer word).
    /// Addresses without a known prefix fall back on the device type name.
    pub fn from_address(address: &str, device_type: &str) -> Self {
        if address.starts_with(FLOAT_ADDRESS_PREFIX) {
            return Self::Float;
        }
        if address.starts_with(BOOL_ADDRESS_PREFIX) {
            return Self::Boolean;
        }
        if address.starts_with(INTEGER_ADDRESS_PREFIX) {
            return Self::Integer;
        }

        match device_type {
            "digital" | "relay" => Self::Boolean,
            "integer" => Self::Integer,
            _ => Self::Float,
        }
    }

    /// The value a freshly created tag of this kind holds.
    pub const fn default_value(self) -> TagValue {
        match self {
            Self::Float => TagValue::Float(0.0),
            Self::Integer => TagValue::Integer(0),
            Self::Boolean => TagValue::Boolean(false),
            Self::Text => TagValue::Text(String::new()),
        }
    }

    /// Short human-readable label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "Float",
            Self::Integer => "Integer",
            Self::Boolean => "Boolean",
            Self::Text => "Text",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that was rejected by [`TagValue::coerce`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot coerce {found} value `{value}` into {expected}")]
pub struct CoercionError {
    /// The kind the value had to become.
    pub expected: TagKind,
    /// The kind of the rejected value.
    pub found: TagKind,
    /// Canonical rendering of the rejected value.
    pub value: String,
}

/// A dynamically typed tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    /// Floating point value.
    Float(f64),
    /// Integer value.
    Integer(i32),
    /// Boolean value.
    Boolean(bool),
    /// Text value.
    Text(String),
}

impl TagValue {
    /// The kind this value carries.
    pub const fn kind(&self) -> TagKind {
        match self {
            Self::Float(_) => TagKind::Float,
            Self::Integer(_) => TagKind::Integer,
            Self::Boolean(_) => TagKind::Boolean,
            Self::Text(_) => TagKind::Text,
        }
    }

    /// Convert this value into `kind`, or explain why it cannot be.
    ///
    /// Floats headed for an integer tag are truncated toward zero; NaN,
    /// infinities and values outside the `i32` range are rejected rather
    /// than saturated.
    pub fn coerce(&self, kind: TagKind) -> Result<Self, CoercionError> {
        let coerced = match (kind, self) {
            (TagKind::Float, Self::Float(v)) => Some(Self::Float(*v)),
            (TagKind::Float, Self::Integer(v)) => Some(Self::Float(f64::from(*v))),

            (TagKind::Integer, Self::Integer(v)) => Some(Self::Integer(*v)),
            (TagKind::Integer, Self::Float(v)) => truncate_to_i32(*v).map(Self::Integer),

            (TagKind::Boolean, Self::Boolean(v)) => Some(Self::Boolean(*v)),
            (TagKind::Boolean, Self::Float(v)) => Some(Self::Boolean(*v != 0.0)),
            (TagKind::Boolean, Self::Integer(v)) => Some(Self::Boolean(*v != 0)),

            (TagKind::Text, Self::Text(v)) => Some(Self::Text(v.clone())),
            (TagKind::Text, other) => Some(Self::Text(other.to_string())),

            _ => None,
        };

        coerced.ok_or_else(|| CoercionError {
            expected: kind,
            found: self.kind(),
            value: self.to_string(),
        })
    }

    /// Numeric view of the value: floats and integers as-is, booleans as
    /// `1.0`/`0.0`. Text yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(f64::from(*v)),
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

fn truncate_to_i32(v: f64) -> Option<i32> {
    let t = v.trunc();
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&t) {
        // In range and already integral.
        #[allow(clippy::cast_possible_truncation)]
        Some(t as i32)
    } else {
        None
    }
}
