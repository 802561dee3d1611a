//! The tag store: the single source of truth for every simulated value.
//!
//! The name set is fixed once the store is populated. Each tag carries its own
//! [`RwLock`], so readers of one tag never wait on a writer of another and
//! there is no store-wide lock. Share the populated store as
//! `Arc<TagStore>`; population itself takes `&mut self`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use fieldsim_types::{DeviceDefinition, TagKind, TagValue};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::TagError;

/// Mutable part of a tag, guarded by the tag's lock.
#[derive(Debug, Clone)]
struct TagState {
    value: TagValue,
    good: bool,
    timestamp: DateTime<Utc>,
}

/// One named simulated point.
#[derive(Debug)]
pub struct Tag {
    name: String,
    kind: TagKind,
    address: String,
    description: String,
    state: RwLock<TagState>,
}

impl Tag {
    fn new(name: String, kind: TagKind, address: String, description: String) -> Self {
        Self {
            name,
            kind,
            address,
            description,
            state: RwLock::new(TagState {
                value: kind.default_value(),
                good: true,
                timestamp: Utc::now(),
            }),
        }
    }

    /// Tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind fixed at creation.
    pub const fn kind(&self) -> TagKind {
        self.kind
    }

    /// External address token.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current value.
    pub fn value(&self) -> TagValue {
        self.state.read().value.clone()
    }

    /// Coerce and store `value`, returning what was stored.
    fn write(&self, value: TagValue) -> Result<TagValue, TagError> {
        let value = if value.kind() == self.kind {
            value
        } else {
            value.coerce(self.kind).map_err(|source| TagError::TypeMismatch {
                tag: self.name.clone(),
                source,
            })?
        };

        let mut state = self.state.write();
        state.value = value.clone();
        state.timestamp = Utc::now();
        Ok(value)
    }

    fn snapshot(&self) -> TagSnapshot {
        let state = self.state.read().clone();
        TagSnapshot {
            name: self.name.clone(),
            kind: self.kind,
            value: state.value,
            quality: state.good,
            address: self.address.clone(),
            description: self.description.clone(),
            timestamp: state.timestamp,
        }
    }
}

/// A point-in-time copy of one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSnapshot {
    /// Tag name.
    pub name: String,
    /// Tag kind.
    pub kind: TagKind,
    /// Value at the time of the snapshot.
    pub value: TagValue,
    /// `true` when the value is good.
    pub quality: bool,
    /// External address token.
    pub address: String,
    /// Free-text description.
    pub description: String,
    /// Time of the last successful write.
    pub timestamp: DateTime<Utc>,
}

/// Tag counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagSummary {
    /// Total number of tags.
    pub total: usize,
    /// Float tags.
    pub float: usize,
    /// Integer tags.
    pub integer: usize,
    /// Boolean tags.
    pub boolean: usize,
    /// Text tags.
    pub text: usize,
}

impl fmt::Display for TagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tags ({} float, {} integer, {} boolean, {} text)",
            self.total, self.float, self.integer, self.boolean, self.text
        )
    }
}

/// Concurrency-safe mapping from tag name to [`Tag`].
#[derive(Debug, Default)]
pub struct TagStore {
    tags: BTreeMap<String, Tag>,
}

impl TagStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// One tag per definition, kind derived from the address.
    pub fn from_definitions(defs: &[DeviceDefinition]) -> Result<Self, TagError> {
        let mut store = Self::new();
        for def in defs {
            let kind = TagKind::from_address(&def.address, &def.device_type);
            store.create(&def.name, kind, &def.address, &def.description)?;
            debug!(tag = %def.name, kind = %kind, address = %def.address, "tag created");
        }
        Ok(store)
    }

    /// Register a new tag holding its kind's default value.
    pub fn create(
        &mut self,
        name: &str,
        kind: TagKind,
        address: &str,
        description: &str,
    ) -> Result<(), TagError> {
        if self.tags.contains_key(name) {
            return Err(TagError::DuplicateName(name.to_owned()));
        }
        self.tags.insert(
            name.to_owned(),
            Tag::new(
                name.to_owned(),
                kind,
                address.to_owned(),
                description.to_owned(),
            ),
        );
        Ok(())
    }

    fn tag(&self, name: &str) -> Result<&Tag, TagError> {
        self.tags
            .get(name)
            .ok_or_else(|| TagError::NotFound(name.to_owned()))
    }

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Result<TagValue, TagError> {
        self.tag(name).map(Tag::value)
    }

    /// Write `value` into `name`, coercing it into the tag's kind.
    ///
    /// Returns the value actually stored. On [`TagError::TypeMismatch`] the
    /// previous value and timestamp are kept.
    pub fn set(&self, name: &str, value: impl Into<TagValue>) -> Result<TagValue, TagError> {
        self.tag(name)?.write(value.into())
    }

    /// Kind of `name`.
    pub fn kind(&self, name: &str) -> Result<TagKind, TagError> {
        self.tag(name).map(Tag::kind)
    }

    /// Full copy of one tag.
    pub fn snapshot(&self, name: &str) -> Result<TagSnapshot, TagError> {
        self.tag(name).map(Tag::snapshot)
    }

    /// Every tag, sorted by name.
    pub fn all_tags(&self) -> Vec<TagSnapshot> {
        self.tags.values().map(Tag::snapshot).collect()
    }

    /// Mark a tag's value good or bad.
    pub fn set_quality(&self, name: &str, good: bool) -> Result<(), TagError> {
        self.tag(name)?.state.write().good = good;
        Ok(())
    }

    /// `true` when the tag's value is good.
    pub fn quality(&self, name: &str) -> Result<bool, TagError> {
        Ok(self.tag(name)?.state.read().good)
    }

    /// Whether a tag named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Tag names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Iterate over the tags themselves.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the store holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Per-kind tag counts.
    pub fn summary(&self) -> TagSummary {
        let count = |kind: TagKind| self.tags.values().filter(|t| t.kind == kind).count();
        TagSummary {
            total: self.tags.len(),
            float: count(TagKind::Float),
            integer: count(TagKind::Integer),
            boolean: count(TagKind::Boolean),
            text: count(TagKind::Text),
        }
    }
}

/// The accessor surface a protocol adaptor uses to expose tags to remote
/// clients.
pub trait TagAccess: Send + Sync {
    /// Read one tag's value.
    fn get_tag_value(&self, name: &str) -> Result<TagValue, TagError>;

    /// Write one tag's value with kind-directed coercion.
    fn set_tag_value(&self, name: &str, value: TagValue) -> Result<(), TagError>;

    /// Snapshot every tag, sorted by name.
    fn all_tags(&self) -> Vec<TagSnapshot>;

    /// Number of tags.
    fn tag_count(&self) -> usize;
}

impl TagAccess for TagStore {
    fn get_tag_value(&self, name: &str) -> Result<TagValue, TagError> {
        self.get(name)
    }

    fn set_tag_value(&self, name: &str, value: TagValue) -> Result<(), TagError> {
        self.set(name, value).map(|_| ())
    }

    fn all_tags(&self) -> Vec<TagSnapshot> {
        Self::all_tags(self)
    }

    fn tag_count(&self) -> usize {
        self.len()
    }
}
