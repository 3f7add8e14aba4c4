//! Rendering context and caller overrides.
//!
//! A [`RenderContext`] is the flat key/value mapping handed to the template
//! renderer. [`Overrides`] carries the caller-supplied values that replace
//! extracted ones before rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Every key a complete context carries, in template order.
pub const CONTEXT_KEYS: [&str; 16] = [
    "file_href",
    "file_id",
    "ovf_disk_capacity",
    "ovf_disk_diskid",
    "ovf_disk_fileref",
    "ovf_disk_format",
    "vbox_disk_uuid",
    "ovf_network_name",
    "virtual_system_id",
    "virtual_system_identifier",
    "virtual_system_type",
    "oss_id",
    "oss_description",
    "oss_type",
    "cpus",
    "memory",
];

/// vSphere guest OS code for the Red Hat family.
pub const DEFAULT_OSS_ID: i64 = 107;

/// vSphere guest OS description for the Red Hat family.
pub const DEFAULT_OSS_DESCRIPTION: &str = "CentOS 4/5/6/7 (64-bit)";

/// vSphere guest OS type for 64-bit RHEL 7 guests.
pub const DEFAULT_OSS_TYPE: &str = "rhel7_64Guest";

/// VMware virtual hardware version.
pub const DEFAULT_VIRTUAL_SYSTEM_TYPE: &str = "vmx-10";

/// A single context value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Text copied verbatim from the descriptor or the caller.
    Text(String),
    /// A numeric value, rendered as decimal text.
    Integer(i64),
}

impl ContextValue {
    /// The text value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s.as_str()),
            ContextValue::Integer(_) => None,
        }
    }

    /// The integer value, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ContextValue::Integer(n) => Some(*n),
            ContextValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Text(s) => write!(f, "{}", s),
            ContextValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Integer(value)
    }
}

/// Flat mapping from field name to value, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderContext {
    values: BTreeMap<String, ContextValue>,
}

impl RenderContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for the key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge all entries of `other` into this context.
    pub fn extend(&mut self, other: RenderContext) {
        self.values.extend(other.values);
    }

    /// Keys from [`CONTEXT_KEYS`] that this context lacks.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        CONTEXT_KEYS
            .iter()
            .copied()
            .filter(|key| !self.contains_key(key))
            .collect()
    }

    /// Return a copy with every override applied.
    ///
    /// Overrides for keys the context does not have are added as well.
    pub fn updated(&self, overrides: &Overrides) -> RenderContext {
        let mut updated = self.clone();
        for (key, value) in overrides.iter() {
            updated.insert(key, value.clone());
        }
        updated
    }

    /// Convert into a Tera context.
    pub fn to_tera(&self) -> tera::Result<tera::Context> {
        tera::Context::from_serialize(self)
    }
}

/// Caller-supplied values that take precedence over extracted ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    values: BTreeMap<String, ContextValue>,
}

impl Overrides {
    /// An empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The guest OS and hardware version values a vSphere import expects for
    /// a 64-bit CentOS 7 guest.
    pub fn vsphere_defaults() -> Self {
        Self::new()
            .with_oss_id(DEFAULT_OSS_ID)
            .with_oss_description(DEFAULT_OSS_DESCRIPTION)
            .with_oss_type(DEFAULT_OSS_TYPE)
            .with_virtual_system_type(DEFAULT_VIRTUAL_SYSTEM_TYPE)
    }

    /// Set an arbitrary key.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_oss_id(self, id: i64) -> Self {
        self.set("oss_id", id)
    }

    pub fn with_oss_description(self, description: impl Into<String>) -> Self {
        self.set("oss_description", description.into())
    }

    pub fn with_oss_type(self, os_type: impl Into<String>) -> Self {
        self.set("oss_type", os_type.into())
    }

    pub fn with_virtual_system_type(self, system_type: impl Into<String>) -> Self {
        self.set("virtual_system_type", system_type.into())
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
