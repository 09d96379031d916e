//! Test unit identity
//!
//! Builds the deterministic key that names one repetition of one descriptor.
//!
//! Key layout, components separated by `.`:
//!
//! ```text
//! class.method.class_types.class_args.method_types.method_args.repetition
//! ```
//!
//! Bare components (class, method) escape `\`, `.` and `"` with a backslash.
//! List components quote every item, so an empty list and a list holding one
//! empty string stay distinct. A named argument source is written as `@name`,
//! which can never start a quoted list.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ArgumentSource, Descriptor};

/// Globally unique, deterministic unit key
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Wrap an already-built key
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the identity key for one repetition of a descriptor
pub fn build(descriptor: &Descriptor, repetition: u32) -> IdentityKey {
    let components = [
        escape_bare(&descriptor.class_name),
        escape_bare(&descriptor.method_name),
        quote_list(&descriptor.class_parameter_types),
        encode_arguments(&descriptor.class_arguments),
        quote_list(&descriptor.method_parameter_types),
        encode_arguments(&descriptor.method_arguments),
        repetition.to_string(),
    ];
    IdentityKey(components.join("."))
}

fn escape_bare(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        if matches!(ch, '\\' | '.' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn quote(item: &str) -> String {
    let mut out = String::with_capacity(item.len() + 2);
    out.push('"');
    for ch in item.chars() {
        if matches!(ch, '\\' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| quote(item))
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_arguments(arguments: &ArgumentSource) -> String {
    match arguments {
        ArgumentSource::None => String::new(),
        ArgumentSource::Values(values) => quote_list(values),
        ArgumentSource::Source(name) => format!("@{}", escape_bare(name)),
    }
}
