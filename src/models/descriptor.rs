//! Test unit descriptors
//!
//! A descriptor is the immutable record the registry hands to the engine for
//! one declared test. Everything here is already merged and normalized; the
//! engine only reads final values.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::executor::{ClassContext, TestContext};

/// Future returned by every user-supplied operation
pub type OpFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A named, opaque operation invoked with a context value
pub struct Hook<C> {
    name: String,
    op: Arc<dyn Fn(C) -> OpFuture + Send + Sync>,
}

impl<C: 'static> Hook<C> {
    pub fn new<F, Fut>(name: impl Into<String>, op: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            op: Arc::new(move |ctx| op(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the operation. Nothing runs until the future is polled.
    pub fn invoke(&self, ctx: C) -> OpFuture {
        (self.op)(ctx)
    }
}

impl<C> Clone for Hook<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            op: Arc::clone(&self.op),
        }
    }
}

impl<C> fmt::Debug for Hook<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

/// One-time hook bound to a class
pub type ClassHook = Hook<ClassContext>;

/// Per-test hook or test body
pub type TestHook = Hook<TestContext>;

/// Where a parameter list gets its values from
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentSource {
    /// No arguments
    #[default]
    None,
    /// Inline argument representations, in parameter order
    Values(Vec<String>),
    /// Reference to a named data source resolved by the registry
    Source(String),
}

impl ArgumentSource {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgumentSource::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ArgumentSource::None => true,
            ArgumentSource::Values(values) => values.is_empty(),
            ArgumentSource::Source(_) => false,
        }
    }
}

/// Immutable description of one declared test
#[derive(Clone, Debug)]
pub struct Descriptor {
    /// Fully-qualified owning type name
    pub class_name: String,
    /// Test method name
    pub method_name: String,
    pub class_parameter_types: Vec<String>,
    pub class_arguments: ArgumentSource,
    pub method_parameter_types: Vec<String>,
    pub method_arguments: ArgumentSource,
    pub categories: BTreeSet<String>,
    /// Mutual-exclusion keys; empty means unconstrained
    pub constraint_keys: Vec<String>,
    pub timeout: Option<Duration>,
    pub retry_limit: u32,
    /// Additional repetitions; 0 runs once
    pub repeat_count: u32,
    pub one_time_setups: Vec<ClassHook>,
    pub one_time_cleanups: Vec<ClassHook>,
    pub setups: Vec<TestHook>,
    pub cleanups: Vec<TestHook>,
    pub custom_properties: BTreeMap<String, String>,
    pub body: TestHook,
}

impl Descriptor {
    /// Create a descriptor with no parameters and default execution metadata
    pub fn new<F, Fut>(class_name: impl Into<String>, method_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let method_name = method_name.into();
        Self {
            class_name: class_name.into(),
            body: Hook::new(method_name.clone(), body),
            method_name,
            class_parameter_types: Vec::new(),
            class_arguments: ArgumentSource::None,
            method_parameter_types: Vec::new(),
            method_arguments: ArgumentSource::None,
            categories: BTreeSet::new(),
            constraint_keys: Vec::new(),
            timeout: None,
            retry_limit: 0,
            repeat_count: 0,
            one_time_setups: Vec::new(),
            one_time_cleanups: Vec::new(),
            setups: Vec::new(),
            cleanups: Vec::new(),
            custom_properties: BTreeMap::new(),
        }
    }

    /// `class::method`, used in logs and error messages
    pub fn display_name(&self) -> String {
        format!("{}::{}", self.class_name, self.method_name)
    }

    pub fn with_class_parameters<I, S>(mut self, types: I, arguments: ArgumentSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_parameter_types = types.into_iter().map(Into::into).collect();
        self.class_arguments = arguments;
        self
    }

    pub fn with_method_parameters<I, S>(mut self, types: I, arguments: ArgumentSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.method_parameter_types = types.into_iter().map(Into::into).collect();
        self.method_arguments = arguments;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_constraint_key(mut self, key: impl Into<String>) -> Self {
        self.constraint_keys.push(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn with_repeat(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn with_one_time_setup<F, Fut>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(ClassContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.one_time_setups.push(Hook::new(name, op));
        self
    }

    pub fn with_one_time_cleanup<F, Fut>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(ClassContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.one_time_cleanups.push(Hook::new(name, op));
        self
    }

    /// Share already-built one-time hooks between descriptors of one class
    pub fn with_class_hooks(mut self, setups: &[ClassHook], cleanups: &[ClassHook]) -> Self {
        self.one_time_setups.extend_from_slice(setups);
        self.one_time_cleanups.extend_from_slice(cleanups);
        self
    }

    /// Append a per-test setup; setups run in registration order
    pub fn with_setup<F, Fut>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.setups.push(Hook::new(name, op));
        self
    }

    /// Append a per-test cleanup; cleanups run in reverse registration order
    ///
    /// Cleanups pair with setups by position: the k-th cleanup undoes the k-th
    /// setup. When setup k+1 fails (or skips), only the first k cleanups run.
    /// Cleanups registered beyond the number of setups therefore only run
    /// when every setup succeeded.
    pub fn with_cleanup<F, Fut>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cleanups.push(Hook::new(name, op));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = Descriptor::new("suite::Math", "adds", |_ctx| async { Ok(()) });
        assert_eq!(descriptor.display_name(), "suite::Math::adds");
        assert_eq!(descriptor.retry_limit, 0);
        assert_eq!(descriptor.repeat_count, 0);
        assert!(descriptor.constraint_keys.is_empty());
        assert!(descriptor.class_arguments.is_empty());
        assert_eq!(descriptor.body.name(), "adds");
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = Descriptor::new("suite::Db", "writes", |_ctx| async { Ok(()) })
            .with_category("integration")
            .with_constraint_key("db")
            .with_constraint_key("fs")
            .with_timeout(Duration::from_millis(250))
            .with_retries(2)
            .with_repeat(3)
            .with_setup("open", |_ctx| async { Ok(()) })
            .with_cleanup("close", |_ctx| async { Ok(()) })
            .with_property("owner", "storage");

        assert!(descriptor.categories.contains("integration"));
        assert_eq!(descriptor.constraint_keys, vec!["db", "fs"]);
        assert_eq!(descriptor.timeout, Some(Duration::from_millis(250)));
        assert_eq!(descriptor.retry_limit, 2);
        assert_eq!(descriptor.repeat_count, 3);
        assert_eq!(descriptor.setups[0].name(), "open");
        assert_eq!(descriptor.cleanups[0].name(), "close");
        assert_eq!(
            descriptor.custom_properties.get("owner").map(String::as_str),
            Some("storage")
        );
    }

    #[test]
    fn test_argument_source_emptiness() {
        assert!(ArgumentSource::None.is_empty());
        assert!(ArgumentSource::values(Vec::<String>::new()).is_empty());
        assert!(!ArgumentSource::values(["1"]).is_empty());
        assert!(!ArgumentSource::Source("cases".to_string()).is_empty());
    }

    #[test]
    fn test_shared_class_hooks() {
        let setup: ClassHook = Hook::new("boot", |_ctx| async { Ok(()) });
        let first = Descriptor::new("suite::A", "one", |_ctx| async { Ok(()) })
            .with_class_hooks(std::slice::from_ref(&setup), &[]);
        let second = Descriptor::new("suite::A", "two", |_ctx| async { Ok(()) })
            .with_class_hooks(std::slice::from_ref(&setup), &[]);
        assert_eq!(first.one_time_setups[0].name(), "boot");
        assert_eq!(second.one_time_setups[0].name(), "boot");
    }
}
