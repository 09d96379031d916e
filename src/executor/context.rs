//! Values handed to user operations

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use super::CancelSignal;
use crate::error::FixtureError;
use crate::fixtures::{Fixture, FixtureStore, OwnedFixtures, Sharing};
use crate::identity::IdentityKey;

/// Returned by a body or setup to end the attempt as skipped
#[derive(Debug, Clone, Error)]
#[error("skipped: {reason}")]
pub struct Skip {
    pub reason: String,
}

impl Skip {
    /// The skip reason if `err` is a skip signal
    pub fn reason_of(err: &anyhow::Error) -> Option<&str> {
        err.downcast_ref::<Skip>().map(|s| s.reason.as_str())
    }
}

/// Context for one attempt of one unit
///
/// Cheap to clone; every per-test hook and the body get their own copy.
#[derive(Clone)]
pub struct TestContext {
    identity: IdentityKey,
    class_name: String,
    method_name: String,
    attempt: u32,
    repetition: u32,
    properties: Arc<BTreeMap<String, String>>,
    cancel: CancelSignal,
    fixtures: Arc<FixtureStore>,
    owned: OwnedFixtures,
}

impl TestContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        identity: IdentityKey,
        class_name: String,
        method_name: String,
        attempt: u32,
        repetition: u32,
        properties: Arc<BTreeMap<String, String>>,
        cancel: CancelSignal,
        fixtures: Arc<FixtureStore>,
    ) -> Self {
        Self {
            identity,
            class_name,
            method_name,
            attempt,
            repetition,
            properties,
            cancel,
            fixtures,
            owned: OwnedFixtures::new(),
        }
    }

    pub fn identity(&self) -> &IdentityKey {
        &self.identity
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn repetition(&self) -> u32 {
        self.repetition
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the attempt's timeout fires
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Injected fixture, constructed on first use for its scope
    ///
    /// A `Sharing::None` instance belongs to this attempt and is disposed
    /// after the per-test cleanups.
    pub async fn fixture<T, F, Fut>(&self, sharing: Sharing, factory: F) -> Result<Arc<T>, FixtureError>
    where
        T: Fixture,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let fixture = self
            .fixtures
            .resolve(&sharing, &self.class_name, factory)
            .await?;
        if sharing == Sharing::None {
            self.owned.track(&fixture);
        }
        Ok(fixture)
    }

    pub(crate) fn owned_fixtures(&self) -> &OwnedFixtures {
        &self.owned
    }

    /// Build the skip signal, e.g. `return Err(ctx.skip("needs a GPU"))`
    pub fn skip(&self, reason: impl Into<String>) -> anyhow::Error {
        Skip {
            reason: reason.into(),
        }
        .into()
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("identity", &self.identity)
            .field("attempt", &self.attempt)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Context for one-time class hooks
#[derive(Clone)]
pub struct ClassContext {
    class_name: String,
    fixtures: Arc<FixtureStore>,
    owned: OwnedFixtures,
}

impl ClassContext {
    pub(crate) fn new(class_name: String, fixtures: Arc<FixtureStore>, owned: OwnedFixtures) -> Self {
        Self {
            class_name,
            fixtures,
            owned,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Like [`TestContext::fixture`]; a `Sharing::None` instance lives until
    /// the class's one-time cleanups have run
    pub async fn fixture<T, F, Fut>(&self, sharing: Sharing, factory: F) -> Result<Arc<T>, FixtureError>
    where
        T: Fixture,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let fixture = self
            .fixtures
            .resolve(&sharing, &self.class_name, factory)
            .await?;
        if sharing == Sharing::None {
            self.owned.track(&fixture);
        }
        Ok(fixture)
    }
}

impl std::fmt::Debug for ClassContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassContext")
            .field("class_name", &self.class_name)
            .finish()
    }
}
