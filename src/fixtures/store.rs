//! Process-wide fixture store
//!
//! Entries move through uninitialized (absent) -> constructing -> ready ->
//! disposed. While an entry is constructing, every requester awaits the same
//! shared construction future, so the factory runs exactly once. A failed
//! construction is handed to all of those waiters and the entry is removed,
//! letting a later request try again. Teardown disposes what is left and
//! forgets it, so the next run starts from an empty store.
//!
//! Unshared instances never enter the store; [`OwnedFixtures`] tracks them
//! for the attempt or class that asked for them.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FixtureScope, Sharing};
use crate::error::FixtureError;
use crate::models::{FailureDetail, RunLevelFailure};
use crate::utils::catch_panic;

/// Shared state injected into tests
///
/// `dispose` runs once when the fixture's scope ends.
pub trait Fixture: Send + Sync + 'static {
    fn dispose(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Entry key: scope, discriminator and fixture type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FixtureKey {
    pub scope: FixtureScope,
    type_id: TypeId,
    pub type_name: &'static str,
}

impl FixtureKey {
    pub fn of<T: Fixture>(scope: FixtureScope) -> Self {
        Self {
            scope,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

#[derive(Clone)]
struct ReadyFixture {
    value: Arc<dyn Any + Send + Sync>,
    disposer: Arc<dyn Fixture>,
}

type Construction = Shared<BoxFuture<'static, Result<ReadyFixture, FixtureError>>>;

enum EntryState {
    Constructing {
        generation: u64,
        pending: Construction,
    },
    Ready {
        generation: u64,
        fixture: ReadyFixture,
    },
    Disposed,
}

/// Keyed cache of lazily constructed fixtures
#[derive(Default)]
pub struct FixtureStore {
    entries: Mutex<HashMap<FixtureKey, EntryState>>,
    leases: Mutex<HashMap<FixtureScope, usize>>,
    generation: AtomicU64,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the fixture for `scope`, constructing it on first access
    pub async fn get_or_create<T, F, Fut>(
        &self,
        scope: FixtureScope,
        factory: F,
    ) -> Result<Arc<T>, FixtureError>
    where
        T: Fixture,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = FixtureKey::of::<T>(scope);

        let (generation, pending) = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(EntryState::Ready { fixture, .. }) => return downcast(&key, fixture),
                Some(EntryState::Disposed) => {
                    return Err(FixtureError::Disposed {
                        type_name: key.type_name.to_string(),
                        scope: key.scope.to_string(),
                    })
                }
                Some(EntryState::Constructing {
                    generation,
                    pending,
                }) => (*generation, pending.clone()),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let pending = construct(key.type_name, factory).shared();
                    entries.insert(
                        key.clone(),
                        EntryState::Constructing {
                            generation,
                            pending: pending.clone(),
                        },
                    );
                    debug!("Constructing {} fixture {}", key.scope, key.type_name);
                    (generation, pending)
                }
            }
        };

        let outcome = pending.await;
        self.settle(&key, generation, &outcome);
        outcome.and_then(|fixture| downcast(&key, &fixture))
    }

    /// Resolve a fixture by sharing mode on behalf of a class
    pub async fn resolve<T, F, Fut>(
        &self,
        sharing: &Sharing,
        class_name: &str,
        factory: F,
    ) -> Result<Arc<T>, FixtureError>
    where
        T: Fixture,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        match sharing.scope_for(class_name) {
            Some(scope) => self.get_or_create(scope, factory).await,
            None => {
                let fixture = construct(type_name::<T>(), factory).await?;
                fixture.value.downcast::<T>().map_err(|_| FixtureError::TypeMismatch {
                    type_name: type_name::<T>().to_string(),
                })
            }
        }
    }

    /// Record one more unit using `scope`
    pub fn retain(&self, scope: &FixtureScope) {
        *self.leases.lock().entry(scope.clone()).or_insert(0) += 1;
    }

    pub fn lease_count(&self, scope: &FixtureScope) -> usize {
        self.leases.lock().get(scope).copied().unwrap_or(0)
    }

    /// Drop one lease; a class scope is disposed when its last lease goes
    pub async fn release(&self, scope: &FixtureScope) -> Vec<RunLevelFailure> {
        let remaining = {
            let mut leases = self.leases.lock();
            match leases.get_mut(scope) {
                Some(count) => {
                    *count = count.saturating_sub(1);
                    let remaining = *count;
                    if remaining == 0 {
                        leases.remove(scope);
                    }
                    remaining
                }
                None => 0,
            }
        };

        if remaining > 0 || !scope.is_class() {
            return Vec::new();
        }
        self.dispose_where(|key| &key.scope == scope, false).await
    }

    /// Dispose every remaining fixture, whatever its scope, and forget it
    ///
    /// Entries still under construction are left alone.
    pub async fn teardown(&self) -> Vec<RunLevelFailure> {
        self.dispose_where(|_| true, true).await
    }

    /// Whether a ready instance of `T` exists in `scope`
    pub fn is_ready<T: Fixture>(&self, scope: FixtureScope) -> bool {
        matches!(
            self.entries.lock().get(&FixtureKey::of::<T>(scope)),
            Some(EntryState::Ready { .. })
        )
    }

    pub fn is_disposed<T: Fixture>(&self, scope: FixtureScope) -> bool {
        matches!(
            self.entries.lock().get(&FixtureKey::of::<T>(scope)),
            Some(EntryState::Disposed)
        )
    }

    fn settle(
        &self,
        key: &FixtureKey,
        generation: u64,
        outcome: &Result<ReadyFixture, FixtureError>,
    ) {
        let mut entries = self.entries.lock();
        let current = matches!(
            entries.get(key),
            Some(EntryState::Constructing { generation: g, .. }) if *g == generation
        );
        if !current {
            return;
        }
        match outcome {
            Ok(fixture) => {
                entries.insert(
                    key.clone(),
                    EntryState::Ready {
                        generation,
                        fixture: fixture.clone(),
                    },
                );
            }
            Err(e) => {
                warn!("{}", e);
                entries.remove(key);
            }
        }
    }

    async fn dispose_where<P>(&self, predicate: P, forget: bool) -> Vec<RunLevelFailure>
    where
        P: Fn(&FixtureKey) -> bool,
    {
        let mut doomed = Vec::new();
        self.entries.lock().retain(|key, state| {
            if !predicate(key) {
                return true;
            }
            match std::mem::replace(state, EntryState::Disposed) {
                EntryState::Ready {
                    generation,
                    fixture,
                } => {
                    doomed.push((generation, key.clone(), fixture));
                    !forget
                }
                EntryState::Disposed => !forget,
                constructing @ EntryState::Constructing { .. } => {
                    *state = constructing;
                    true
                }
            }
        });

        // Newest first
        doomed.sort_by(|a, b| b.0.cmp(&a.0));

        let mut failures = Vec::new();
        for (_, key, fixture) in doomed {
            debug!("Disposing {} fixture {}", key.scope, key.type_name);
            if let Err(e) = catch_panic(fixture.disposer.dispose()).await {
                warn!("Disposing {} fixture {} failed: {:#}", key.scope, key.type_name, e);
                failures.push(RunLevelFailure {
                    owner: key.scope.to_string(),
                    detail: FailureDetail::cleanup(
                        format!("dispose {}", key.type_name),
                        format!("{e:#}"),
                    ),
                });
            }
        }
        failures
    }
}

/// Unshared fixtures owned by one attempt or one class
///
/// Clones share the same list. Instances are disposed newest first when the
/// owner ends.
#[derive(Clone, Default)]
pub struct OwnedFixtures {
    items: Arc<Mutex<Vec<(&'static str, Arc<dyn Fixture>)>>>,
}

impl OwnedFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<T: Fixture>(&self, fixture: &Arc<T>) {
        let disposer: Arc<dyn Fixture> = fixture.clone();
        self.items.lock().push((type_name::<T>(), disposer));
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose and forget every tracked instance
    pub async fn dispose_all(&self) -> Vec<FailureDetail> {
        let items = std::mem::take(&mut *self.items.lock());
        let mut failures = Vec::new();
        for (type_name, fixture) in items.into_iter().rev() {
            debug!("Disposing unshared fixture {}", type_name);
            if let Err(e) = catch_panic(fixture.dispose()).await {
                warn!("Disposing unshared fixture {} failed: {:#}", type_name, e);
                failures.push(FailureDetail::cleanup(
                    format!("dispose {type_name}"),
                    format!("{e:#}"),
                ));
            }
        }
        failures
    }
}

fn construct<T, F, Fut>(
    type_name: &'static str,
    factory: F,
) -> BoxFuture<'static, Result<ReadyFixture, FixtureError>>
where
    T: Fixture,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    async move {
        match catch_panic(async move { factory().await }).await {
            Ok(value) => {
                let value = Arc::new(value);
                Ok(ReadyFixture {
                    value: value.clone() as Arc<dyn Any + Send + Sync>,
                    disposer: value as Arc<dyn Fixture>,
                })
            }
            Err(e) => Err(FixtureError::Construction {
                type_name: type_name.to_string(),
                message: format!("{e:#}"),
            }),
        }
    }
    .boxed()
}

fn downcast<T: Fixture>(key: &FixtureKey, fixture: &ReadyFixture) -> Result<Arc<T>, FixtureError> {
    fixture
        .value
        .clone()
        .downcast::<T>()
        .map_err(|_| FixtureError::TypeMismatch {
            type_name: key.type_name.to_string(),
        })
}
