//! Hook sequencing around unit execution
//!
//! Per unit: one-time class setup (once per class, later units wait on it),
//! per-test setups in order, the body under the timeout governor, per-test
//! cleanups in reverse, then disposal of the attempt's unshared fixtures.
//! When the last unit of a class completes, the class's one-time cleanups
//! run in reverse and their failures go to the run summary.
//!
//! A body that outlives its grace period is reported at once, but its
//! cleanups wait for it: they run inside the [`Attempt::straggler`] future.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::executor::plan::PlannedUnit;
use crate::executor::timeout::{govern, Governed};
use crate::executor::{CancelSignal, ClassContext, Skip, TestContext};
use crate::fixtures::{FixtureStore, OwnedFixtures};
use crate::models::{ClassHook, Descriptor, FailureDetail, RunContext, RunLevelFailure};
use crate::utils::{catch_panic, Timer};

/// One-time hooks of a class plus its live-unit counter
pub struct OneTimeHookGroup {
    class_name: String,
    setups: Vec<ClassHook>,
    cleanups: Vec<ClassHook>,
    live: AtomicUsize,
    setup: OnceCell<Option<FailureDetail>>,
    cleaned: AtomicBool,
    owned: OwnedFixtures,
}

impl OneTimeHookGroup {
    fn new(descriptor: &Descriptor) -> Self {
        Self {
            class_name: descriptor.class_name.clone(),
            setups: descriptor.one_time_setups.clone(),
            cleanups: descriptor.one_time_cleanups.clone(),
            live: AtomicUsize::new(0),
            setup: OnceCell::new(),
            cleaned: AtomicBool::new(false),
            owned: OwnedFixtures::new(),
        }
    }

    fn context(&self, fixtures: &Arc<FixtureStore>) -> ClassContext {
        ClassContext::new(self.class_name.clone(), Arc::clone(fixtures), self.owned.clone())
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn live_units(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn is_set_up(&self) -> bool {
        self.setup.initialized()
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned.load(Ordering::Acquire)
    }

    /// Run the class setups once; every caller gets the same result
    async fn ensure_setup(&self, ctx: ClassContext) -> Option<FailureDetail> {
        self.setup
            .get_or_init(|| async {
                debug!("One-time setup for {}", self.class_name);
                for hook in &self.setups {
                    if let Err(e) = catch_panic(hook.invoke(ctx.clone())).await {
                        warn!("One-time setup {} of {} failed: {:#}", hook.name(), self.class_name, e);
                        return Some(FailureDetail::class_setup(hook.name(), format!("{e:#}")));
                    }
                }
                None
            })
            .await
            .clone()
    }

    /// Returns true for the caller that finished the last live unit
    fn finish_one(&self) -> bool {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    async fn run_cleanups(&self, ctx: ClassContext) -> Vec<RunLevelFailure> {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        debug!("One-time cleanup for {}", self.class_name);

        let mut failures = Vec::new();
        for hook in self.cleanups.iter().rev() {
            if let Err(e) = catch_panic(hook.invoke(ctx.clone())).await {
                warn!("One-time cleanup {} of {} failed: {:#}", hook.name(), self.class_name, e);
                failures.push(RunLevelFailure {
                    owner: self.class_name.clone(),
                    detail: FailureDetail::class_cleanup(hook.name(), format!("{e:#}")),
                });
            }
        }
        for detail in self.owned.dispose_all().await {
            failures.push(RunLevelFailure {
                owner: self.class_name.clone(),
                detail: FailureDetail {
                    one_time: true,
                    ..detail
                },
            });
        }
        failures
    }
}

/// Resolves once a hung body has finished and its attempt has been unwound
pub type Straggler = BoxFuture<'static, Vec<FailureDetail>>;

/// One finished attempt
pub struct Attempt {
    pub run: RunContext,
    /// Set when the body ignored cancellation; the caller must keep the unit's
    /// keys and class lease until it resolves
    pub straggler: Option<Straggler>,
}

impl Attempt {
    fn settled(run: RunContext) -> Self {
        Self {
            run,
            straggler: None,
        }
    }
}

/// Sequences one-time and per-test hooks for a run
pub struct LifecycleCoordinator {
    groups: Mutex<HashMap<String, Arc<OneTimeHookGroup>>>,
    fixtures: Arc<FixtureStore>,
    hang_grace: Duration,
}

impl LifecycleCoordinator {
    pub fn new(fixtures: Arc<FixtureStore>, hang_grace: Duration) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            fixtures,
            hang_grace,
        }
    }

    /// Count one more live unit for the descriptor's class
    ///
    /// The first descriptor seen for a class supplies its one-time hooks.
    pub fn register(&self, descriptor: &Descriptor) {
        let mut groups = self.groups.lock();
        let group = groups
            .entry(descriptor.class_name.clone())
            .or_insert_with(|| Arc::new(OneTimeHookGroup::new(descriptor)));
        group.live.fetch_add(1, Ordering::AcqRel);
    }

    pub fn group(&self, class_name: &str) -> Option<Arc<OneTimeHookGroup>> {
        self.groups.lock().get(class_name).cloned()
    }

    /// Execute one attempt of a unit; never fails, every problem is recorded
    pub async fn run_unit(
        &self,
        unit: &PlannedUnit,
        attempt: u32,
        timeout: Option<Duration>,
    ) -> Attempt {
        let descriptor = &unit.descriptor;
        let timer = Timer::start(format!("{} attempt {}", unit.identity, attempt));
        let mut run = RunContext::start(unit.identity.clone(), attempt)
            .with_properties(descriptor.custom_properties.clone());

        let class_failure = match self.group(&descriptor.class_name) {
            Some(group) => group.ensure_setup(group.context(&self.fixtures)).await,
            None => None,
        };
        if let Some(failure) = class_failure {
            run.record(failure);
            run.finish(timer.stop());
            return Attempt::settled(run);
        }

        let cancel = CancelSignal::new();
        let ctx = TestContext::new(
            unit.identity.clone(),
            descriptor.class_name.clone(),
            descriptor.method_name.clone(),
            attempt,
            unit.repetition,
            Arc::new(descriptor.custom_properties.clone()),
            cancel.clone(),
            Arc::clone(&self.fixtures),
        );

        let mut completed_setups = 0;
        let mut setups_ok = true;
        for hook in &descriptor.setups {
            match catch_panic(hook.invoke(ctx.clone())).await {
                Ok(()) => completed_setups += 1,
                Err(e) => {
                    match Skip::reason_of(&e) {
                        Some(reason) => run.mark_skipped(reason),
                        None => run.record(FailureDetail::setup(hook.name(), format!("{e:#}"))),
                    }
                    setups_ok = false;
                    break;
                }
            }
        }

        let hung_body = if setups_ok {
            self.run_body(&mut run, descriptor, ctx.clone(), &cancel, timeout)
                .await
        } else {
            None
        };

        // Cleanups pair with setups by position
        let cleanup_count = if setups_ok {
            descriptor.cleanups.len()
        } else {
            completed_setups.min(descriptor.cleanups.len())
        };

        let Some(handle) = hung_body else {
            for failure in unwind(descriptor, &ctx, cleanup_count).await {
                run.record(failure);
            }
            run.finish(timer.stop());
            debug!("{} attempt {}: {}", unit.identity, attempt, run.outcome);
            return Attempt::settled(run);
        };

        run.finish(timer.stop());
        debug!(
            "{} attempt {}: {}; cleanups wait for the hung body",
            unit.identity, attempt, run.outcome
        );
        let descriptor = Arc::clone(descriptor);
        let identity = unit.identity.clone();
        let straggler = async move {
            if let Err(e) = handle.await {
                warn!("{} hung body task failed: {}", identity, e);
            }
            info!("{} hung body finished; running its cleanups", identity);
            unwind(&descriptor, &ctx, cleanup_count).await
        }
        .boxed();
        Attempt {
            run,
            straggler: Some(straggler),
        }
    }

    /// Run the body under the governor; hands back the task if it hung
    async fn run_body(
        &self,
        run: &mut RunContext,
        descriptor: &Descriptor,
        ctx: TestContext,
        cancel: &CancelSignal,
        timeout: Option<Duration>,
    ) -> Option<JoinHandle<anyhow::Result<()>>> {
        let body = descriptor.body.invoke(ctx);
        let handle = tokio::spawn(catch_panic(body));
        let after = timeout.unwrap_or_default();

        match govern(handle, cancel, timeout, self.hang_grace).await {
            Ok(Governed::Completed(Ok(()))) => None,
            Ok(Governed::Completed(Err(e))) => {
                match Skip::reason_of(&e) {
                    Some(reason) => run.mark_skipped(reason),
                    None => run.record(FailureDetail::body(descriptor.body.name(), format!("{e:#}"))),
                }
                None
            }
            Ok(Governed::Cancelled) => {
                run.record(FailureDetail::timeout(descriptor.body.name(), after, false));
                None
            }
            Ok(Governed::Hung(handle)) => {
                warn!(
                    "{} ignored cancellation for {}ms after timing out; holding its resources until it returns",
                    run.identity,
                    self.hang_grace.as_millis()
                );
                run.record(FailureDetail::timeout(descriptor.body.name(), after, true));
                Some(handle)
            }
            Err(e) => {
                run.record(FailureDetail::body(
                    descriptor.body.name(),
                    format!("body task failed: {e}"),
                ));
                None
            }
        }
    }

    /// Mark one unit of the class terminal; runs one-time cleanup on the last
    pub async fn complete_unit(&self, class_name: &str) -> Vec<RunLevelFailure> {
        let Some(group) = self.group(class_name) else {
            return Vec::new();
        };
        if !group.finish_one() {
            return Vec::new();
        }
        info!("All units of {} finished", class_name);
        group.run_cleanups(group.context(&self.fixtures)).await
    }
}

/// Per-test cleanups in reverse, then the attempt's unshared fixtures
async fn unwind(descriptor: &Descriptor, ctx: &TestContext, cleanup_count: usize) -> Vec<FailureDetail> {
    let mut failures = Vec::new();
    for hook in descriptor.cleanups[..cleanup_count].iter().rev() {
        if let Err(e) = catch_panic(hook.invoke(ctx.clone())).await {
            failures.push(FailureDetail::cleanup(hook.name(), format!("{e:#}")));
        }
    }
    failures.extend(ctx.owned_fixtures().dispose_all().await);
    failures
}
