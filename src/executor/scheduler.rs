//! Unit scheduler
//!
//! A single coordinator owns the ready queue and the constraint graph. It
//! hands units to at most `workers` concurrent worker tasks, reserving every
//! constraint key of a unit before dispatch and releasing them as soon as the
//! attempt completes, before any retry is queued. Terminal units are reported
//! to the sinks in completion order and then torn down off the dispatch path.
//!
//! A hung body is reported when its attempt times out, but the unit keeps its
//! keys and its class teardown waits until the body actually returns.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::plan::{PlannedUnit, TestPlan};
use crate::config::EngineConfig;
use crate::constraints::ConstraintGraph;
use crate::error::EngineError;
use crate::fixtures::{FixtureScope, FixtureStore};
use crate::identity::IdentityKey;
use crate::lifecycle::{Attempt, LifecycleCoordinator};
use crate::models::{Descriptor, FailureDetail, RunContext, RunLevelFailure, RunSummary, UnitReport};
use crate::output::ResultSink;
use crate::utils::Timer;

/// A unit waiting for (another) attempt, with its history so far
struct Pending {
    unit: PlannedUnit,
    attempts: Vec<RunContext>,
}

impl Pending {
    fn next_attempt(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    fn into_report(self) -> UnitReport {
        let descriptor = &self.unit.descriptor;
        UnitReport::from_attempts(
            self.unit.identity.clone(),
            descriptor.class_name.clone(),
            descriptor.method_name.clone(),
            self.unit.repetition,
            self.unit.categories(),
            self.attempts,
        )
    }
}

/// Something the coordinator waits on
enum Completion {
    /// A worker finished an attempt
    Attempt(Pending, Attempt),
    /// A hung body returned and its attempt was unwound
    Returned {
        identity: IdentityKey,
        failures: Vec<FailureDetail>,
    },
}

/// Runs descriptors to completion on a bounded worker pool
pub struct Scheduler {
    config: EngineConfig,
    fixtures: Arc<FixtureStore>,
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            fixtures: Arc::new(FixtureStore::new()),
            sinks: Vec::new(),
        }
    }

    /// Use an existing fixture store
    pub fn with_fixtures(mut self, fixtures: Arc<FixtureStore>) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fixtures(&self) -> &Arc<FixtureStore> {
        &self.fixtures
    }

    /// Execute every descriptor and summarize the run
    ///
    /// Unit failures never surface here; only fatal engine errors do.
    pub async fn run(&self, descriptors: Vec<Descriptor>) -> Result<RunSummary, EngineError> {
        self.config.validate()?;
        let started_at = Utc::now();
        let timer = Timer::start("run");

        let plan = match TestPlan::build(descriptors, &self.config) {
            Ok(plan) => plan,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };
        info!(
            "Running {} unit(s) on {} worker(s), {} excluded",
            plan.runnable.len(),
            self.config.workers,
            plan.excluded.len()
        );

        let lifecycle = Arc::new(LifecycleCoordinator::new(
            Arc::clone(&self.fixtures),
            self.config.hang_grace(),
        ));
        let mut graph = ConstraintGraph::new();
        for unit in &plan.runnable {
            graph.register(unit.identity.clone(), &unit.descriptor.constraint_keys);
            lifecycle.register(&unit.descriptor);
            self.fixtures
                .retain(&FixtureScope::Class(unit.class_name().to_string()));
        }
        for group in graph.groups() {
            debug!(
                "Constraint group {:?}: {} unit(s)",
                group.keys,
                group.members.len()
            );
        }

        let mut finished: Vec<(usize, UnitReport)> = Vec::with_capacity(plan.total());
        for unit in &plan.excluded {
            let report = unit.not_executed();
            self.notify(&report);
            finished.push((unit.sequence, report));
        }

        let mut queue: VecDeque<Pending> = plan
            .runnable
            .into_iter()
            .map(|unit| Pending {
                unit,
                attempts: Vec::new(),
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut in_flight: JoinSet<Completion> = JoinSet::new();
        let mut teardowns: JoinSet<Vec<RunLevelFailure>> = JoinSet::new();
        let mut run_failures = Vec::new();
        // Hung bodies still running, per unit
        let mut lingering: HashMap<IdentityKey, usize> = HashMap::new();
        // Terminal units whose class teardown waits on a hung body
        let mut deferred: HashMap<IdentityKey, String> = HashMap::new();

        loop {
            // Fill free workers with the earliest eligible units
            while let Some(position) = graph.next_eligible(&queue, |p| &p.unit.identity) {
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };
                let Some(pending) = queue.remove(position) else {
                    break;
                };
                if let Err(e) = graph.reserve(&pending.unit.identity) {
                    error!("{}", e);
                    in_flight.abort_all();
                    return Err(e);
                }

                let attempt = pending.next_attempt();
                let timeout = self.config.timeout_for(&pending.unit.descriptor);
                debug!("Dispatching {} (attempt {})", pending.unit.identity, attempt);

                let lifecycle = Arc::clone(&lifecycle);
                in_flight.spawn(async move {
                    let _permit = permit;
                    let attempt = lifecycle.run_unit(&pending.unit, attempt, timeout).await;
                    Completion::Attempt(pending, attempt)
                });
            }

            if in_flight.is_empty() {
                if queue.is_empty() {
                    break;
                }
                let err = EngineError::ConstraintDeadlock {
                    waiting: queue.iter().map(|p| p.unit.identity.clone()).collect(),
                };
                error!("{}", err);
                return Err(err);
            }

            let Some(joined) = in_flight.join_next().await else {
                continue;
            };
            let (mut pending, attempt) = match joined {
                Ok(Completion::Attempt(pending, attempt)) => (pending, attempt),
                Ok(Completion::Returned { identity, failures }) => {
                    run_failures.extend(failures.into_iter().map(|detail| RunLevelFailure {
                        owner: identity.to_string(),
                        detail,
                    }));
                    let remaining = lingering.get_mut(&identity).map(|n| {
                        *n = n.saturating_sub(1);
                        *n
                    });
                    if remaining.unwrap_or(0) == 0 {
                        lingering.remove(&identity);
                        debug!("{} hung body returned; releasing its keys", identity);
                        graph.release(&identity);
                        if let Some(class_name) = deferred.remove(&identity) {
                            self.spawn_teardown(&mut teardowns, &lifecycle, class_name);
                        }
                    }
                    continue;
                }
                Err(e) => {
                    let err = EngineError::WorkerLost(format!("worker task failed: {e}"));
                    error!("{}", err);
                    in_flight.abort_all();
                    return Err(err);
                }
            };

            let identity = pending.unit.identity.clone();
            let Attempt { run, straggler } = attempt;
            match straggler {
                Some(straggler) => {
                    *lingering.entry(identity.clone()).or_insert(0) += 1;
                    let returned = identity.clone();
                    in_flight.spawn(async move {
                        let failures = straggler.await;
                        Completion::Returned {
                            identity: returned,
                            failures,
                        }
                    });
                }
                None if !lingering.contains_key(&identity) => graph.release(&identity),
                None => {}
            }

            let retries = self.config.retries_for(&pending.unit.descriptor);
            let (attempt, outcome) = (run.attempt, run.outcome);
            let retry =
                outcome.is_retryable() && !run.is_class_setup_failure() && attempt <= retries;
            pending.attempts.push(run);

            if retry {
                warn!(
                    "{} attempt {}: {}, retrying ({} of {})",
                    identity, attempt, outcome, attempt, retries
                );
                queue.push_back(pending);
                continue;
            }

            let class_name = pending.unit.class_name().to_string();
            let sequence = pending.unit.sequence;
            let report = pending.into_report();
            self.notify(&report);
            finished.push((sequence, report));

            if lingering.contains_key(&identity) {
                debug!("{} teardown waits for its hung body", identity);
                deferred.insert(identity, class_name);
            } else {
                self.spawn_teardown(&mut teardowns, &lifecycle, class_name);
            }
        }

        while let Some(result) = teardowns.join_next().await {
            match result {
                Ok(failures) => run_failures.extend(failures),
                Err(e) => {
                    let err = EngineError::WorkerLost(format!("class teardown: {e}"));
                    error!("{}", err);
                    return Err(err);
                }
            }
        }
        run_failures.extend(self.fixtures.teardown().await);

        finished.sort_by_key(|(sequence, _)| *sequence);
        let units = finished.into_iter().map(|(_, report)| report).collect();
        let summary = RunSummary::new(started_at, units, run_failures);
        info!(
            "Run {} finished in {}ms: {} passed, {} failed, {} cancelled",
            summary.run_id,
            timer.stop(),
            summary.passed,
            summary.failed,
            summary.cancelled
        );

        for sink in &self.sinks {
            if let Err(e) = sink.run_finished(&summary) {
                warn!("Result sink failed: {:#}", e);
            }
        }
        Ok(summary)
    }

    /// One-time cleanup bookkeeping and class lease release for a terminal unit
    fn spawn_teardown(
        &self,
        teardowns: &mut JoinSet<Vec<RunLevelFailure>>,
        lifecycle: &Arc<LifecycleCoordinator>,
        class_name: String,
    ) {
        let lifecycle = Arc::clone(lifecycle);
        let fixtures = Arc::clone(&self.fixtures);
        teardowns.spawn(async move {
            let mut failures = lifecycle.complete_unit(&class_name).await;
            failures.extend(fixtures.release(&FixtureScope::Class(class_name)).await);
            failures
        });
    }

    fn notify(&self, report: &UnitReport) {
        for sink in &self.sinks {
            sink.unit_finished(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, Sharing};
    use crate::models::{FailureKind, Outcome};
    use crate::output::CollectingSink;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(workers: usize) -> EngineConfig {
        EngineConfig::new()
            .with_workers(workers)
            .with_hang_grace(Duration::from_millis(50))
    }

    fn passing(class: &str, method: &str) -> Descriptor {
        Descriptor::new(class, method, |_ctx| async { Ok(()) })
    }

    #[tokio::test]
    async fn test_empty_run() {
        let summary = Scheduler::new(config(2)).run(Vec::new()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let err = Scheduler::new(config(0))
            .run(vec![passing("s::A", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_width_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let descriptors = (0..12)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                Descriptor::new("s::Pool", format!("t{i}"), move |_ctx| {
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            })
            .collect();

        let summary = Scheduler::new(config(3)).run(descriptors).await.unwrap();
        assert_eq!(summary.passed, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_flaky_unit_passes_on_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = Descriptor::new("s::A", "flaky", move |_ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("attempt {} failed", n + 1);
                }
                Ok(())
            }
        })
        .with_retries(3);

        let summary = Scheduler::new(config(1)).run(vec![flaky]).await.unwrap();
        let unit = &summary.units[0];
        assert_eq!(unit.outcome, Outcome::Passed);
        assert_eq!(unit.attempts.len(), 3);
        assert_eq!(unit.failures().count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_override_and_cancelled_attempts_retry() {
        let slow = Descriptor::new("s::A", "slow", |ctx| async move {
            ctx.cancelled().await;
            Ok(())
        })
        .with_timeout(Duration::from_millis(10));

        let summary = Scheduler::new(config(1).with_retry_override(2))
            .run(vec![slow])
            .await
            .unwrap();
        let unit = &summary.units[0];
        assert_eq!(unit.outcome, Outcome::Cancelled);
        assert_eq!(unit.attempts.len(), 3);
        assert!(unit
            .failures()
            .all(|f| f.kind == FailureKind::TimeoutCancellation && !f.hung));
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let slow = Descriptor::new("s::A", "slow", |ctx| async move {
            ctx.cancelled().await;
            Ok(())
        });
        let summary = Scheduler::new(config(1).with_default_timeout(Duration::from_millis(10)))
            .run(vec![slow])
            .await
            .unwrap();
        assert_eq!(summary.cancelled, 1);
    }

    #[tokio::test]
    async fn test_hung_body_is_reported() {
        let stubborn = Descriptor::new("s::A", "stubborn", |_ctx| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        })
        .with_timeout(Duration::from_millis(10));

        let summary = Scheduler::new(config(1)).run(vec![stubborn]).await.unwrap();
        let failure = summary.units[0].failures().next().unwrap();
        assert_eq!(failure.kind, FailureKind::TimeoutCancellation);
        assert!(failure.hung);
    }

    #[tokio::test]
    async fn test_skips_and_class_setup_failures_never_retry() {
        let skipped = Descriptor::new("s::A", "skipped", |ctx| async move {
            Err(ctx.skip("unsupported"))
        })
        .with_retries(3);
        let broken = passing("s::B", "broken")
            .with_one_time_setup("boot", |_ctx| async { anyhow::bail!("no database") })
            .with_retries(3);

        let summary = Scheduler::new(config(2))
            .run(vec![skipped, broken])
            .await
            .unwrap();
        assert_eq!(summary.units[0].outcome, Outcome::Skipped);
        assert_eq!(summary.units[0].attempts.len(), 1);
        assert_eq!(summary.units[1].outcome, Outcome::Failed);
        assert_eq!(summary.units[1].attempts.len(), 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_excluded_units_never_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let slow = Descriptor::new("s::A", "slow", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .with_category("slow");

        let sink = Arc::new(CollectingSink::new());
        let summary = Scheduler::new(config(2).with_category("slow", false))
            .with_sink(sink.clone())
            .run(vec![slow, passing("s::A", "fast")])
            .await
            .unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.not_executed, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.units[0].outcome, Outcome::NotExecuted);
        assert_eq!(sink.units().len(), 2);
        assert_eq!(sink.summary().unwrap().run_id, summary.run_id);
    }

    struct Connection {
        disposed: Arc<AtomicUsize>,
        cleanups_seen: Arc<AtomicUsize>,
        cleanups_at_dispose: Arc<AtomicUsize>,
    }

    impl Fixture for Connection {
        fn dispose(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.cleanups_at_dispose
                    .store(self.cleanups_seen.load(Ordering::SeqCst), Ordering::SeqCst);
                self.disposed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_class_fixture_disposed_after_one_time_cleanup() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let at_dispose = Arc::new(AtomicUsize::new(0));

        let descriptors: Vec<Descriptor> = (0..4)
            .map(|i| {
                let (d, c, a) = (disposed.clone(), cleanups.clone(), at_dispose.clone());
                let c2 = cleanups.clone();
                Descriptor::new("s::Conn", format!("t{i}"), move |ctx| {
                    let (d, c, a) = (d.clone(), c.clone(), a.clone());
                    async move {
                        ctx.fixture(Sharing::PerClass, move || async move {
                            Ok(Connection {
                                disposed: d,
                                cleanups_seen: c,
                                cleanups_at_dispose: a,
                            })
                        })
                        .await
                        .map(drop)
                        .map_err(anyhow::Error::from)
                    }
                })
                .with_one_time_cleanup("close", move |_ctx| {
                    c2.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                })
            })
            .collect();

        let store = Arc::new(FixtureStore::new());
        let summary = Scheduler::new(config(4))
            .with_fixtures(store.clone())
            .run(descriptors)
            .await
            .unwrap();

        assert_eq!(summary.passed, 4);
        assert!(summary.run_failures.is_empty());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(at_dispose.load(Ordering::SeqCst), 1);
        assert!(!store.is_ready::<Connection>(FixtureScope::Class("s::Conn".to_string())));
    }

    #[tokio::test]
    async fn test_one_time_cleanup_failure_lands_in_summary() {
        let unit = passing("s::A", "a")
            .with_one_time_cleanup("shutdown", |_ctx| async { anyhow::bail!("port still bound") });
        let summary = Scheduler::new(config(1)).run(vec![unit]).await.unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.run_failures.len(), 1);
        assert_eq!(summary.run_failures[0].owner, "s::A");
        assert!(!summary.is_success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hung_body_keeps_its_keys_until_it_returns() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let record = |label: &'static str| {
            let events = events.clone();
            move || events.lock().push(label)
        };

        let (returned, cleaned, shut) = (
            record("hung body returned"),
            record("hung cleanup"),
            record("class cleanup"),
        );
        let ran = record("next body");
        let hung = Descriptor::new("s::Db", "hung", move |_ctx| {
            let returned = returned.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                returned();
                Ok(())
            }
        })
        .with_constraint_key("db")
        .with_timeout(Duration::from_millis(10))
        .with_cleanup("close", move |_ctx| {
            cleaned();
            async { Ok(()) }
        })
        .with_one_time_cleanup("shutdown", move |_ctx| {
            shut();
            async { Ok(()) }
        });
        let next = Descriptor::new("s::Db", "next", move |_ctx| {
            ran();
            async { Ok(()) }
        })
        .with_constraint_key("db");

        let sink = Arc::new(CollectingSink::new());
        let summary = Scheduler::new(config(2).with_hang_grace(Duration::from_millis(10)))
            .with_sink(sink.clone())
            .run(vec![hung, next])
            .await
            .unwrap();

        assert_eq!(
            *events.lock(),
            vec!["hung body returned", "hung cleanup", "next body", "class cleanup"]
        );
        assert_eq!(summary.units[0].outcome, Outcome::Cancelled);
        assert!(summary.units[0].failures().next().unwrap().hung);
        assert_eq!(summary.units[1].outcome, Outcome::Passed);
        // Reported when it timed out, ahead of the unit it was blocking
        assert_eq!(sink.units()[0].method_name, "hung");
        assert!(summary.run_failures.is_empty());
    }

    #[tokio::test]
    async fn test_hung_body_cleanup_failure_lands_in_summary() {
        let stubborn = Descriptor::new("s::A", "stubborn", |_ctx| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .with_timeout(Duration::from_millis(10))
        .with_cleanup("close", |_ctx| async { anyhow::bail!("socket still open") });

        let summary = Scheduler::new(config(1).with_hang_grace(Duration::from_millis(10)))
            .run(vec![stubborn])
            .await
            .unwrap();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.run_failures.len(), 1);
        assert_eq!(summary.run_failures[0].owner, summary.units[0].identity.to_string());
        assert_eq!(summary.run_failures[0].detail.kind, FailureKind::CleanupFailure);
    }

    struct Session {
        disposed: Arc<AtomicUsize>,
    }

    impl Fixture for Session {
        fn dispose(&self) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.disposed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn session_user(
        method: &str,
        sharing: Sharing,
        built: &Arc<AtomicUsize>,
        disposed: &Arc<AtomicUsize>,
    ) -> Descriptor {
        let (built, disposed) = (built.clone(), disposed.clone());
        Descriptor::new("s::Session", method, move |ctx| {
            let (built, disposed, sharing) = (built.clone(), disposed.clone(), sharing.clone());
            async move {
                ctx.fixture::<Session, _, _>(sharing, move || async move {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok(Session { disposed })
                })
                .await
                .map_err(anyhow::Error::from)?;
                if ctx.attempt() == 1 && ctx.property("flaky").is_some() {
                    anyhow::bail!("first attempt fails");
                }
                Ok::<_, anyhow::Error>(())
            }
        })
    }

    #[tokio::test]
    async fn test_same_scheduler_runs_twice_with_fresh_fixtures() {
        let built = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(config(2));

        for round in 1..=2 {
            let summary = scheduler
                .run(vec![
                    session_user("global", Sharing::Globally, &built, &disposed),
                    session_user("class", Sharing::PerClass, &built, &disposed),
                ])
                .await
                .unwrap();
            assert_eq!(summary.passed, 2, "run {round}");
            assert!(summary.run_failures.is_empty());
            assert_eq!(built.load(Ordering::SeqCst), 2 * round);
            assert_eq!(disposed.load(Ordering::SeqCst), 2 * round);
        }
    }

    #[tokio::test]
    async fn test_unshared_fixture_disposed_after_every_attempt() {
        let built = Arc::new(AtomicUsize::new(0));
        let disposed = Arc::new(AtomicUsize::new(0));
        let unit = session_user("scratch", Sharing::None, &built, &disposed)
            .with_property("flaky", "yes")
            .with_retries(1);

        let summary = Scheduler::new(config(1)).run(vec![unit]).await.unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.units[0].attempts.len(), 2);
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }
}
