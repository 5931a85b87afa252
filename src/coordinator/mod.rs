//! Run coordinator
//!
//! Keeps at most one job per target, shares one automation server across
//! all running jobs and publishes a [`RunState`] plus step index per target.
//!
//! Final states are published while holding the job table lock, and jobs
//! are registered under the same lock, so for each run a target moves
//! through one of:
//!
//! - `Running -> Finished { completed: true }`
//! - `Running -> Error { .. }`
//! - `Running -> Cancelling -> Finished { completed: false }`

pub mod server;
pub mod state;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::driver::DriverFactory;
use crate::runner::{EventRunner, RunnerSettings};
use crate::scenario::{Scenario, ScenarioCatalog};
use crate::target::{Target, TargetId};

pub use server::{Readiness, ServerSettings, SharedServer};
pub use state::{RunState, StatusBoard, StatusMap, TargetStatus};

/// Reservation of a target, held from `run` until its final state is published
///
/// A job that fails before its runner starts (unknown scenario, server launch
/// failure) releases the reservation in the same step that publishes `Error`.
struct Job {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Owns every target's job and the shared server
pub struct Coordinator {
    targets: BTreeMap<TargetId, Target>,
    catalog: ScenarioCatalog,
    drivers: Arc<dyn DriverFactory>,
    settings: RunnerSettings,
    /// `None` when drivers need no server (dry runs)
    server: Option<SharedServer>,
    jobs: Mutex<HashMap<TargetId, Job>>,
    status: StatusBoard,
}

impl Coordinator {
    pub fn new(
        targets: Vec<Target>,
        catalog: ScenarioCatalog,
        drivers: Arc<dyn DriverFactory>,
        settings: RunnerSettings,
        server: Option<SharedServer>,
    ) -> Arc<Self> {
        let status = StatusBoard::new(&targets);
        Arc::new(Self {
            targets: targets.into_iter().map(|t| (t.id, t)).collect(),
            catalog,
            drivers,
            settings,
            server,
            jobs: Mutex::new(HashMap::new()),
            status,
        })
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<TargetId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Watch every target's status
    pub fn subscribe(&self) -> watch::Receiver<StatusMap> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> StatusMap {
        self.status.snapshot()
    }

    pub fn status(&self, id: TargetId) -> Option<TargetStatus> {
        self.status.get(id)
    }

    pub fn has_job(&self, id: TargetId) -> bool {
        self.jobs().contains_key(&id)
    }

    pub fn server(&self) -> Option<&SharedServer> {
        self.server.as_ref()
    }

    /// Start a job for `id`; does nothing when one is already running
    ///
    /// Only reserves the target and spawns the job, so dropping the returned
    /// future never strands a reservation. Scenario lookup, server launch and
    /// the run itself happen inside the job; their failures only show up as
    /// the target's state.
    pub async fn run(self: &Arc<Self>, id: TargetId) -> Result<()> {
        let target = self
            .targets
            .get(&id)
            .cloned()
            .ok_or(Error::TargetNotFound(id.0))?;

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        {
            let mut jobs = self.jobs();
            if jobs.contains_key(&id) {
                tracing::debug!(target_id = %id, "Job already running");
                return Ok(());
            }
            jobs.insert(
                id,
                Job {
                    cancel: cancel.clone(),
                    done: done_rx,
                },
            );
            self.status.set_state(id, RunState::Running);
        }
        tracing::info!(target_id = %id, target_name = %target.name, "Run started");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.execute(id, target, &cancel).await;
            this.complete(id, &cancel, result);
            let _ = done_tx.send(true);
        });

        Ok(())
    }

    /// Resolve the scenario, hold the shared server and drive the run
    async fn execute(&self, id: TargetId, target: Target, cancel: &CancellationToken) -> Result<()> {
        let scenario = self.catalog.resolve(&target.scenario_name)?;

        if let Some(server) = &self.server {
            let config = &target.configuration;
            server.acquire(&config.host, config.port, cancel).await?;
        }

        let result = self.drive(id, target, scenario, cancel).await;

        if let Some(server) = &self.server {
            server.release().await;
        }
        result
    }

    /// Run the scenario on its own task while forwarding step progress
    async fn drive(&self, id: TargetId, target: Target, scenario: Scenario, cancel: &CancellationToken) -> Result<()> {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let driver = self.drivers.create(&target);
        let mut runner = EventRunner::new(driver, target, self.settings.clone(), cancel.clone());

        let mut runner_task = tokio::spawn(async move { runner.run(&scenario, &progress_tx).await });

        let result = loop {
            tokio::select! {
                biased;
                Some(index) = progress_rx.recv() => self.status.set_index(id, index),
                joined = &mut runner_task => {
                    break joined.unwrap_or_else(|e| Err(Error::Internal(format!("Run task failed: {}", e))));
                }
            }
        };
        while let Ok(index) = progress_rx.try_recv() {
            self.status.set_index(id, index);
        }
        result
    }

    /// Publish the final state and remove the job
    fn complete(&self, id: TargetId, cancel: &CancellationToken, result: Result<()>) {
        let mut jobs = self.jobs();

        let state = match result {
            _ if cancel.is_cancelled() => RunState::Finished { completed: false },
            Ok(()) => RunState::Finished { completed: true },
            Err(e) if e.is_cancelled() => RunState::Finished { completed: false },
            Err(e) => RunState::Error {
                message: e.diagnostic(),
            },
        };

        match &state {
            RunState::Error { message } => tracing::error!(target_id = %id, error = %message, "Run failed"),
            other => tracing::info!(target_id = %id, state = %other, "Run ended"),
        }

        self.status.set_state(id, state);
        jobs.remove(&id);
    }

    /// Mark the job cancelling and signal it; `None` when no job runs
    fn request_cancel(&self, id: TargetId) -> Option<watch::Receiver<bool>> {
        let jobs = self.jobs();
        let job = jobs.get(&id)?;
        if !job.cancel.is_cancelled() {
            tracing::info!(target_id = %id, "Cancelling run");
            self.status.set_state(id, RunState::Cancelling);
            job.cancel.cancel();
        }
        Some(job.done.clone())
    }

    /// Ask the job for `id` to stop and wait until it has unwound
    pub async fn cancel(&self, id: TargetId) {
        if let Some(mut done) = self.request_cancel(id) {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Cancel every running job and wait for all of them
    pub async fn cancel_all(&self) {
        let ids: Vec<TargetId> = self.jobs().keys().copied().collect();
        let receivers: Vec<_> = ids
            .into_iter()
            .filter_map(|id| self.request_cancel(id))
            .collect();
        for mut done in receivers {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Wait until every job running now has ended
    pub async fn wait_all(&self) {
        let receivers: Vec<watch::Receiver<bool>> =
            self.jobs().values().map(|job| job.done.clone()).collect();
        for mut done in receivers {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, MockDriver};
    use std::path::Path;
    use std::time::Duration;

    fn target(id: u64, scenario: &str) -> Target {
        let mut target = Target::sample();
        target.id = TargetId(id);
        target.name = format!("target-{}", id);
        target.scenario_name = scenario.to_string();
        target
    }

    fn coordinator(driver: &MockDriver, root: &Path, targets: Vec<Target>, scenarios: &Path) -> Arc<Coordinator> {
        Coordinator::new(
            targets,
            ScenarioCatalog::new(Some(scenarios.to_path_buf())),
            Arc::new(driver.clone()),
            RunnerSettings {
                settle_delay: Duration::ZERO,
                crop_status_bar: false,
                screenshot_root: root.to_path_buf(),
            },
            None,
        )
    }

    fn write_scenario(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{}.yaml", name)), body).unwrap();
    }

    const THREE_KEYS: &str = "steps:\n  - action: key_press\n    key_code: 1\n    wait_ms: 0\n  - action: key_press\n    key_code: 2\n    wait_ms: 0\n  - action: key_press\n    key_code: 3\n    wait_ms: 0\n";

    async fn wait_for_state(coordinator: &Coordinator, id: TargetId, pred: impl Fn(&RunState) -> bool) -> TargetStatus {
        let mut rx = coordinator.subscribe();
        let status = tokio::time::timeout(
            Duration::from_secs(10),
            rx.wait_for(|map| map.get(&id).is_some_and(|s| pred(&s.run_state))),
        )
        .await
        .expect("state not reached")
        .unwrap();
        status.get(&id).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let root = tempfile::tempdir().unwrap();
        let scenarios = tempfile::tempdir().unwrap();
        write_scenario(scenarios.path(), "keys", THREE_KEYS);
        let driver = MockDriver::new();
        let coordinator = coordinator(&driver, root.path(), vec![target(1, "keys")], scenarios.path());

        assert_eq!(coordinator.status(TargetId(1)).unwrap().run_state, RunState::Idle);
        coordinator.run(TargetId(1)).await.unwrap();
        coordinator.wait_all().await;

        let status = coordinator.status(TargetId(1)).unwrap();
        assert_eq!(status.run_state, RunState::Finished { completed: true });
        assert_eq!(status.current_index, Some(2));
        assert!(!coordinator.has_job(TargetId(1)));
        assert!(driver.calls().contains(&DriverCall::PressKey(3)));
    }

    #[tokio::test]
    async fn test_unknown_scenario_is_error_state() {
        let root = tempfile::tempdir().unwrap();
        let scenarios = tempfile::tempdir().unwrap();
        let driver = MockDriver::new();
        let coordinator = coordinator(&driver, root.path(), vec![target(1, "nope")], scenarios.path());

        coordinator.run(TargetId(1)).await.unwrap();
        let status = wait_for_state(&coordinator, TargetId(1), |s| !s.is_active()).await;
        assert!(matches!(status.run_state, RunState::Error { message } if message.contains("nope")));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let driver = MockDriver::new();
        let coordinator = coordinator(&driver, root.path(), vec![], root.path());
        assert!(matches!(
            coordinator.run(TargetId(4)).await,
            Err(Error::TargetNotFound(4))
        ));
    }

    #[tokio::test]
    async fn test_element_failure_does_not_affect_other_target() {
        let root = tempfile::tempdir().unwrap();
        let scenarios = tempfile::tempdir().unwrap();
        write_scenario(scenarios.path(), "keys", THREE_KEYS);
        write_scenario(
            scenarios.path(),
            "broken",
            "steps:\n  - action: tap\n    target: \"id:missing\"\n",
        );
        let driver = MockDriver::new().fail_on(crate::scenario::Selector::id("missing"));
        let coordinator = coordinator(
            &driver,
            root.path(),
            vec![target(1, "keys"), target(2, "broken")],
            scenarios.path(),
        );

        coordinator.run(TargetId(1)).await.unwrap();
        coordinator.run(TargetId(2)).await.unwrap();
        coordinator.wait_all().await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot[&TargetId(1)].run_state, RunState::Finished { completed: true });
        assert!(matches!(
            &snapshot[&TargetId(2)].run_state,
            RunState::Error { message } if message.contains("Element not found: id=missing")
        ));
    }

    #[tokio::test]
    async fn test_cancel_mid_scenario() {
        let root = tempfile::tempdir().unwrap();
        let scenarios = tempfile::tempdir().unwrap();
        write_scenario(
            scenarios.path(),
            "slow",
            "steps:\n  - action: key_press\n    key_code: 1\n    wait_ms: 0\n  - action: key_press\n    key_code: 2\n    wait_ms: 60000\n  - action: key_press\n    key_code: 3\n",
        );
        let driver = MockDriver::new();
        let coordinator = coordinator(&driver, root.path(), vec![target(1, "slow")], scenarios.path());

        let mut rx = coordinator.subscribe();
        coordinator.run(TargetId(1)).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(10),
            rx.wait_for(|map| map[&TargetId(1)].current_index == Some(1)),
        )
        .await
        .unwrap()
        .unwrap();

        coordinator.cancel(TargetId(1)).await;

        let status = coordinator.status(TargetId(1)).unwrap();
        assert_eq!(status.run_state, RunState::Finished { completed: false });
        assert_eq!(status.current_index, Some(1));
        assert!(!driver.calls().contains(&DriverCall::PressKey(3)));
        assert!(!coordinator.has_job(TargetId(1)));

        // nothing left to cancel
        coordinator.cancel(TargetId(1)).await;
        assert_eq!(
            coordinator.status(TargetId(1)).unwrap().run_state,
            RunState::Finished { completed: false }
        );
    }
}
