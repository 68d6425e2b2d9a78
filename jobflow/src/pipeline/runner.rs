//! Run registry enforcing one run per workspace.

use super::{Pipeline, PipelineRun, RunOptions};
use crate::cancellation::CancellationToken;
use crate::context::RunIdentity;
use crate::core::{PipelineState, RunStatus};
use crate::errors::JobflowError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque reference to a run started by a [`RunManager`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunHandle {
    run_id: Uuid,
    workspace: PathBuf,
}

impl RunHandle {
    /// The run ID.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The workspace the run holds.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

struct RunEntry {
    identity: RunIdentity,
    status: Arc<RwLock<RunStatus>>,
    token: Arc<CancellationToken>,
    task: Mutex<Option<JoinHandle<PipelineRun>>>,
}

/// Releases the workspace when the run task ends, however it ends.
struct WorkspaceLease {
    active: Arc<DashMap<PathBuf, Uuid>>,
    workspace: PathBuf,
    run_id: Uuid,
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        self.active
            .remove_if(&self.workspace, |_, holder| *holder == self.run_id);
        debug!(run_id = %self.run_id, workspace = %self.workspace.display(), "Workspace released");
    }
}

/// Starts pipeline runs in the background and answers status queries.
///
/// At most one run may hold a workspace at a time. Clones share the same
/// registry.
#[derive(Clone, Default)]
pub struct RunManager {
    runs: Arc<DashMap<Uuid, Arc<RunEntry>>>,
    active: Arc<DashMap<PathBuf, Uuid>>,
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("runs", &self.runs.len())
            .field("active", &self.active.len())
            .finish()
    }
}

impl RunManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `pipeline` over `state` on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`JobflowError::AlreadyRunning`] if another run holds the
    /// workspace.
    pub fn start(
        &self,
        workspace: impl AsRef<Path>,
        pipeline: Arc<Pipeline>,
        state: PipelineState,
    ) -> Result<RunHandle, JobflowError> {
        let workspace = normalize(workspace.as_ref());
        let identity = RunIdentity::new();
        let run_id = identity.run_id;

        match self.active.entry(workspace.clone()) {
            Entry::Occupied(_) => return Err(JobflowError::AlreadyRunning(workspace)),
            Entry::Vacant(slot) => {
                slot.insert(run_id);
            }
        }
        let lease = WorkspaceLease {
            active: self.active.clone(),
            workspace: workspace.clone(),
            run_id,
        };

        let status = Arc::new(RwLock::new(RunStatus::Idle));
        let token = Arc::new(CancellationToken::new());
        let observer = status.clone();
        let options = RunOptions::new()
            .with_run(identity.clone())
            .with_cancellation(token.clone())
            .with_status_callback(Arc::new(move |next: &RunStatus| {
                *observer.write() = next.clone();
            }));

        let task = tokio::spawn(async move {
            let _lease = lease;
            pipeline.run_with(state, options).await
        });

        self.runs.insert(
            run_id,
            Arc::new(RunEntry {
                identity,
                status,
                token,
                task: Mutex::new(Some(task)),
            }),
        );
        info!(%run_id, workspace = %workspace.display(), "Run started");

        Ok(RunHandle { run_id, workspace })
    }

    /// Returns the current status of a run.
    ///
    /// # Errors
    ///
    /// Returns [`JobflowError::UnknownRun`] if the handle is not registered.
    pub fn status(&self, handle: &RunHandle) -> Result<RunStatus, JobflowError> {
        let entry = self.entry(handle)?;
        let status = entry.status.read().clone();
        Ok(status)
    }

    /// Returns when the run was started.
    ///
    /// # Errors
    ///
    /// Returns [`JobflowError::UnknownRun`] if the handle is not registered.
    pub fn identity(&self, handle: &RunHandle) -> Result<RunIdentity, JobflowError> {
        Ok(self.entry(handle)?.identity.clone())
    }

    /// Requests cooperative cancellation. The running stage is abandoned and
    /// the run ends `Failed` with the given reason.
    ///
    /// # Errors
    ///
    /// Returns [`JobflowError::UnknownRun`] if the handle is not registered.
    pub fn cancel(&self, handle: &RunHandle, reason: impl Into<String>) -> Result<(), JobflowError> {
        let entry = self.entry(handle)?;
        entry.token.cancel(reason);
        info!(run_id = %handle.run_id, "Run cancellation requested");
        Ok(())
    }

    /// Waits for a run to finish and returns its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown, the result was already
    /// taken, or the task driving the run was aborted.
    pub async fn wait(&self, handle: &RunHandle) -> Result<PipelineRun, JobflowError> {
        let entry = self.entry(handle)?;
        let task = entry
            .task
            .lock()
            .take()
            .ok_or(JobflowError::AlreadyAwaited(handle.run_id))?;
        Ok(task.await?)
    }

    /// Returns true if a run currently holds the workspace.
    #[must_use]
    pub fn is_busy(&self, workspace: impl AsRef<Path>) -> bool {
        self.active.contains_key(&normalize(workspace.as_ref()))
    }

    /// Drops registry entries of finished runs. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.runs.len();
        self.runs
            .retain(|_, entry| !entry.status.read().is_terminal());
        before - self.runs.len()
    }

    /// Number of registered runs, finished or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if no run is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn entry(&self, handle: &RunHandle) -> Result<Arc<RunEntry>, JobflowError> {
        self.runs
            .get(&handle.run_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(JobflowError::UnknownRun(handle.run_id))
    }
}

fn normalize(workspace: &Path) -> PathBuf {
    std::path::absolute(workspace).unwrap_or_else(|_| workspace.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageContext;
    use crate::core::StateUpdate;
    use crate::errors::ErrorKind;
    use crate::pipeline::PipelineBuilder;
    use crate::stages::{FnStage, Stage, StageResult};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Blocks until released, so tests can observe a run mid-flight.
    #[derive(Debug)]
    struct GateStage {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Stage for GateStage {
        fn name(&self) -> &str {
            "gate"
        }

        async fn execute(&self, _ctx: &StageContext) -> StageResult {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(StateUpdate::final_output_path("done.pdf"))
        }
    }

    fn gated() -> (Arc<Pipeline>, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let pipeline = PipelineBuilder::new("gated")
            .stage(Arc::new(GateStage {
                entered: entered.clone(),
                release: release.clone(),
            }))
            .unwrap()
            .build()
            .unwrap();
        (Arc::new(pipeline), entered, release)
    }

    #[tokio::test]
    async fn test_status_transitions_to_completed() {
        let manager = RunManager::new();
        let (pipeline, entered, release) = gated();

        let handle = manager
            .start("/tmp/ws-a", pipeline, PipelineState::default())
            .unwrap();
        entered.notified().await;
        assert_eq!(
            manager.status(&handle).unwrap(),
            RunStatus::Running {
                stage: "gate".into()
            }
        );

        release.notify_one();
        let run = manager.wait(&handle).await.unwrap();

        assert!(run.is_success());
        assert_eq!(
            manager.status(&handle).unwrap(),
            RunStatus::Completed {
                output: Some("done.pdf".into())
            }
        );
        assert!(!manager.is_busy("/tmp/ws-a"));
    }

    #[tokio::test]
    async fn test_second_start_on_busy_workspace_fails() {
        let manager = RunManager::new();
        let (pipeline, entered, release) = gated();

        let handle = manager
            .start("/tmp/ws-b", pipeline.clone(), PipelineState::default())
            .unwrap();
        entered.notified().await;

        let err = manager
            .start("/tmp/ws-b", pipeline, PipelineState::default())
            .unwrap_err();
        assert!(matches!(err, JobflowError::AlreadyRunning(_)));

        // A different workspace is independent.
        let (quick, _, quick_release) = gated();
        quick_release.notify_one();
        let other = manager
            .start("/tmp/ws-c", quick, PipelineState::default())
            .unwrap();
        manager.wait(&other).await.unwrap();

        release.notify_one();
        manager.wait(&handle).await.unwrap();

        assert!(!manager.is_busy("/tmp/ws-b"));
    }

    #[tokio::test]
    async fn test_cancel_ends_run_failed() {
        let manager = RunManager::new();
        let (pipeline, entered, _release) = gated();

        let handle = manager
            .start("/tmp/ws-d", pipeline, PipelineState::default())
            .unwrap();
        entered.notified().await;
        manager.cancel(&handle, "user stopped the run").unwrap();

        let run = manager.wait(&handle).await.unwrap();
        assert_eq!(run.state.error.unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(
            manager.status(&handle).unwrap(),
            RunStatus::Failed {
                reason: "user stopped the run".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let manager = RunManager::new();
        let handle = RunHandle {
            run_id: Uuid::new_v4(),
            workspace: PathBuf::from("/nowhere"),
        };
        assert!(matches!(
            manager.status(&handle),
            Err(JobflowError::UnknownRun(_))
        ));
        assert!(manager.cancel(&handle, "x").is_err());
    }

    #[tokio::test]
    async fn test_wait_twice_and_prune() {
        let manager = RunManager::new();
        let pipeline = Arc::new(
            PipelineBuilder::new("quick")
                .stage(Arc::new(FnStage::new("noop", |_: &PipelineState| {
                    Ok(StateUpdate::empty())
                })))
                .unwrap()
                .build()
                .unwrap(),
        );

        let handle = manager
            .start("/tmp/ws-e", pipeline, PipelineState::default())
            .unwrap();
        manager.wait(&handle).await.unwrap();
        assert!(matches!(
            manager.wait(&handle).await,
            Err(JobflowError::AlreadyAwaited(_))
        ));

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.prune_finished(), 1);
        assert!(manager.is_empty());
    }
}
