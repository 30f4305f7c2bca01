//! Concurrent check workers
//!
//! One long-lived task per hardware domain, spawned once at the end of
//! bootstrap and never recreated. Workers never terminate the process;
//! an item that cannot resolve stays Wait/Run until the watchdog's
//! countdown runs out. Each worker holds a child cancellation token so
//! the end of the run shuts them down cleanly.

mod fuse;
mod jack;
mod poll;

pub use fuse::run_fuse_worker;
pub use jack::run_jack_worker;
pub use poll::{run_storage_worker, run_usb_worker};

use crate::config::HarnessConfig;
use crate::event::{run_remote_reader, EventBus};
use crate::fixture::Fixture;
use crate::scoreboard::Scoreboard;
use crate::state::RunState;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handles of the spawned worker tasks
#[derive(Debug)]
pub struct WorkerSet {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// Spawn the full worker complement: storage, USB, jack detect,
    /// fuse proxy, and the IR remote reader.
    #[must_use]
    pub fn spawn(
        config: &HarnessConfig,
        fixture: &Fixture,
        board: &Scoreboard,
        state: &Arc<RunState>,
        bus: EventBus,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let poll = config.worker_poll();

        let handles = vec![
            tokio::spawn(run_storage_worker(
                fixture.probe.clone(),
                board.clone(),
                poll,
                shutdown.child_token(),
            )),
            tokio::spawn(run_usb_worker(
                fixture.probe.clone(),
                board.clone(),
                poll,
                shutdown.child_token(),
            )),
            tokio::spawn(run_jack_worker(
                fixture.jack.clone(),
                board.clone(),
                state.clone(),
                shutdown.child_token(),
            )),
            tokio::spawn(run_fuse_worker(
                fixture.fuse.clone(),
                board.clone(),
                poll,
                shutdown.child_token(),
            )),
            tokio::spawn(run_remote_reader(
                fixture.remote.clone(),
                bus,
                board.clone(),
                shutdown.child_token(),
            )),
        ];

        tracing::info!(count = handles.len(), "check workers spawned");
        Self { shutdown, handles }
    }

    /// Cancel every worker and wait for the tasks to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "worker task panicked");
            }
        }
    }
}
