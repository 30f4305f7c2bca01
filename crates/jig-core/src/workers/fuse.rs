//! Fuse change-detect worker
//!
//! Re-reads the opaque fuse value every poll and passes an item the
//! instant a read differs from the previous one. The comparison is an
//! edge detect on the raw string; what the value means is irrelevant
//! here. Two items resolve on two separate observed changes.

use crate::item::CheckId;
use crate::scoreboard::Scoreboard;
use jig_hal::FuseStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FUSE_ITEMS: [CheckId; 2] = [CheckId::FuseUp, CheckId::FuseDn];

/// Fuse proxy worker task
pub async fn run_fuse_worker(
    fuse: Arc<dyn FuseStore>,
    board: Scoreboard,
    poll: Duration,
    shutdown: CancellationToken,
) {
    for id in FUSE_ITEMS {
        board.arm(id);
    }

    let mut last = fuse.read().unwrap_or_default();

    loop {
        for id in FUSE_ITEMS {
            if board.passed(id) {
                continue;
            }
            match fuse.read() {
                Ok(current) => {
                    if current != last {
                        last = current;
                        board.pass(id, "PASS");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "fuse read error");
                }
            }
        }

        if FUSE_ITEMS.iter().all(|&id| board.passed(id)) {
            return;
        }

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(poll) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Registry, Status};
    use jig_hal::sim::{SimFuse, SimPanel};

    fn board() -> Scoreboard {
        Scoreboard::new(Arc::new(Registry::new()), Arc::new(SimPanel::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn two_changes_pass_both_items() {
        // baseline "a", then two observed edges
        let fuse = Arc::new(SimFuse::scripted(vec!["a", "a", "b", "b", "c"]));
        let board = board();

        run_fuse_worker(
            fuse,
            board.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert!(board.passed(CheckId::FuseUp));
        assert!(board.passed(CheckId::FuseDn));
    }

    #[tokio::test(start_paused = true)]
    async fn stable_value_never_passes() {
        let fuse = Arc::new(SimFuse::stable("constant"));
        let board = board();
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_fuse_worker(
            fuse,
            board.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        worker.await.unwrap();

        let registry = board.registry();
        assert_eq!(registry.status(CheckId::FuseUp), Status::Run);
        assert_eq!(registry.status(CheckId::FuseDn), Status::Run);
    }

    #[tokio::test(start_paused = true)]
    async fn one_change_passes_only_first_item() {
        let fuse = Arc::new(SimFuse::scripted(vec!["a", "b"]));
        let board = board();
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_fuse_worker(
            fuse,
            board.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        worker.await.unwrap();

        assert!(board.passed(CheckId::FuseUp));
        assert!(!board.passed(CheckId::FuseDn));
    }
}
