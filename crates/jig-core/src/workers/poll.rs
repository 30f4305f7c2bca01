//! Throughput polling workers (storage and USB)
//!
//! Shared pattern: poll the presence predicate per item; on first
//! presence set Run, take the blocking measurement, classify against
//! the domain threshold. A passed item is never probed again; a failed
//! one stays armed and retries next poll. The task exits once every
//! item it owns has passed.

use crate::item::CheckId;
use crate::scoreboard::Scoreboard;
use jig_hal::{Probe, ProbeTarget, StorageDev, UsbPort};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const STORAGE_ITEMS: [(CheckId, ProbeTarget); 3] = [
    (CheckId::Emmc, ProbeTarget::Storage(StorageDev::Emmc)),
    (CheckId::Sata, ProbeTarget::Storage(StorageDev::Sata)),
    (CheckId::Nvme, ProbeTarget::Storage(StorageDev::Nvme)),
];

const USB_ITEMS: [(CheckId, ProbeTarget); 4] = [
    (CheckId::Usb30Up, ProbeTarget::Usb(UsbPort::Usb30Up)),
    (CheckId::Usb30Dn, ProbeTarget::Usb(UsbPort::Usb30Dn)),
    (CheckId::Usb20Up, ProbeTarget::Usb(UsbPort::Usb20Up)),
    (CheckId::Usb20Dn, ProbeTarget::Usb(UsbPort::Usb20Dn)),
];

/// Storage worker: eMMC, SATA, NVMe
pub async fn run_storage_worker(
    probe: Arc<dyn Probe>,
    board: Scoreboard,
    poll: Duration,
    shutdown: CancellationToken,
) {
    poll_items("storage", &STORAGE_ITEMS, false, probe, board, poll, shutdown).await;
}

/// USB worker: both 3.0 and both 2.0 ports
pub async fn run_usb_worker(
    probe: Arc<dyn Probe>,
    board: Scoreboard,
    poll: Duration,
    shutdown: CancellationToken,
) {
    poll_items("usb", &USB_ITEMS, true, probe, board, poll, shutdown).await;
}

async fn poll_items(
    domain: &'static str,
    items: &[(CheckId, ProbeTarget)],
    arm_at_start: bool,
    probe: Arc<dyn Probe>,
    board: Scoreboard,
    poll: Duration,
    shutdown: CancellationToken,
) {
    if arm_at_start {
        for &(id, _) in items {
            board.arm(id);
        }
    }

    loop {
        for &(id, target) in items {
            if board.passed(id) || !probe.ready(target) {
                continue;
            }
            board.begin(id);
            match probe.measure(target).await {
                Ok(rate) if rate > 0 => {
                    board.pass(id, &format!("{rate} MB/s"));
                }
                Ok(rate) => {
                    board.fail_attempt(id, &format!("{rate} MB/s"));
                }
                Err(error) => {
                    tracing::warn!(domain, item = id.name(), %error, "measurement error");
                    board.fail_attempt(id, "FAIL");
                }
            }
        }

        if items.iter().all(|&(id, _)| board.passed(id)) {
            tracing::info!(domain, "all items resolved, worker exiting");
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
    use crate::item::{Outcome, Registry, Status};
    use jig_hal::sim::{SimPanel, SimProbe};

    fn board() -> Scoreboard {
        Scoreboard::new(Arc::new(Registry::new()), Arc::new(SimPanel::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn storage_passes_when_devices_appear() {
        let probe = Arc::new(
            SimProbe::passing()
                .with_ready_after(ProbeTarget::Storage(StorageDev::Nvme), 2),
        );
        let board = board();

        run_storage_worker(
            probe,
            board.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        let registry = board.registry();
        for (id, _) in STORAGE_ITEMS {
            assert_eq!(registry.status(id), Status::Stop);
            assert_eq!(registry.result(id), Outcome::Pass);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn passed_item_is_never_probed_again() {
        let target = ProbeTarget::Storage(StorageDev::Emmc);
        let probe = Arc::new(
            SimProbe::passing()
                // sata and nvme need a few polls so emmc gets revisited
                .with_ready_after(ProbeTarget::Storage(StorageDev::Sata), 3)
                .with_ready_after(ProbeTarget::Storage(StorageDev::Nvme), 3),
        );
        let board = board();

        run_storage_worker(
            probe.clone(),
            board.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert!(board.passed(CheckId::Emmc));
        assert_eq!(probe.measure_count(target), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_retries_until_pass() {
        let target = ProbeTarget::Usb(UsbPort::Usb30Up);
        let probe = Arc::new(
            SimProbe::passing().with_measurements(target, vec![0, 0, 38]),
        );
        let board = board();

        run_usb_worker(
            probe.clone(),
            board.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(probe.measure_count(target), 3);
        assert!(board.passed(CheckId::Usb30Up));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_device_leaves_item_waiting() {
        let probe = Arc::new(
            SimProbe::passing().with_absent(ProbeTarget::Storage(StorageDev::Sata)),
        );
        let board = board();
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_storage_worker(
            probe,
            board.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        worker.await.unwrap();

        let registry = board.registry();
        assert_eq!(registry.status(CheckId::Sata), Status::Wait);
        assert_eq!(registry.result(CheckId::Sata), Outcome::Fail);
        // the others resolved normally
        assert!(board.passed(CheckId::Emmc));
        assert!(board.passed(CheckId::Nvme));
    }
}
