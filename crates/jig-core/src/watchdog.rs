//! Run watchdog
//!
//! The heartbeat of the run: blinks the liveness indicators, counts the
//! global countdown down while the measurement session is open, detects
//! the all-stopped condition, and - once the countdown hits zero - does
//! the end-of-run work: restore the link, deliver the identity, wrap
//! and send the failure report, paint the verdict, declare the run
//! finished.

use crate::config::HarnessConfig;
use crate::item::CheckId;
use crate::report::{wrap_names, RunSummary, Verdict};
use crate::scoreboard::Scoreboard;
use crate::state::RunState;
use jig_hal::{Color, Companion, DisplayRef, LinkControl, MessageKind, StatusLed, StatusLeds};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Display cell blinked as the global liveness indicator
const ALIVE_CELL: DisplayRef = DisplayRef(0);

/// The watchdog task
pub struct Watchdog {
    config: HarnessConfig,
    board: Scoreboard,
    state: Arc<RunState>,
    leds: Arc<dyn StatusLeds>,
    link: Arc<dyn LinkControl>,
    companion: Arc<dyn Companion>,
    done: CancellationToken,
}

impl Watchdog {
    /// New watchdog; `done` is cancelled when the run is declared over
    #[must_use]
    pub fn new(
        config: HarnessConfig,
        board: Scoreboard,
        state: Arc<RunState>,
        leds: Arc<dyn StatusLeds>,
        link: Arc<dyn LinkControl>,
        companion: Arc<dyn Companion>,
        done: CancellationToken,
    ) -> Self {
        Self {
            config,
            board,
            state,
            leds,
            link,
            companion,
            done,
        }
    }

    /// Drive the heartbeat until the countdown expires, then produce
    /// the final report. Cancelling `done` externally (restart) ends
    /// the task early with whatever is on the table.
    pub async fn run(self) -> RunSummary {
        let mut beat = false;
        let mut ticker = tokio::time::interval(self.config.loop_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.state.countdown() > 0 {
            tokio::select! {
                () = self.done.cancelled() => {
                    tracing::info!("watchdog stopped externally");
                    return self.snapshot();
                }
                _ = ticker.tick() => {}
            }

            beat = !beat;
            self.heartbeat(beat);

            if self.board.registry().all_stopped() {
                tracing::info!("all items stopped");
                self.state.expire();
            }
        }

        let summary = self.finish().await;
        self.done.cancel();
        summary
    }

    fn heartbeat(&self, beat: bool) {
        let panel = self.board.panel();
        panel.set_color(
            ALIVE_CELL,
            if beat { Color::Green } else { Color::Background },
        );

        // the status cell shows progress only once the companion is up
        if self.board.passed(CheckId::ServerAddr) {
            let remaining = self.state.countdown();
            if self.state.session_open() {
                self.board
                    .color(CheckId::Status, if beat { Color::RunOn } else { Color::RunOff });
                self.board
                    .caption(CheckId::Status, &format!("RUNNING {remaining}"));
            } else {
                self.board
                    .color(CheckId::Status, if beat { Color::Red } else { Color::Background });
                self.board
                    .caption(CheckId::Status, &format!("SESSION {remaining}"));
            }
        }

        if beat {
            panel.refresh();
            if self.state.session_open() {
                self.state.tick();
            }
        }

        self.leds.set(StatusLed::Power, beat);
        self.leds.set(StatusLed::Alive, beat);
    }

    async fn finish(&self) -> RunSummary {
        let registry = self.board.registry();

        for name in registry.stragglers() {
            tracing::warn!(item = name, "never stopped");
        }

        // let an in-flight link switch settle before restoring the default
        while self.state.link_switching() {
            tokio::time::sleep(self.config.loop_interval()).await;
        }
        if let Err(error) = self.link.negotiate(self.config.default_link).await {
            tracing::warn!(%error, "could not restore default link speed");
        }
        tokio::time::sleep(self.config.loop_interval()).await;

        let server = self.state.server();
        if self.board.passed(CheckId::Identity) {
            if let (Some(server), Some(identity)) = (server, self.state.identity()) {
                if let Err(error) = self
                    .companion
                    .send(server, MessageKind::Identity, &identity, self.state.channel())
                    .await
                {
                    tracing::warn!(%error, "identity delivery failed");
                }
            }
        }

        self.board.caption(CheckId::Status, "FINISH");
        let summary = self.snapshot();

        for line in &summary.lines {
            tracing::info!(line, "failure report");
            if let Some(server) = server {
                if let Err(error) = self
                    .companion
                    .send(server, MessageKind::Error, line, self.state.channel())
                    .await
                {
                    tracing::warn!(%error, "failure report delivery failed");
                }
            }
        }
        for item in registry.iter() {
            if item.result() == crate::item::Outcome::Fail {
                self.board.panel().set_color(item.cell(), Color::Red);
            }
        }

        let verdict_color = match summary.verdict {
            Verdict::Pass => Color::Green,
            Verdict::Fail => Color::Red,
        };
        self.board.color(CheckId::Status, verdict_color);
        self.board.panel().refresh();
        tracing::info!(verdict = ?summary.verdict, "run finished");

        summary
    }

    /// Aggregate the registry as it stands right now.
    ///
    /// Workers are cancelled only after this snapshot, so a result that
    /// lands between an emergency stop and this point still counts.
    fn snapshot(&self) -> RunSummary {
        let failures = self.board.registry().failures();
        let lines = wrap_names(&failures, self.config.report_line_budget);
        let verdict = if failures.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        RunSummary {
            verdict,
            failures,
            lines,
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Outcome, Registry, Status};
    use jig_hal::sim::{SimCompanion, SimLink, SimPanel};
    use jig_hal::LinkSpeed;

    struct Rig {
        board: Scoreboard,
        state: Arc<RunState>,
        companion: Arc<SimCompanion>,
        link: Arc<SimLink>,
        done: CancellationToken,
    }

    fn rig(countdown: u32) -> (Watchdog, Rig) {
        let panel = Arc::new(SimPanel::new());
        let board = Scoreboard::new(Arc::new(Registry::new()), panel.clone());
        let state = Arc::new(RunState::new(countdown));
        let companion = Arc::new(SimCompanion::new());
        let link = Arc::new(SimLink::new());
        let done = CancellationToken::new();
        let config = HarnessConfig::new()
            .with_countdown_secs(countdown)
            .with_loop_interval_ms(10);
        let watchdog = Watchdog::new(
            config,
            board.clone(),
            state.clone(),
            panel,
            link.clone(),
            companion.clone(),
            done.clone(),
        );
        (
            watchdog,
            Rig {
                board,
                state,
                companion,
                link,
                done,
            },
        )
    }

    fn pass_everything(board: &Scoreboard) {
        for &id in &CheckId::ALL {
            board.registry().set_result(id, Outcome::Pass);
            board.registry().set_status(id, Status::Stop);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_stopped_ends_run_green() {
        let (watchdog, rig) = rig(60);
        rig.state.set_session_open();
        rig.state.set_server(rig.companion.server_addr());
        pass_everything(&rig.board);

        let summary = watchdog.run().await;

        assert_eq!(summary.verdict, Verdict::Pass);
        assert!(summary.failures.is_empty());
        assert!(rig.done.is_cancelled());
        // no failure report went out
        assert!(rig
            .companion
            .sent()
            .iter()
            .all(|m| m.kind != MessageKind::Error));
        // link restored to the default
        assert_eq!(rig.link.current().await, Some(LinkSpeed::Gbit1));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_names_stragglers() {
        let (watchdog, rig) = rig(2);
        rig.state.set_session_open();
        rig.state.set_server(rig.companion.server_addr());
        pass_everything(&rig.board);
        // sata never finished
        rig.board.registry().set_result(CheckId::Sata, Outcome::Fail);
        rig.board.registry().set_status(CheckId::Sata, Status::Run);

        let summary = watchdog.run().await;

        assert_eq!(summary.verdict, Verdict::Fail);
        assert_eq!(summary.failures, vec!["sata"]);
        assert_eq!(summary.lines, vec!["sata,"]);
        let errors: Vec<_> = rig
            .companion
            .sent()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].payload, "sata,");
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_does_not_tick_without_session() {
        let (watchdog, rig) = rig(5);
        // session never opens; expire via external cancel after a while
        let handle = tokio::spawn(watchdog.run());
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        assert_eq!(rig.state.countdown(), 5);
        rig.done.cancel();
        let _ = handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn identity_sent_when_passed() {
        let (watchdog, rig) = rig(1);
        rig.state.set_session_open();
        rig.state.set_server(rig.companion.server_addr());
        rig.state.set_identity("00:1e:06:a1:b2:c3".to_owned());
        pass_everything(&rig.board);
        rig.board.registry().set_status(CheckId::Emmc, Status::Run);

        let _ = watchdog.run().await;

        let identity: Vec<_> = rig
            .companion
            .sent()
            .into_iter()
            .filter(|m| m.kind == MessageKind::Identity)
            .collect();
        assert_eq!(identity.len(), 1);
        assert_eq!(identity[0].payload, "00:1e:06:a1:b2:c3");
    }
}
