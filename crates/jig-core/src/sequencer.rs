//! Run sequencer
//!
//! The main control flow: an ordered, retrying bootstrap, then a fixed
//! cadence steady-state loop that re-polls the idempotent one-shot
//! checks, advances the header pattern engine one pattern, and
//! dispatches at most one remote event. The loop ends when the watchdog
//! declares the run finished or the operator asks for a restart.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::event::{event_bus, RemoteEvent};
use crate::fixture::Fixture;
use crate::item::{CheckId, Registry};
use crate::pattern::PatternEngine;
use crate::report::RunSummary;
use crate::scoreboard::Scoreboard;
use crate::state::RunState;
use crate::watchdog::Watchdog;
use crate::workers::WorkerSet;
use jig_hal::{
    AdcInput, AudioChannel, Color, HdmiProbe, LinkSpeed, Marker, MessageKind, PrintChannel,
    ProbeTarget, SystemProbe,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// Jig marker thresholds, millivolts
const SUPPLY_MIN_MV: i32 = 2000;
const MARKER_SET_MV: i32 = 4000;

// Expected memory models selected by the jig markers, GB
const MODEL_A_GB: u32 = 4;
const MODEL_B_GB: u32 = 8;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The watchdog declared the run finished
    Finished(RunSummary),
    /// The operator asked for a restart; state is discarded
    Restart,
}

/// The test sequencer for one run
pub struct Sequencer {
    config: HarnessConfig,
    fixture: Fixture,
    board: Scoreboard,
    state: Arc<RunState>,
}

impl Sequencer {
    /// Build a sequencer over `fixture`
    #[must_use]
    pub fn new(config: HarnessConfig, fixture: Fixture) -> Self {
        let board = Scoreboard::new(Arc::new(Registry::new()), fixture.panel.clone());
        let state = Arc::new(RunState::new(config.countdown_secs));
        Self {
            config,
            fixture,
            board,
            state,
        }
    }

    /// The registry of this run (mainly for tests and callers)
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.board.registry().clone()
    }

    /// Execute one full run.
    ///
    /// Bootstrap in strict order, then the steady-state loop. Returns
    /// when the watchdog declares the run finished or the operator
    /// requests a restart.
    pub async fn run(self) -> Result<RunOutcome, HarnessError> {
        tracing::info!(board = %self.config.board, "run starting");

        let done = CancellationToken::new();
        let watchdog = Watchdog::new(
            self.config.clone(),
            self.board.clone(),
            self.state.clone(),
            self.fixture.leds.clone(),
            self.fixture.link.clone(),
            self.fixture.companion.clone(),
            done.clone(),
        );
        let watchdog = tokio::spawn(watchdog.run());

        // one-shot checks that need no network
        self.check_hdmi().await;
        self.check_system().await;

        // hard bootstrap dependency: the companion must exist
        self.discover_server().await;

        if let Err(error) = self.fixture.link.negotiate(self.config.default_link).await {
            tracing::warn!(%error, "default link negotiation failed");
        }
        // event-driven items wait for their trigger; only the cells are lit
        self.board.color(CheckId::Eth100m, Color::RunOn);
        self.board.color(CheckId::Eth1g, Color::RunOn);
        self.board.caption(CheckId::EthLed, "ORANGE");
        self.board.color(CheckId::AudioLeft, Color::RunOn);
        self.board.color(CheckId::AudioRight, Color::RunOn);

        self.provision_identity().await;
        self.check_throughput().await;
        self.open_session(&done).await;
        // memory model is only known once the session markers are read
        self.check_system().await;
        self.verify_memory_model();

        let (bus, mut tap) = event_bus();
        let workers = WorkerSet::spawn(
            &self.config,
            &self.fixture,
            &self.board,
            &self.state,
            bus,
        );

        let mut pattern = PatternEngine::new(
            self.fixture.bench.clone(),
            self.board.clone(),
            self.config.settle(),
        );

        let mut ticker = tokio::time::interval(self.config.loop_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let restart = loop {
            tokio::select! {
                () = done.cancelled() => break false,
                _ = ticker.tick() => {}
            }

            self.check_hdmi().await;
            self.check_system().await;
            self.check_adc().await;
            pattern.advance().await;

            let event = tap.drain();
            if event != RemoteEvent::None {
                tracing::info!(?event, "dispatching remote event");
            }
            if self.dispatch(event).await {
                break true;
            }
        };

        if restart {
            tracing::info!("restart requested, discarding run state");
            done.cancel();
            workers.shutdown().await;
            watchdog.abort();
            let _ = watchdog.await;
            return Ok(RunOutcome::Restart);
        }

        let summary = watchdog
            .await
            .map_err(|error| HarnessError::Internal(error.to_string()))?;
        workers.shutdown().await;
        Ok(RunOutcome::Finished(summary))
    }

    /// Dispatch one drained event; returns true on restart
    async fn dispatch(&self, event: RemoteEvent) -> bool {
        match event {
            RemoteEvent::None => {}
            RemoteEvent::SwitchEth100m => self.switch_link(LinkSpeed::Mbit100).await,
            RemoteEvent::SwitchEth1g => self.switch_link(LinkSpeed::Gbit1).await,
            RemoteEvent::AudioLeft => self.play_audio(AudioChannel::Left).await,
            RemoteEvent::AudioRight => self.play_audio(AudioChannel::Right).await,
            RemoteEvent::PrintIdentity => self.resend_identity().await,
            RemoteEvent::EmergencyStop => {
                tracing::warn!("emergency stop");
                self.state.expire();
            }
            RemoteEvent::Confirm => {
                if !self.board.passed(CheckId::Throughput) {
                    self.check_throughput().await;
                }
            }
            RemoteEvent::Restart => return true,
        }
        false
    }

    async fn check_hdmi(&self) {
        for (id, probe) in [
            (CheckId::Edid, HdmiProbe::Edid),
            (CheckId::HotPlug, HdmiProbe::HotPlug),
        ] {
            if self.board.passed(id) {
                continue;
            }
            self.board.begin(id);
            match self.fixture.probe.measure(ProbeTarget::Hdmi(probe)).await {
                Ok(value) if value != 0 => self.board.pass(id, "PASS"),
                Ok(_) => self.board.fail_attempt(id, "FAIL"),
                Err(error) => {
                    tracing::warn!(item = id.name(), %error, "hdmi probe error");
                    self.board.fail_attempt(id, "FAIL");
                }
            }
        }
    }

    async fn check_system(&self) {
        if !self.board.passed(CheckId::Memory) {
            self.board.begin(CheckId::Memory);
            match self
                .fixture
                .probe
                .measure(ProbeTarget::System(SystemProbe::MemoryGb))
                .await
            {
                Ok(gb) => {
                    self.state.set_measured_mem_gb(u32::try_from(gb.max(0)).unwrap_or(0));
                    let expected = self.state.expected_mem_gb();
                    if expected > 0 {
                        let caption = format!("{gb} / T-{expected} GB");
                        if gb == i64::from(expected) {
                            self.board.pass(CheckId::Memory, &caption);
                        } else {
                            self.board.fail_attempt(CheckId::Memory, &caption);
                        }
                    } else if gb > 0 {
                        self.board.pass(CheckId::Memory, &format!("{gb} GB"));
                    } else {
                        self.board.fail_attempt(CheckId::Memory, &format!("{gb} GB"));
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "memory probe error");
                    self.board.fail_attempt(CheckId::Memory, "FAIL");
                }
            }
        }

        if !self.board.passed(CheckId::Framebuffer) {
            self.board.begin(CheckId::Framebuffer);
            match self
                .fixture
                .probe
                .measure(ProbeTarget::System(SystemProbe::FbLines))
                .await
            {
                Ok(lines) => {
                    let caption = format!("{lines}P");
                    if lines == self.config.expected_fb_lines {
                        self.board.pass(CheckId::Framebuffer, &caption);
                    } else {
                        self.board.fail_attempt(CheckId::Framebuffer, &caption);
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "framebuffer probe error");
                    self.board.fail_attempt(CheckId::Framebuffer, "FAIL");
                }
            }
        }
    }

    /// A memory pass recorded before the jig markers were readable is
    /// re-judged against the expected model; a mismatch overrides it.
    fn verify_memory_model(&self) {
        let expected = self.state.expected_mem_gb();
        let measured = self.state.measured_mem_gb();
        if expected > 0 && measured > 0 && measured != expected {
            let caption = format!("{measured} / T-{expected} GB");
            tracing::warn!(measured, expected, "memory does not match the test model");
            self.board.fail_stop(CheckId::Memory, &caption);
        }
    }

    async fn check_adc(&self) {
        for (id, input) in [
            (CheckId::Adc37, AdcInput::Header37),
            (CheckId::Adc40, AdcInput::Header40),
        ] {
            if self.board.passed(id) {
                continue;
            }
            self.board.begin(id);
            match self.fixture.probe.measure(ProbeTarget::Adc(input)).await {
                Ok(value) if value != 0 => self.board.pass(id, &value.to_string()),
                Ok(value) => self.board.fail_attempt(id, &value.to_string()),
                Err(error) => {
                    tracing::warn!(item = id.name(), %error, "adc probe error");
                    self.board.fail_attempt(id, "FAIL");
                }
            }
        }
    }

    /// Resolve our own address, then find the companion. The run cannot
    /// proceed without it: unbounded retry with a visible "searching"
    /// indication.
    async fn discover_server(&self) {
        self.board.begin(CheckId::BoardAddr);
        loop {
            if let Some(addr) = self.fixture.companion.local_addr().await {
                self.board.pass_quiet(CheckId::BoardAddr, &addr.to_string());

                self.board.begin(CheckId::ServerAddr);
                if let Some(server) = self.fixture.companion.discover().await {
                    self.state.set_server(server);
                    self.board.pass_quiet(CheckId::ServerAddr, &server.to_string());
                    tracing::info!(%server, "companion found");
                    return;
                }
                self.board.color(CheckId::ServerAddr, Color::Red);
                tracing::debug!("companion not found, searching");
            } else {
                self.board.color(CheckId::BoardAddr, Color::Red);
                tracing::debug!("no local address yet");
            }
            tokio::time::sleep(self.config.discover_retry()).await;
        }
    }

    /// Read the fuse; when the value is invalid, request a token from
    /// the companion, write it and re-validate.
    async fn provision_identity(&self) {
        self.board.begin(CheckId::Identity);

        let fuse = &self.fixture.fuse;
        let mut value = match fuse.read() {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "fuse unreadable");
                self.board.fail_stop(CheckId::Identity, "FAIL");
                return;
            }
        };

        if !fuse.is_valid(&value) {
            tracing::info!("fuse blank, requesting identity from companion");
            match self.fixture.companion.request_identity(&self.config.board).await {
                Ok(token) => {
                    if let Err(error) = fuse.write(&token) {
                        tracing::warn!(%error, "fuse write failed");
                    }
                    match fuse.read() {
                        Ok(reread) => value = reread,
                        Err(error) => tracing::warn!(%error, "fuse re-read failed"),
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "identity request failed");
                }
            }
        }

        if fuse.is_valid(&value) {
            if let Some(token) = fuse.identity(&value) {
                let formatted = format_identity(&token);
                self.state.set_identity(formatted.clone());
                self.board.pass(CheckId::Identity, &formatted);
                return;
            }
        }
        self.board.fail_stop(CheckId::Identity, "FAIL");
    }

    /// Baseline throughput against the companion endpoint; bounded
    /// retries, first success wins.
    async fn check_throughput(&self) {
        let Some(server) = self.state.server() else {
            self.board.fail_stop(CheckId::Throughput, "FAIL");
            return;
        };
        let companion = &self.fixture.companion;
        let channel = self.state.channel();

        for attempt in 1..=self.config.throughput_attempts {
            self.board.begin(CheckId::Throughput);
            let _ = companion.send(server, MessageKind::Udp, "start", channel).await;
            tokio::time::sleep(self.config.loop_interval()).await;
            let rate = match companion.throughput(server).await {
                Ok(rate) => rate,
                Err(error) => {
                    tracing::warn!(%error, attempt, "throughput measurement error");
                    0
                }
            };
            let _ = companion.send(server, MessageKind::Udp, "stop", channel).await;
            tokio::time::sleep(self.config.loop_interval()).await;

            let caption = format!("{rate} Mbits/sec");
            if rate > self.config.throughput_floor_mbit {
                self.board.pass(CheckId::Throughput, &caption);
                return;
            }
            tracing::warn!(rate, attempt, "below throughput floor");
            self.board.fail_stop(CheckId::Throughput, &caption);
            tokio::time::sleep(self.config.loop_interval()).await;
        }
    }

    /// Open the measurement session and read the jig markers. The
    /// countdown only runs once this session is open.
    async fn open_session(&self, done: &CancellationToken) {
        loop {
            if done.is_cancelled() {
                return;
            }
            match self.fixture.bench.open().await {
                Ok(()) => {
                    let supply = self
                        .fixture
                        .bench
                        .read_marker(Marker::Supply)
                        .await
                        .unwrap_or(0);
                    if supply > SUPPLY_MIN_MV {
                        self.read_jig_markers().await;
                        self.state.set_session_open();
                        tracing::info!("measurement session open");
                        return;
                    }
                    tracing::debug!(supply, "supply rail not present yet");
                }
                Err(error) => {
                    tracing::debug!(%error, "measurement board not ready");
                }
            }
            tokio::time::sleep(self.config.session_retry()).await;
        }
    }

    async fn read_jig_markers(&self) {
        let bench = &self.fixture.bench;

        let slot = bench.read_marker(Marker::Slot).await.unwrap_or(0);
        self.state.set_channel(if slot > MARKER_SET_MV {
            PrintChannel::Right
        } else {
            PrintChannel::Left
        });

        let mut model = 0;
        if bench.read_marker(Marker::ModelA).await.unwrap_or(0) > MARKER_SET_MV {
            model = MODEL_A_GB;
        }
        if bench.read_marker(Marker::ModelB).await.unwrap_or(0) > MARKER_SET_MV {
            model = MODEL_B_GB;
        }
        self.state.set_expected_mem_gb(model);
        tracing::info!(?model, channel = ?self.state.channel(), "jig markers read");
    }

    /// Renegotiate the link on operator request; the LED mirror item
    /// follows with no probe of its own.
    async fn switch_link(&self, speed: LinkSpeed) {
        let id = match speed {
            LinkSpeed::Mbit100 => CheckId::Eth100m,
            LinkSpeed::Gbit1 => CheckId::Eth1g,
        };
        if self.board.passed(id) {
            return;
        }
        if self.fixture.link.current().await == Some(speed) {
            tracing::debug!(%speed, "link already at requested speed");
            return;
        }

        self.state.set_link_switching(true);
        self.board.begin(id);
        self.board.color(CheckId::EthLed, Color::Yellow);

        match self.fixture.link.negotiate(speed).await {
            Ok(()) => {
                self.board.pass(id, "PASS");
                let (caption, color) = match speed {
                    LinkSpeed::Mbit100 => ("GREEN", Color::DarkCyan),
                    LinkSpeed::Gbit1 => ("ORANGE", Color::DarkKhaki),
                };
                self.board.caption(CheckId::EthLed, caption);
                self.board.color(CheckId::EthLed, color);
            }
            Err(error) => {
                tracing::warn!(%speed, %error, "link renegotiation failed");
            }
        }
        self.state.set_link_switching(false);
    }

    /// Audio playback, gated on the jack being inserted
    async fn play_audio(&self, channel: AudioChannel) {
        if !self.state.jack_inserted() {
            tracing::debug!(?channel, "audio requested with jack removed");
            return;
        }
        let id = match channel {
            AudioChannel::Left => CheckId::AudioLeft,
            AudioChannel::Right => CheckId::AudioRight,
        };
        if self.board.passed(id) {
            return;
        }
        self.board.begin(id);
        match self.fixture.probe.measure(ProbeTarget::Audio(channel)).await {
            Ok(value) if value != 0 => self.board.pass(id, "PASS"),
            Ok(_) => self.board.fail_attempt(id, "FAIL"),
            Err(error) => {
                tracing::warn!(?channel, %error, "audio probe error");
                self.board.fail_attempt(id, "FAIL");
            }
        }
    }

    async fn resend_identity(&self) {
        if !self.board.passed(CheckId::Identity) {
            return;
        }
        if let (Some(server), Some(identity)) = (self.state.server(), self.state.identity()) {
            if let Err(error) = self
                .fixture
                .companion
                .send(server, MessageKind::Identity, &identity, self.state.channel())
                .await
            {
                tracing::warn!(%error, "identity re-send failed");
            }
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer").finish_non_exhaustive()
    }
}

/// Format a 12-hex-digit identity token as colon-separated pairs
#[must_use]
pub fn format_identity(token: &str) -> String {
    let mut out = String::with_capacity(17);
    for (idx, ch) in token.chars().take(12).enumerate() {
        if idx > 0 && idx % 2 == 0 {
            out.push(':');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}
