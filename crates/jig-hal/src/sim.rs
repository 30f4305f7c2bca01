//! Scripted simulation backends
//!
//! Deterministic stand-ins for every adapter trait. Each one replays a
//! configured script (measurement sequences, timed input events, fuse
//! value changes) and records what the engine did to it, so tests and
//! `jig-harness simulate` can drive a full run without hardware.

use crate::bench::{HeaderBench, Level, Marker};
use crate::companion::{Companion, MessageKind, PrintChannel};
use crate::display::{Color, DisplayRef, Panel, StatusLed, StatusLeds};
use crate::error::HalError;
use crate::fuse::FuseStore;
use crate::input::{InputEvent, InputStream};
use crate::link::{LinkControl, LinkSpeed};
use crate::probe::{Probe, ProbeTarget, SystemProbe};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted probe: per-target readiness and measurement sequences
#[derive(Debug, Default)]
pub struct SimProbe {
    unready: Mutex<HashMap<ProbeTarget, usize>>,
    scripts: Mutex<HashMap<ProbeTarget, VecDeque<i64>>>,
    calls: Mutex<HashMap<ProbeTarget, usize>>,
}

impl SimProbe {
    /// Probe where every target is present and measures a passing value
    #[must_use]
    pub fn passing() -> Self {
        Self::default()
    }

    /// Target is reported absent forever
    #[must_use]
    pub fn with_absent(self, target: ProbeTarget) -> Self {
        self.unready.lock().insert(target, usize::MAX);
        self
    }

    /// Target becomes present only after `polls` readiness checks
    #[must_use]
    pub fn with_ready_after(self, target: ProbeTarget, polls: usize) -> Self {
        self.unready.lock().insert(target, polls);
        self
    }

    /// Measurements for `target`; the last value repeats
    #[must_use]
    pub fn with_measurements(self, target: ProbeTarget, values: Vec<i64>) -> Self {
        self.scripts.lock().insert(target, values.into());
        self
    }

    /// Number of times `measure` was invoked for `target`
    #[must_use]
    pub fn measure_count(&self, target: ProbeTarget) -> usize {
        self.calls.lock().get(&target).copied().unwrap_or(0)
    }

    fn default_value(target: ProbeTarget) -> i64 {
        match target {
            ProbeTarget::Storage(_) => 160,
            ProbeTarget::Usb(_) => 42,
            ProbeTarget::Hdmi(_) | ProbeTarget::Audio(_) => 1,
            ProbeTarget::System(SystemProbe::MemoryGb) => 8,
            ProbeTarget::System(SystemProbe::FbLines) => 1080,
            ProbeTarget::Adc(_) => 1800,
        }
    }
}

#[async_trait]
impl Probe for SimProbe {
    fn ready(&self, target: ProbeTarget) -> bool {
        let mut unready = self.unready.lock();
        match unready.get_mut(&target) {
            None | Some(0) => true,
            Some(n) if *n == usize::MAX => false,
            Some(n) => {
                *n -= 1;
                false
            }
        }
    }

    async fn measure(&self, target: ProbeTarget) -> Result<i64, HalError> {
        *self.calls.lock().entry(target).or_insert(0) += 1;
        let mut scripts = self.scripts.lock();
        let value = match scripts.get_mut(&target) {
            Some(seq) if seq.len() > 1 => seq.pop_front().unwrap_or_default(),
            Some(seq) => seq.front().copied().unwrap_or_default(),
            None => Self::default_value(target),
        };
        Ok(value)
    }
}

/// Link control that records the forced speed
#[derive(Debug)]
pub struct SimLink {
    speed: Mutex<Option<LinkSpeed>>,
    refuse: AtomicBool,
}

impl SimLink {
    /// Link that starts down and accepts every renegotiation
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: Mutex::new(None),
            refuse: AtomicBool::new(false),
        }
    }

    /// Every renegotiation fails
    #[must_use]
    pub fn refusing(self) -> Self {
        self.refuse.store(true, Ordering::Relaxed);
        self
    }
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkControl for SimLink {
    async fn current(&self) -> Option<LinkSpeed> {
        *self.speed.lock()
    }

    async fn negotiate(&self, speed: LinkSpeed) -> Result<(), HalError> {
        if self.refuse.load(Ordering::Relaxed) {
            return Err(HalError::command("ethtool", "link did not come up"));
        }
        *self.speed.lock() = Some(speed);
        Ok(())
    }
}

/// Recorded state of one panel cell
#[derive(Debug, Clone, Default)]
pub struct CellState {
    /// Last color written
    pub color: Option<Color>,
    /// Last text written
    pub text: Option<String>,
}

/// Panel that records every cell update for assertions
#[derive(Debug, Default)]
pub struct SimPanel {
    cells: Mutex<HashMap<u16, CellState>>,
    refreshes: AtomicUsize,
}

impl SimPanel {
    /// Fresh recording panel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last color written to `cell`
    #[must_use]
    pub fn color_of(&self, cell: DisplayRef) -> Option<Color> {
        self.cells.lock().get(&cell.0).and_then(|c| c.color)
    }

    /// Last text written to `cell`
    #[must_use]
    pub fn text_of(&self, cell: DisplayRef) -> Option<String> {
        self.cells.lock().get(&cell.0).and_then(|c| c.text.clone())
    }

    /// Number of refresh calls seen
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl Panel for SimPanel {
    fn set_color(&self, cell: DisplayRef, color: Color) {
        self.cells.lock().entry(cell.0).or_default().color = Some(color);
    }

    fn set_text(&self, cell: DisplayRef, text: &str) {
        self.cells.lock().entry(cell.0).or_default().text = Some(text.to_owned());
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }
}

impl StatusLeds for SimPanel {
    fn set(&self, _led: StatusLed, _on: bool) {}
}

/// Input stream replaying a timed script
#[derive(Debug)]
pub struct SimInput {
    script: Mutex<VecDeque<(Duration, InputEvent)>>,
    started: tokio::time::Instant,
    poll: Duration,
}

impl SimInput {
    /// Stream that never yields an event
    #[must_use]
    pub fn silent() -> Self {
        Self::scripted(Vec::new())
    }

    /// Stream replaying `events`, each tagged with its offset from start
    #[must_use]
    pub fn scripted(events: Vec<(Duration, InputEvent)>) -> Self {
        Self {
            script: Mutex::new(events.into()),
            started: tokio::time::Instant::now(),
            poll: Duration::from_millis(100),
        }
    }

    /// Append an event due `offset` after stream creation
    pub fn push(&self, offset: Duration, event: InputEvent) {
        self.script.lock().push_back((offset, event));
    }
}

#[async_trait]
impl InputStream for SimInput {
    async fn next(&self) -> Result<Option<InputEvent>, HalError> {
        let due = {
            let script = self.script.lock();
            script.front().map(|(at, _)| *at)
        };
        match due {
            Some(at) if at <= self.started.elapsed() => {
                Ok(self.script.lock().pop_front().map(|(_, ev)| ev))
            }
            Some(at) => {
                let remaining = at.saturating_sub(self.started.elapsed());
                tokio::time::sleep(remaining.min(self.poll)).await;
                Ok(None)
            }
            None => {
                tokio::time::sleep(self.poll).await;
                Ok(None)
            }
        }
    }
}

/// One message delivered to the simulated companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Message kind
    pub kind: MessageKind,
    /// Message payload
    pub payload: String,
    /// Printer slot
    pub channel: PrintChannel,
}

/// Companion service double
#[derive(Debug)]
pub struct SimCompanion {
    local: IpAddr,
    server: IpAddr,
    found_after: AtomicUsize,
    discover_calls: AtomicUsize,
    token: Mutex<Option<String>>,
    throughput_script: Mutex<VecDeque<i64>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl SimCompanion {
    /// Companion found on the first discovery attempt
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: IpAddr::V4(Ipv4Addr::new(192, 168, 0, 10)),
            server: IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2)),
            found_after: AtomicUsize::new(0),
            discover_calls: AtomicUsize::new(0),
            token: Mutex::new(Some("001e06aabbcc".to_owned())),
            throughput_script: Mutex::new(VecDeque::from([940])),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Discovery fails the first `attempts` times
    #[must_use]
    pub fn found_after(self, attempts: usize) -> Self {
        self.found_after.store(attempts, Ordering::Relaxed);
        self
    }

    /// Identity requests fail
    #[must_use]
    pub fn without_identity(self) -> Self {
        *self.token.lock() = None;
        self
    }

    /// Throughput measurements, Mbit/s; the last value repeats
    #[must_use]
    pub fn with_throughput(self, values: Vec<i64>) -> Self {
        *self.throughput_script.lock() = values.into();
        self
    }

    /// Server address handed out once discovered
    #[must_use]
    pub fn server_addr(&self) -> IpAddr {
        self.server
    }

    /// Number of discovery attempts seen
    #[must_use]
    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::Relaxed)
    }

    /// Every message delivered so far
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

impl Default for SimCompanion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Companion for SimCompanion {
    async fn local_addr(&self) -> Option<IpAddr> {
        Some(self.local)
    }

    async fn discover(&self) -> Option<IpAddr> {
        let calls = self.discover_calls.fetch_add(1, Ordering::Relaxed);
        if calls >= self.found_after.load(Ordering::Relaxed) {
            Some(self.server)
        } else {
            None
        }
    }

    async fn request_identity(&self, _board: &str) -> Result<String, HalError> {
        self.token
            .lock()
            .clone()
            .ok_or_else(|| HalError::command("identity request", "no token configured"))
    }

    async fn send(
        &self,
        _server: IpAddr,
        kind: MessageKind,
        payload: &str,
        channel: PrintChannel,
    ) -> Result<(), HalError> {
        self.sent.lock().push(SentMessage {
            kind,
            payload: payload.to_owned(),
            channel,
        });
        Ok(())
    }

    async fn throughput(&self, _server: IpAddr) -> Result<i64, HalError> {
        let mut script = self.throughput_script.lock();
        let value = if script.len() > 1 {
            script.pop_front().unwrap_or_default()
        } else {
            script.front().copied().unwrap_or_default()
        };
        Ok(value)
    }
}

/// Fuse store replaying a value sequence
#[derive(Debug)]
pub struct SimFuse {
    script: Mutex<VecDeque<String>>,
    current: Mutex<String>,
    written: Mutex<Vec<String>>,
    valid_prefix: String,
}

impl SimFuse {
    /// Fuse holding `value` forever (until written)
    #[must_use]
    pub fn stable(value: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            current: Mutex::new(value.into()),
            written: Mutex::new(Vec::new()),
            valid_prefix: "001e06".to_owned(),
        }
    }

    /// Fuse whose reads step through `values`; the last value sticks
    #[must_use]
    pub fn scripted(values: Vec<&str>) -> Self {
        let mut values: VecDeque<String> = values.into_iter().map(str::to_owned).collect();
        let first = values.pop_front().unwrap_or_default();
        Self {
            script: Mutex::new(values),
            current: Mutex::new(first),
            written: Mutex::new(Vec::new()),
            valid_prefix: "001e06".to_owned(),
        }
    }

    /// Values written by the engine
    #[must_use]
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }
}

impl FuseStore for SimFuse {
    fn read(&self) -> Result<String, HalError> {
        let mut current = self.current.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *current = next;
        }
        Ok(current.clone())
    }

    fn write(&self, value: &str) -> Result<(), HalError> {
        self.written.lock().push(value.to_owned());
        self.script.lock().clear();
        *self.current.lock() = value.to_owned();
        Ok(())
    }

    fn is_valid(&self, value: &str) -> bool {
        value.contains(&self.valid_prefix)
    }

    fn identity(&self, value: &str) -> Option<String> {
        let start = value.find(&self.valid_prefix)?;
        let token: String = value[start..].chars().take(12).collect();
        (token.len() == 12).then_some(token)
    }
}

/// Header bench that echoes driven levels back through the sampler
#[derive(Debug)]
pub struct SimBench {
    pin_map: Vec<(usize, u16)>,
    open_after: AtomicUsize,
    open: AtomicBool,
    markers: Mutex<HashMap<&'static str, i32>>,
    driven: Mutex<HashMap<u16, Level>>,
    faults: Mutex<HashMap<usize, u16>>,
}

impl SimBench {
    /// Bench for the given position→GPIO map, session opening first try
    #[must_use]
    pub fn new(pin_map: &[(usize, u16)]) -> Self {
        let mut markers = HashMap::new();
        markers.insert("supply", 5000);
        markers.insert("slot", 0);
        markers.insert("model_a", 0);
        markers.insert("model_b", 0);
        Self {
            pin_map: pin_map.to_vec(),
            open_after: AtomicUsize::new(0),
            open: AtomicBool::new(false),
            markers: Mutex::new(markers),
            driven: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Session open fails the first `attempts` times
    #[must_use]
    pub fn open_after(self, attempts: usize) -> Self {
        self.open_after.store(attempts, Ordering::Relaxed);
        self
    }

    /// Marker channel reads `millivolts`
    #[must_use]
    pub fn with_marker(self, marker: Marker, millivolts: i32) -> Self {
        self.markers.lock().insert(Self::key(marker), millivolts);
        self
    }

    /// Header position always samples `millivolts` regardless of drive
    #[must_use]
    pub fn with_pin_fault(self, position: usize, millivolts: u16) -> Self {
        self.faults.lock().insert(position, millivolts);
        self
    }

    fn key(marker: Marker) -> &'static str {
        match marker {
            Marker::Supply => "supply",
            Marker::Slot => "slot",
            Marker::ModelA => "model_a",
            Marker::ModelB => "model_b",
        }
    }
}

#[async_trait]
impl HeaderBench for SimBench {
    async fn open(&self) -> Result<(), HalError> {
        let left = self.open_after.load(Ordering::Relaxed);
        if left > 0 {
            self.open_after.store(left - 1, Ordering::Relaxed);
            return Err(HalError::NotPresent("measurement board".to_owned()));
        }
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read_marker(&self, marker: Marker) -> Result<i32, HalError> {
        Ok(self
            .markers
            .lock()
            .get(Self::key(marker))
            .copied()
            .unwrap_or(0))
    }

    fn configure(&self, _pins: &[u16]) -> Result<(), HalError> {
        Ok(())
    }

    fn drive(&self, pin: u16, level: Level) -> Result<(), HalError> {
        self.driven.lock().insert(pin, level);
        Ok(())
    }

    async fn sample(&self) -> Result<Vec<u16>, HalError> {
        let driven = self.driven.lock();
        let faults = self.faults.lock();
        let mut out = vec![0u16; 41];
        for &(position, gpio) in &self.pin_map {
            let mv = faults.get(&position).copied().unwrap_or_else(|| {
                match driven.get(&gpio) {
                    Some(Level::High) => 3300,
                    _ => 0,
                }
            });
            if let Some(slot) = out.get_mut(position) {
                *slot = mv;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StorageDev;

    #[tokio::test]
    async fn probe_script_replays_then_repeats() {
        let target = ProbeTarget::Storage(StorageDev::Emmc);
        let probe = SimProbe::passing().with_measurements(target, vec![10, 20]);

        assert_eq!(probe.measure(target).await.unwrap(), 10);
        assert_eq!(probe.measure(target).await.unwrap(), 20);
        assert_eq!(probe.measure(target).await.unwrap(), 20);
        assert_eq!(probe.measure_count(target), 3);
    }

    #[tokio::test]
    async fn probe_ready_after_counts_polls() {
        let target = ProbeTarget::Storage(StorageDev::Sata);
        let probe = SimProbe::passing().with_ready_after(target, 2);

        assert!(!probe.ready(target));
        assert!(!probe.ready(target));
        assert!(probe.ready(target));
    }

    #[tokio::test]
    async fn companion_found_after_n_attempts() {
        let companion = SimCompanion::new().found_after(3);

        assert!(companion.discover().await.is_none());
        assert!(companion.discover().await.is_none());
        assert!(companion.discover().await.is_none());
        assert!(companion.discover().await.is_some());
        assert_eq!(companion.discover_calls(), 4);
    }

    #[test]
    fn fuse_scripted_steps_and_sticks() {
        let fuse = SimFuse::scripted(vec!["a", "b"]);
        assert_eq!(fuse.read().unwrap(), "a");
        assert_eq!(fuse.read().unwrap(), "b");
        assert_eq!(fuse.read().unwrap(), "b");
    }

    #[test]
    fn fuse_identity_extraction() {
        let fuse = SimFuse::stable("xx001e06a1b2c3yy");
        assert!(fuse.is_valid("xx001e06a1b2c3yy"));
        assert_eq!(fuse.identity("xx001e06a1b2c3yy").unwrap(), "001e06a1b2c3");
        assert!(fuse.identity("deadbeef").is_none());
    }

    #[tokio::test]
    async fn bench_sample_follows_drive() {
        let bench = SimBench::new(&[(7, 14), (8, 126)]);
        bench.open().await.unwrap();
        bench.drive(14, Level::High).unwrap();
        bench.drive(126, Level::Low).unwrap();

        let sample = bench.sample().await.unwrap();
        assert_eq!(sample[7], 3300);
        assert_eq!(sample[8], 0);
    }
}
