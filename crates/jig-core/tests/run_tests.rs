//! End-to-end runs against the scripted simulation fixture
//!
//! Run with: cargo test --package jig-core --test run_tests

use jig_core::{CheckId, Fixture, HarnessConfig, RunOutcome, Sequencer, Verdict};
use jig_hal::sim::{SimBench, SimCompanion, SimFuse, SimInput, SimLink, SimPanel, SimProbe};
use jig_hal::{InputEvent, MessageKind, ProbeTarget, StorageDev, SW_HEADPHONE_INSERT};
use std::sync::Arc;
use std::time::Duration;

// Remote key codes driving the event-dependent checks
const KEY_VOLUMEDOWN: u16 = 114; // switch to 100M
const KEY_VOLUMEUP: u16 = 115; // switch to 1G
const KEY_LEFT: u16 = 105; // left audio
const KEY_RIGHT: u16 = 106; // right audio
const KEY_HOME: u16 = 102; // emergency stop
const KEY_BACK: u16 = 158; // restart

fn key(code: u16) -> InputEvent {
    InputEvent::Key { code }
}

fn jack(engaged: bool) -> InputEvent {
    InputEvent::Switch {
        code: SW_HEADPHONE_INSERT,
        engaged,
    }
}

/// Remote script that exercises every event-driven check
fn full_remote_script() -> Vec<(Duration, InputEvent)> {
    vec![
        (Duration::from_millis(600), key(KEY_VOLUMEDOWN)),
        (Duration::from_millis(1800), key(KEY_VOLUMEUP)),
        (Duration::from_millis(3000), key(KEY_LEFT)),
        (Duration::from_millis(3600), key(KEY_RIGHT)),
    ]
}

/// Jack script: insert early, remove once audio had its window
fn full_jack_script() -> Vec<(Duration, InputEvent)> {
    vec![
        (Duration::from_millis(200), jack(true)),
        (Duration::from_millis(5000), jack(false)),
    ]
}

struct SimRun {
    fixture: Fixture,
    panel: Arc<SimPanel>,
    companion: Arc<SimCompanion>,
}

fn sim_fixture(
    probe: SimProbe,
    companion: SimCompanion,
    remote: Vec<(Duration, InputEvent)>,
    jack_events: Vec<(Duration, InputEvent)>,
) -> SimRun {
    let panel = Arc::new(SimPanel::new());
    let companion = Arc::new(companion);
    let fixture = Fixture {
        probe: Arc::new(probe),
        link: Arc::new(SimLink::new()),
        panel: panel.clone(),
        leds: panel.clone(),
        remote: Arc::new(SimInput::scripted(remote)),
        jack: Arc::new(SimInput::scripted(jack_events)),
        companion: companion.clone(),
        // identity provisioning and the worker baseline each consume one
        // read before the two edges the fuse items wait for
        fuse: Arc::new(SimFuse::scripted(vec![
            "001e06a1b2c3",
            "001e06a1b2c3",
            "001e06a1b2c3",
            "001e06a1b2c3-x",
            "001e06a1b2c3-y",
        ])),
        bench: Arc::new(SimBench::new(&jig_core::DRIVEN)),
    };
    SimRun {
        fixture,
        panel,
        companion,
    }
}

fn quick_config() -> HarnessConfig {
    // short cadences so paused-clock tests converge fast; the countdown
    // ticks once per two beats, so 60 units outlives the whole script
    let mut config = HarnessConfig::new().with_countdown_secs(60);
    config.loop_interval_ms = 100;
    config.worker_poll_ms = 100;
    config.session_retry_ms = 100;
    config.discover_retry_ms = 100;
    config.settle_ms = 10;
    config
}

#[tokio::test(start_paused = true)]
async fn green_run_sends_no_failure_message() {
    let run = sim_fixture(
        SimProbe::passing(),
        SimCompanion::new(),
        full_remote_script(),
        full_jack_script(),
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    let RunOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(summary.verdict, Verdict::Pass, "failures: {:?}", summary.failures);
    assert!(summary.failures.is_empty());

    let sent = run.companion.sent();
    assert!(
        sent.iter().all(|m| m.kind != MessageKind::Error),
        "no failure message on a green run"
    );
    // the provisioned identity went out for label printing
    assert!(sent
        .iter()
        .any(|m| m.kind == MessageKind::Identity && m.payload == "00:1e:06:a1:b2:c3"));
    // final indicator is green
    assert_eq!(
        run.panel.color_of(CheckId::Status.cell()),
        Some(jig_hal::Color::Green)
    );
}

#[tokio::test(start_paused = true)]
async fn missing_storage_expires_countdown_and_reports_red() {
    let run = sim_fixture(
        SimProbe::passing().with_absent(ProbeTarget::Storage(StorageDev::Sata)),
        SimCompanion::new(),
        full_remote_script(),
        full_jack_script(),
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    let RunOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(summary.verdict, Verdict::Fail);
    assert!(summary.failures.contains(&"sata"));

    let errors: Vec<_> = run
        .companion
        .sent()
        .into_iter()
        .filter(|m| m.kind == MessageKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].payload.contains("sata,"));
    assert_eq!(
        run.panel.color_of(CheckId::Status.cell()),
        Some(jig_hal::Color::Red)
    );
    assert_eq!(
        run.panel.color_of(CheckId::Sata.cell()),
        Some(jig_hal::Color::Red)
    );
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_reports_immediately() {
    // nothing event-driven ever runs: stop arrives first
    let run = sim_fixture(
        SimProbe::passing(),
        SimCompanion::new(),
        vec![(Duration::from_millis(600), key(KEY_HOME))],
        vec![],
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    let RunOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(summary.verdict, Verdict::Fail);
    // the event-driven checks never got their events
    assert!(summary.failures.contains(&"eth-m"));
    assert!(summary.failures.contains(&"hp-l"));
}

#[tokio::test(start_paused = true)]
async fn restart_returns_control_to_caller() {
    let run = sim_fixture(
        SimProbe::passing(),
        SimCompanion::new(),
        vec![(Duration::from_millis(600), key(KEY_BACK))],
        vec![],
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Restart));
    // restart discards state: no report was sent
    assert!(run
        .companion
        .sent()
        .iter()
        .all(|m| m.kind != MessageKind::Error));
}

#[tokio::test(start_paused = true)]
async fn discovery_retries_until_found() {
    let run = sim_fixture(
        SimProbe::passing(),
        SimCompanion::new().found_after(5),
        full_remote_script(),
        full_jack_script(),
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    let RunOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(summary.verdict, Verdict::Pass, "failures: {:?}", summary.failures);
    // found on the sixth attempt, never earlier
    assert_eq!(run.companion.discover_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn throughput_passes_on_third_attempt() {
    let run = sim_fixture(
        SimProbe::passing(),
        SimCompanion::new().with_throughput(vec![500, 600, 900]),
        full_remote_script(),
        full_jack_script(),
    );

    let sequencer = Sequencer::new(quick_config(), run.fixture.clone());
    let outcome = sequencer.run().await.unwrap();

    let RunOutcome::Finished(summary) = outcome else {
        panic!("expected a finished run");
    };
    assert_eq!(summary.verdict, Verdict::Pass, "failures: {:?}", summary.failures);
    assert_eq!(
        run.panel.text_of(CheckId::Throughput.cell()).as_deref(),
        Some("900 Mbits/sec")
    );
}

#[tokio::test(start_paused = true)]
async fn blank_fuse_is_provisioned_from_companion() {
    let panel = Arc::new(SimPanel::new());
    let companion = Arc::new(SimCompanion::new());
    let fuse = Arc::new(SimFuse::scripted(vec!["ffffffffffff"]));
    let fixture = Fixture {
        probe: Arc::new(SimProbe::passing()),
        link: Arc::new(SimLink::new()),
        panel: panel.clone(),
        leds: panel.clone(),
        remote: Arc::new(SimInput::scripted(full_remote_script())),
        jack: Arc::new(SimInput::scripted(full_jack_script())),
        companion: companion.clone(),
        fuse: fuse.clone(),
        bench: Arc::new(SimBench::new(&jig_core::DRIVEN)),
    };

    let sequencer = Sequencer::new(quick_config(), fixture);
    let registry = sequencer.registry();
    let handle = tokio::spawn(sequencer.run());

    // provisioning happens during bootstrap
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(registry.passed(CheckId::Identity));
    assert_eq!(fuse.written(), vec!["001e06aabbcc".to_owned()]);

    let _ = handle.await.unwrap();
}
