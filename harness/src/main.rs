//! jig-harness - factory self-test entry point
//!
//! `run` drives the real board; `simulate` drives the same engine over
//! the scripted simulation fixture, which is how the orchestration is
//! exercised off the production line.

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use jig_core::{Fixture, HarnessConfig, RunOutcome, Sequencer};
use jig_hal::linux::{
    EthtoolLink, EvdevStream, FbPanel, LinuxProbe, SysfsBench, SysfsFuse, SysfsLeds, UdpCompanion,
};
use jig_hal::sim::{SimBench, SimCompanion, SimFuse, SimInput, SimLink, SimPanel, SimProbe};
use jig_hal::{InputEvent, ProbeTarget, StorageDev, UsbPort, SW_HEADPHONE_INSERT};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("jig-harness")
        .version(jig_core::VERSION)
        .about("Factory self-test harness")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Run the test battery on the board")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("Path to a toml config file"),
                )
                .arg(
                    Arg::new("fb")
                        .long("fb")
                        .default_value("/dev/fb0")
                        .help("Display surface device"),
                )
                .arg(
                    Arg::new("interface")
                        .long("interface")
                        .default_value("eth0")
                        .help("Ethernet interface under test"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the engine against the scripted simulation fixture")
                .arg(
                    Arg::new("countdown")
                        .long("countdown")
                        .default_value("60")
                        .value_parser(value_parser!(u32))
                        .help("Countdown seconds"),
                )
                .arg(
                    Arg::new("fail")
                        .long("fail")
                        .help("Comma-separated item names to leave unresolved (emmc, sata, nvme, usb3u)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the summary as JSON"),
                ),
        );

    let matches = cli.get_matches();
    let runtime = tokio::runtime::Runtime::new()?;

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = match args.get_one::<String>("config") {
                Some(path) => HarnessConfig::load(path)
                    .with_context(|| format!("loading config {path}"))?,
                None => HarnessConfig::new(),
            };
            let fb = args.get_one::<String>("fb").expect("has default");
            let iface = args.get_one::<String>("interface").expect("has default");

            let fixture = board_fixture(&config, fb, iface)
                .context("acquiring board adapters")?;
            let outcome = runtime.block_on(Sequencer::new(config, fixture).run())?;
            finish(outcome, false)
        }
        Some(("simulate", args)) => {
            let countdown = *args.get_one::<u32>("countdown").expect("has default");
            let fail: Vec<String> = args
                .get_one::<String>("fail")
                .map(|s| s.split(',').map(str::trim).map(str::to_owned).collect())
                .unwrap_or_default();
            let json = args.get_flag("json");

            let mut config = HarnessConfig::new().with_countdown_secs(countdown);
            config.loop_interval_ms = 100;
            config.worker_poll_ms = 100;
            config.discover_retry_ms = 100;
            config.session_retry_ms = 100;
            config.settle_ms = 10;

            let fixture = sim_fixture(&fail);
            let outcome = runtime.block_on(Sequencer::new(config, fixture).run())?;
            finish(outcome, json)
        }
        _ => unreachable!("subcommand required"),
    }
}

fn finish(outcome: RunOutcome, json: bool) -> anyhow::Result<()> {
    match outcome {
        RunOutcome::Finished(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("verdict: {:?}", summary.verdict);
                for line in &summary.lines {
                    println!("failed: {line}");
                }
            }
            if summary.passed() {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        RunOutcome::Restart => {
            println!("restart requested");
            std::process::exit(2);
        }
    }
}

/// Wire the real board adapters; the display surface is the only
/// fatal dependency.
fn board_fixture(config: &HarnessConfig, fb: &str, iface: &str) -> anyhow::Result<Fixture> {
    let panel = Arc::new(FbPanel::acquire(fb).context("display surface unavailable")?);
    let poll = Duration::from_millis(config.remote_poll_ms);

    Ok(Fixture {
        probe: Arc::new(LinuxProbe::new()),
        link: Arc::new(EthtoolLink::new(iface)),
        panel,
        leds: Arc::new(SysfsLeds::new()),
        remote: Arc::new(EvdevStream::open("/dev/input/event0", poll)?),
        jack: Arc::new(EvdevStream::open("/dev/input/event2", poll)?),
        companion: Arc::new(UdpCompanion::new(8888, config.board.clone())),
        fuse: Arc::new(SysfsFuse::new()),
        bench: Arc::new(SysfsBench::new("/run/jig/adc")),
    })
}

/// The happy-path simulation fixture, minus the items asked to fail
fn sim_fixture(fail: &[String]) -> Fixture {
    let mut probe = SimProbe::passing();
    for name in fail {
        let target = match name.as_str() {
            "emmc" => Some(ProbeTarget::Storage(StorageDev::Emmc)),
            "sata" => Some(ProbeTarget::Storage(StorageDev::Sata)),
            "nvme" => Some(ProbeTarget::Storage(StorageDev::Nvme)),
            "usb3u" => Some(ProbeTarget::Usb(UsbPort::Usb30Up)),
            "usb3d" => Some(ProbeTarget::Usb(UsbPort::Usb30Dn)),
            "usb2u" => Some(ProbeTarget::Usb(UsbPort::Usb20Up)),
            "usb2d" => Some(ProbeTarget::Usb(UsbPort::Usb20Dn)),
            other => {
                tracing::warn!(item = other, "unknown --fail item ignored");
                None
            }
        };
        if let Some(target) = target {
            probe = probe.with_absent(target);
        }
    }

    let key = |code: u16| InputEvent::Key { code };
    let remote = SimInput::scripted(vec![
        (Duration::from_millis(600), key(114)),  // switch to 100M
        (Duration::from_millis(1800), key(115)), // switch to 1G
        (Duration::from_millis(3000), key(105)), // left audio
        (Duration::from_millis(3600), key(106)), // right audio
    ]);
    let jack = SimInput::scripted(vec![
        (
            Duration::from_millis(200),
            InputEvent::Switch {
                code: SW_HEADPHONE_INSERT,
                engaged: true,
            },
        ),
        (
            Duration::from_millis(5000),
            InputEvent::Switch {
                code: SW_HEADPHONE_INSERT,
                engaged: false,
            },
        ),
    ]);

    let panel = Arc::new(SimPanel::new());
    Fixture {
        probe: Arc::new(probe),
        link: Arc::new(SimLink::new()),
        panel: panel.clone(),
        leds: panel,
        remote: Arc::new(remote),
        jack: Arc::new(jack),
        companion: Arc::new(SimCompanion::new()),
        fuse: Arc::new(SimFuse::scripted(vec![
            "001e06a1b2c3",
            "001e06a1b2c3",
            "001e06a1b2c3",
            "001e06a1b2c3-x",
            "001e06a1b2c3-y",
        ])),
        bench: Arc::new(SimBench::new(&jig_core::DRIVEN)),
    }
}
