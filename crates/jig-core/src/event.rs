//! IR remote event bus
//!
//! A single-slot, overwrite-on-arrival channel between the remote
//! reader task and the sequencer. Two events inside one loop iteration
//! means the first is lost - that is the designed behavior, not a bug
//! to queue away: the operator holds one remote and the loop drains
//! every 500 ms.

use crate::item::CheckId;
use crate::scoreboard::Scoreboard;
use jig_hal::{InputEvent, InputStream};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

// Kernel key codes the remote emits
const KEY_ENTER: u16 = 28;
const KEY_HOME: u16 = 102;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_VOLUMEDOWN: u16 = 114;
const KEY_VOLUMEUP: u16 = 115;
const KEY_MENU: u16 = 139;
const KEY_BACK: u16 = 158;

/// Semantic events from the IR remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Nothing pending
    None,
    /// Renegotiate the link to 100M
    SwitchEth100m,
    /// Renegotiate the link to 1G
    SwitchEth1g,
    /// Play the left audio channel
    AudioLeft,
    /// Play the right audio channel
    AudioRight,
    /// Re-send the identity to the companion
    PrintIdentity,
    /// Stop waiting for stragglers now
    EmergencyStop,
    /// Re-run the throughput check if it has not passed
    Confirm,
    /// Discard state and return to the launcher
    Restart,
}

/// Map a raw key code onto the closed event set
#[must_use]
pub fn map_key(code: u16) -> RemoteEvent {
    match code {
        KEY_VOLUMEDOWN => RemoteEvent::SwitchEth100m,
        KEY_VOLUMEUP => RemoteEvent::SwitchEth1g,
        KEY_LEFT => RemoteEvent::AudioLeft,
        KEY_RIGHT => RemoteEvent::AudioRight,
        KEY_MENU => RemoteEvent::PrintIdentity,
        KEY_HOME => RemoteEvent::EmergencyStop,
        KEY_ENTER => RemoteEvent::Confirm,
        KEY_BACK => RemoteEvent::Restart,
        _ => RemoteEvent::None,
    }
}

/// Publishing side of the single-slot bus
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: watch::Sender<RemoteEvent>,
}

/// Draining side of the single-slot bus
#[derive(Debug)]
pub struct EventTap {
    rx: watch::Receiver<RemoteEvent>,
}

/// Create the bus pair
#[must_use]
pub fn event_bus() -> (EventBus, EventTap) {
    let (tx, rx) = watch::channel(RemoteEvent::None);
    (EventBus { tx }, EventTap { rx })
}

impl EventBus {
    /// Overwrite the pending slot; an undrained event is lost
    pub fn publish(&self, event: RemoteEvent) {
        self.tx.send_replace(event);
    }
}

impl EventTap {
    /// Take the pending event, leaving the slot drained
    pub fn drain(&mut self) -> RemoteEvent {
        if self
            .rx
            .has_changed()
            .unwrap_or(false)
        {
            *self.rx.borrow_and_update()
        } else {
            RemoteEvent::None
        }
    }
}

/// Remote reader task.
///
/// Blocks on the input stream under its poll bound, publishes every key
/// as a mapped event, and marks the remote's own liveness item on the
/// first key seen - the remote proved it works no matter which key it
/// was.
pub async fn run_remote_reader(
    stream: Arc<dyn InputStream>,
    bus: EventBus,
    board: Scoreboard,
    shutdown: CancellationToken,
) {
    board.arm(CheckId::Remote);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            event = stream.next() => match event {
                Ok(Some(InputEvent::Key { code })) => {
                    if !board.passed(CheckId::Remote) {
                        board.pass(CheckId::Remote, "PASS");
                    }
                    let mapped = map_key(code);
                    tracing::debug!(code, ?mapped, "remote key");
                    bus.publish(mapped);
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "remote stream error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Registry;
    use jig_hal::sim::{SimInput, SimPanel};
    use std::time::Duration;

    #[test]
    fn later_event_wins() {
        let (bus, mut tap) = event_bus();
        bus.publish(RemoteEvent::AudioLeft);
        bus.publish(RemoteEvent::AudioRight);

        // only the later event is observed; the first is lost by design
        assert_eq!(tap.drain(), RemoteEvent::AudioRight);
        assert_eq!(tap.drain(), RemoteEvent::None);
    }

    #[test]
    fn drain_resets_slot() {
        let (bus, mut tap) = event_bus();
        bus.publish(RemoteEvent::Confirm);

        assert_eq!(tap.drain(), RemoteEvent::Confirm);
        assert_eq!(tap.drain(), RemoteEvent::None);
        assert_eq!(tap.drain(), RemoteEvent::None);
    }

    #[test]
    fn unmapped_key_is_none() {
        assert_eq!(map_key(1), RemoteEvent::None);
        assert_eq!(map_key(KEY_HOME), RemoteEvent::EmergencyStop);
        assert_eq!(map_key(KEY_BACK), RemoteEvent::Restart);
    }

    #[tokio::test(start_paused = true)]
    async fn first_key_marks_remote_alive() {
        let stream = Arc::new(SimInput::scripted(vec![(
            Duration::from_millis(10),
            InputEvent::Key { code: KEY_VOLUMEUP },
        )]));
        let board = Scoreboard::new(
            Arc::new(Registry::new()),
            Arc::new(SimPanel::new()),
        );
        let (bus, mut tap) = event_bus();
        let shutdown = CancellationToken::new();

        let reader = tokio::spawn(run_remote_reader(
            stream,
            bus,
            board.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        reader.await.unwrap();

        assert!(board.passed(CheckId::Remote));
        assert_eq!(tap.drain(), RemoteEvent::SwitchEth1g);
    }
}
