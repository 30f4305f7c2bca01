//! Run-wide shared state
//!
//! Everything here lives only for the duration of one run. Each field
//! has a single writer; atomics provide visibility to the readers.

use jig_hal::PrintChannel;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared run state
#[derive(Debug)]
pub struct RunState {
    /// Seconds left before forced shutdown; the watchdog decrements it,
    /// emergency stop zeroes it
    countdown: AtomicU32,
    /// Measurement session open; gates the countdown
    session_open: AtomicBool,
    /// Headphone jack inserted; gates audio checks
    jack_inserted: AtomicBool,
    /// Link renegotiation in flight; the watchdog waits for it
    link_switching: AtomicBool,
    /// Provisioned identity token, formatted
    identity: Mutex<Option<String>>,
    /// Discovered companion address
    server: Mutex<Option<IpAddr>>,
    /// Label printer slot for this jig position
    channel: Mutex<PrintChannel>,
    /// Expected memory model in GB, 0 when unknown
    expected_mem_gb: AtomicU32,
    /// Last measured memory size in GB, 0 before the first measurement
    measured_mem_gb: AtomicU32,
}

impl RunState {
    /// Fresh state with `countdown_secs` on the clock
    #[must_use]
    pub fn new(countdown_secs: u32) -> Self {
        Self {
            countdown: AtomicU32::new(countdown_secs),
            session_open: AtomicBool::new(false),
            jack_inserted: AtomicBool::new(false),
            link_switching: AtomicBool::new(false),
            identity: Mutex::new(None),
            server: Mutex::new(None),
            channel: Mutex::new(PrintChannel::Left),
            expected_mem_gb: AtomicU32::new(0),
            measured_mem_gb: AtomicU32::new(0),
        }
    }

    /// Seconds remaining
    #[inline]
    #[must_use]
    pub fn countdown(&self) -> u32 {
        self.countdown.load(Ordering::Acquire)
    }

    /// Take one second off the clock
    pub fn tick(&self) {
        let _ = self
            .countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Stop waiting for stragglers immediately
    pub fn expire(&self) {
        self.countdown.store(0, Ordering::Release);
    }

    /// Whether the measurement session is open
    #[inline]
    #[must_use]
    pub fn session_open(&self) -> bool {
        self.session_open.load(Ordering::Acquire)
    }

    /// Mark the measurement session open
    pub fn set_session_open(&self) {
        self.session_open.store(true, Ordering::Release);
    }

    /// Whether the headphone jack is inserted
    #[inline]
    #[must_use]
    pub fn jack_inserted(&self) -> bool {
        self.jack_inserted.load(Ordering::Acquire)
    }

    /// Record jack state (jack worker only)
    pub fn set_jack(&self, inserted: bool) {
        self.jack_inserted.store(inserted, Ordering::Release);
    }

    /// Whether a link switch is in flight
    #[inline]
    #[must_use]
    pub fn link_switching(&self) -> bool {
        self.link_switching.load(Ordering::Acquire)
    }

    /// Mark a link switch in flight (sequencer only)
    pub fn set_link_switching(&self, switching: bool) {
        self.link_switching.store(switching, Ordering::Release);
    }

    /// Formatted identity, once provisioned
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        self.identity.lock().clone()
    }

    /// Record the provisioned identity (sequencer only)
    pub fn set_identity(&self, identity: String) {
        *self.identity.lock() = Some(identity);
    }

    /// Companion address, once discovered
    #[must_use]
    pub fn server(&self) -> Option<IpAddr> {
        *self.server.lock()
    }

    /// Record the companion address (sequencer only)
    pub fn set_server(&self, server: IpAddr) {
        *self.server.lock() = Some(server);
    }

    /// Label printer slot
    #[must_use]
    pub fn channel(&self) -> PrintChannel {
        *self.channel.lock()
    }

    /// Record the printer slot (sequencer only)
    pub fn set_channel(&self, channel: PrintChannel) {
        *self.channel.lock() = channel;
    }

    /// Expected memory model in GB, 0 when unknown
    #[inline]
    #[must_use]
    pub fn expected_mem_gb(&self) -> u32 {
        self.expected_mem_gb.load(Ordering::Acquire)
    }

    /// Record the expected memory model (sequencer only)
    pub fn set_expected_mem_gb(&self, gb: u32) {
        self.expected_mem_gb.store(gb, Ordering::Release);
    }

    /// Last measured memory size in GB, 0 before the first measurement
    #[inline]
    #[must_use]
    pub fn measured_mem_gb(&self) -> u32 {
        self.measured_mem_gb.load(Ordering::Acquire)
    }

    /// Record the measured memory size (sequencer only)
    pub fn set_measured_mem_gb(&self, gb: u32) {
        self.measured_mem_gb.store(gb, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_saturates_at_zero() {
        let state = RunState::new(1);
        state.tick();
        assert_eq!(state.countdown(), 0);
        state.tick();
        assert_eq!(state.countdown(), 0);
    }

    #[test]
    fn expire_zeroes_immediately() {
        let state = RunState::new(60);
        state.expire();
        assert_eq!(state.countdown(), 0);
    }
}
