//! Header pattern engine
//!
//! Drives fixed output vectors over the driven pins of the 40-pin
//! header and verifies the analog read-back per pin against dual
//! voltage thresholds. Four patterns: all high, all low, and a
//! checkerboard with its inverse. Each pattern is attempted exactly
//! once per run, one pattern per sequencer iteration; a failed pattern
//! reports its offending pins and does not block the rest.

use crate::item::CheckId;
use crate::scoreboard::Scoreboard;
use jig_hal::{HeaderBench, Level};
use std::sync::Arc;
use std::time::Duration;

/// A pin expected high must read at least this many millivolts
pub const HIGH_MIN_MV: u16 = 3000;
/// A pin expected low must read at most this many millivolts
pub const LOW_MAX_MV: u16 = 300;

/// Number of patterns in the fixed table
pub const PATTERN_COUNT: usize = 4;

/// Driven header positions and their GPIO lines.
///
/// Every other position on the 40-pin header is a supply or ground pin
/// and is never driven.
pub const DRIVEN: [(usize, u16); 23] = [
    (7, 14),
    (8, 126),
    (10, 127),
    (11, 16),
    (12, 120),
    (13, 17),
    (15, 106),
    (16, 118),
    (18, 119),
    (19, 89),
    (21, 88),
    (22, 121),
    (23, 91),
    (24, 90),
    (26, 122),
    (27, 12),
    (28, 11),
    (29, 145),
    (31, 142),
    (32, 123),
    (33, 13),
    (35, 125),
    (36, 124),
];

// Checkerboard vector for pattern 3, aligned with DRIVEN; pattern 4 is
// its inverse.
const CROSS: [Level; 23] = [
    Level::Low,
    Level::High,
    Level::Low,
    Level::High,
    Level::Low,
    Level::Low,
    Level::High,
    Level::Low,
    Level::High,
    Level::Low,
    Level::High,
    Level::Low,
    Level::Low,
    Level::High,
    Level::Low,
    Level::Low,
    Level::High,
    Level::High,
    Level::Low,
    Level::High,
    Level::High,
    Level::Low,
    Level::High,
];

const PATTERN_ITEMS: [CheckId; PATTERN_COUNT] = [
    CheckId::HeaderPt1,
    CheckId::HeaderPt2,
    CheckId::HeaderPt3,
    CheckId::HeaderPt4,
];

/// Expected level of the `slot`-th driven pin under `pattern`
#[must_use]
pub fn expected_level(pattern: usize, slot: usize) -> Level {
    match pattern {
        0 => Level::High,
        1 => Level::Low,
        2 => CROSS[slot],
        _ => CROSS[slot].invert(),
    }
}

/// Classify one analog read-back against its expected level
#[must_use]
pub fn classify(expected: Level, millivolts: u16) -> bool {
    match expected {
        Level::High => millivolts >= HIGH_MIN_MV,
        Level::Low => millivolts <= LOW_MAX_MV,
    }
}

/// Sequencer-owned engine stepping through the pattern table
pub struct PatternEngine {
    bench: Arc<dyn HeaderBench>,
    board: Scoreboard,
    settle: Duration,
    next: usize,
    configured: bool,
}

impl PatternEngine {
    /// Engine over `bench`, settling `settle` between drive and sample
    #[must_use]
    pub fn new(bench: Arc<dyn HeaderBench>, board: Scoreboard, settle: Duration) -> Self {
        Self {
            bench,
            board,
            settle,
            next: 0,
            configured: false,
        }
    }

    /// Whether every pattern has been attempted
    #[inline]
    #[must_use]
    pub fn finished(&self) -> bool {
        self.next >= PATTERN_COUNT
    }

    /// Attempt the next pattern, if any remain.
    ///
    /// One pattern per call: drive the vector, settle, sample, classify.
    pub async fn advance(&mut self) {
        if self.finished() {
            return;
        }
        let pattern = self.next;
        self.next += 1;
        let id = PATTERN_ITEMS[pattern];
        self.board.begin(id);

        if !self.configured {
            let pins: Vec<u16> = DRIVEN.iter().map(|&(_, gpio)| gpio).collect();
            if let Err(error) = self.bench.configure(&pins) {
                tracing::warn!(%error, "header bench configure failed");
                self.board.fail_stop(id, "FAIL");
                return;
            }
            self.configured = true;
        }

        for (slot, &(_, gpio)) in DRIVEN.iter().enumerate() {
            if let Err(error) = self.bench.drive(gpio, expected_level(pattern, slot)) {
                tracing::warn!(%error, gpio, "header drive failed");
                self.board.fail_stop(id, "FAIL");
                return;
            }
        }
        tokio::time::sleep(self.settle).await;

        let sample = match self.bench.sample().await {
            Ok(sample) => sample,
            Err(error) => {
                tracing::warn!(%error, "header sample failed");
                self.board.fail_stop(id, "FAIL");
                return;
            }
        };

        let mut ok = true;
        for (slot, &(position, gpio)) in DRIVEN.iter().enumerate() {
            let expected = expected_level(pattern, slot);
            let millivolts = sample.get(position).copied().unwrap_or(0);
            if !classify(expected, millivolts) {
                ok = false;
                tracing::warn!(
                    pattern = pattern + 1,
                    pin = position,
                    gpio,
                    ?expected,
                    millivolts,
                    "header pin mismatch"
                );
            }
        }

        if ok {
            self.board.pass(id, "PASS");
        } else {
            self.board.fail_stop(id, "FAIL");
        }
    }
}

impl std::fmt::Debug for PatternEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternEngine")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Outcome, Registry, Status};
    use jig_hal::sim::{SimBench, SimPanel};

    fn engine_with(bench: SimBench) -> (PatternEngine, Scoreboard) {
        let board = Scoreboard::new(Arc::new(Registry::new()), Arc::new(SimPanel::new()));
        let engine = PatternEngine::new(
            Arc::new(bench),
            board.clone(),
            Duration::from_millis(1),
        );
        (engine, board)
    }

    #[test]
    fn classification_thresholds() {
        assert!(classify(Level::High, 3100));
        assert!(!classify(Level::High, 2800));
        assert!(classify(Level::Low, 250));
        assert!(!classify(Level::Low, 500));
        // boundary values
        assert!(classify(Level::High, 3000));
        assert!(classify(Level::Low, 300));
    }

    #[test]
    fn cross_patterns_are_inverse() {
        for slot in 0..DRIVEN.len() {
            assert_eq!(
                expected_level(2, slot),
                expected_level(3, slot).invert()
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn all_patterns_pass_on_faithful_bench() {
        let (mut engine, board) = engine_with(SimBench::new(&DRIVEN));

        for _ in 0..PATTERN_COUNT {
            engine.advance().await;
        }
        assert!(engine.finished());

        let registry = board.registry();
        for id in PATTERN_ITEMS {
            assert_eq!(registry.status(id), Status::Stop);
            assert_eq!(registry.result(id), Outcome::Pass);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_low_pin_fails_only_high_patterns() {
        // pin 7 stuck at ground: read-back is fine whenever low is
        // expected, wrong whenever high is
        let (mut engine, board) = engine_with(
            SimBench::new(&DRIVEN).with_pin_fault(7, 0),
        );

        for _ in 0..PATTERN_COUNT {
            engine.advance().await;
        }

        let registry = board.registry();
        // all high
        assert_eq!(registry.result(CheckId::HeaderPt1), Outcome::Fail);
        // all low
        assert_eq!(registry.result(CheckId::HeaderPt2), Outcome::Pass);
        // cross drives pin 7 low, inverse cross drives it high
        assert_eq!(registry.result(CheckId::HeaderPt3), Outcome::Pass);
        assert_eq!(registry.result(CheckId::HeaderPt4), Outcome::Fail);
        for id in PATTERN_ITEMS {
            assert_eq!(registry.status(id), Status::Stop);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn midscale_pin_fails_both_polarities() {
        let (mut engine, board) = engine_with(
            SimBench::new(&DRIVEN).with_pin_fault(7, 1500),
        );

        for _ in 0..PATTERN_COUNT {
            engine.advance().await;
        }

        let registry = board.registry();
        for id in PATTERN_ITEMS {
            assert_eq!(registry.result(id), Outcome::Fail);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn advance_past_end_is_inert() {
        let (mut engine, board) = engine_with(SimBench::new(&DRIVEN));

        for _ in 0..PATTERN_COUNT + 3 {
            engine.advance().await;
        }

        assert!(engine.finished());
        assert_eq!(board.registry().result(CheckId::HeaderPt4), Outcome::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn one_pattern_per_advance() {
        let (mut engine, board) = engine_with(SimBench::new(&DRIVEN));

        engine.advance().await;
        let registry = board.registry();
        assert_eq!(registry.status(CheckId::HeaderPt1), Status::Stop);
        assert_eq!(registry.status(CheckId::HeaderPt2), Status::Wait);
    }
}
