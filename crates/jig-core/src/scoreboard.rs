//! Registry + panel glue
//!
//! Every status transition comes with a matching panel update; the
//! scoreboard keeps those pairs in one place so workers stay terse and
//! no item can change state without its cell following.

use crate::item::{CheckId, Outcome, Registry, Status};
use jig_hal::{Color, Panel};
use std::sync::Arc;

/// Shared handle combining the registry with the operator panel
#[derive(Clone)]
pub struct Scoreboard {
    registry: Arc<Registry>,
    panel: Arc<dyn Panel>,
}

impl Scoreboard {
    /// New scoreboard over `registry` and `panel`
    #[must_use]
    pub fn new(registry: Arc<Registry>, panel: Arc<dyn Panel>) -> Self {
        Self { registry, panel }
    }

    /// The underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The underlying panel
    #[inline]
    #[must_use]
    pub fn panel(&self) -> &Arc<dyn Panel> {
        &self.panel
    }

    /// Whether `id` already passed
    #[inline]
    #[must_use]
    pub fn passed(&self, id: CheckId) -> bool {
        self.registry.passed(id)
    }

    /// Measurement starting: Run + yellow cell
    pub fn begin(&self, id: CheckId) {
        self.registry.set_status(id, Status::Run);
        self.panel.set_color(id.cell(), Color::Yellow);
    }

    /// Worker armed and polling: Run + armed color
    pub fn arm(&self, id: CheckId) {
        self.registry.set_status(id, Status::Run);
        self.panel.set_color(id.cell(), Color::RunOn);
    }

    /// Item passed: caption, green cell, Stop
    pub fn pass(&self, id: CheckId, caption: &str) {
        self.registry.set_result(id, Outcome::Pass);
        self.registry.set_status(id, Status::Stop);
        self.panel.set_text(id.cell(), caption);
        self.panel.set_color(id.cell(), Color::Green);
        tracing::info!(item = id.name(), caption, "check passed");
    }

    /// Address-style pass: caption shown, cell back to background
    pub fn pass_quiet(&self, id: CheckId, caption: &str) {
        self.registry.set_result(id, Outcome::Pass);
        self.registry.set_status(id, Status::Stop);
        self.panel.set_text(id.cell(), caption);
        self.panel.set_color(id.cell(), Color::Background);
        tracing::info!(item = id.name(), caption, "check passed");
    }

    /// Failed measurement on a polling item: result recorded, red cell,
    /// status holds Run so the item may retry
    pub fn fail_attempt(&self, id: CheckId, caption: &str) {
        self.registry.set_result(id, Outcome::Fail);
        self.panel.set_text(id.cell(), caption);
        self.panel.set_color(id.cell(), Color::Red);
        tracing::warn!(item = id.name(), caption, "check failed, still armed");
    }

    /// Failed bounded attempt: result recorded, red cell, Stop
    pub fn fail_stop(&self, id: CheckId, caption: &str) {
        self.registry.set_result(id, Outcome::Fail);
        self.registry.set_status(id, Status::Stop);
        self.panel.set_text(id.cell(), caption);
        self.panel.set_color(id.cell(), Color::Red);
        tracing::warn!(item = id.name(), caption, "check failed");
    }

    /// Update a cell caption without touching item state
    pub fn caption(&self, id: CheckId, text: &str) {
        self.panel.set_text(id.cell(), text);
    }

    /// Update a cell color without touching item state
    pub fn color(&self, id: CheckId, color: Color) {
        self.panel.set_color(id.cell(), color);
    }
}

impl std::fmt::Debug for Scoreboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scoreboard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jig_hal::sim::SimPanel;

    fn setup() -> (Scoreboard, Arc<SimPanel>) {
        let panel = Arc::new(SimPanel::new());
        let board = Scoreboard::new(Arc::new(Registry::new()), panel.clone());
        (board, panel)
    }

    #[test]
    fn pass_paints_green_and_stops() {
        let (board, panel) = setup();
        board.begin(CheckId::Emmc);
        board.pass(CheckId::Emmc, "161 MB/s");

        let registry = board.registry();
        assert_eq!(registry.status(CheckId::Emmc), Status::Stop);
        assert_eq!(registry.result(CheckId::Emmc), Outcome::Pass);
        assert_eq!(panel.color_of(CheckId::Emmc.cell()), Some(Color::Green));
        assert_eq!(
            panel.text_of(CheckId::Emmc.cell()).as_deref(),
            Some("161 MB/s")
        );
    }

    #[test]
    fn fail_attempt_keeps_running() {
        let (board, _panel) = setup();
        board.begin(CheckId::Sata);
        board.fail_attempt(CheckId::Sata, "0 MB/s");

        let registry = board.registry();
        assert_eq!(registry.status(CheckId::Sata), Status::Run);
        assert_eq!(registry.result(CheckId::Sata), Outcome::Fail);
    }
}
