//! Operator display panel and board status LEDs
//!
//! Panel calls are fire-and-forget: the engine never consumes a return
//! value from them, and a broken panel must not take a check down with
//! it. Rendering itself lives outside the core; the backends here either
//! drop the calls or forward them to the log.

use std::fmt;

/// Opaque reference to one cell of the operator display.
///
/// The engine carries these through without interpreting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayRef(pub u16);

impl fmt::Display for DisplayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Panel cell colors used by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Failure
    Red,
    /// Pass
    Green,
    /// Measurement in progress
    Yellow,
    /// Armed worker, bright phase
    RunOn,
    /// Armed worker, dim phase
    RunOff,
    /// Link LED mirror, green state
    DarkCyan,
    /// Link LED mirror, orange state
    DarkKhaki,
    /// Panel background
    Background,
}

/// Operator display surface
pub trait Panel: Send + Sync {
    /// Set the background color of a cell
    fn set_color(&self, cell: DisplayRef, color: Color);
    /// Set the text of a cell
    fn set_text(&self, cell: DisplayRef, text: &str);
    /// Flush pending cell updates to the surface
    fn refresh(&self);
}

/// Board status LEDs toggled by the watchdog heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLed {
    /// Power LED
    Power,
    /// Alive LED
    Alive,
}

/// Board LED control
pub trait StatusLeds: Send + Sync {
    /// Turn a status LED on or off
    fn set(&self, led: StatusLed, on: bool);
}

/// Panel that drops every call
#[derive(Debug, Default)]
pub struct NullPanel;

impl Panel for NullPanel {
    fn set_color(&self, _cell: DisplayRef, _color: Color) {}
    fn set_text(&self, _cell: DisplayRef, _text: &str) {}
    fn refresh(&self) {}
}

impl StatusLeds for NullPanel {
    fn set(&self, _led: StatusLed, _on: bool) {}
}

/// Panel that forwards cell updates to the trace log
#[derive(Debug, Default)]
pub struct TracePanel;

impl Panel for TracePanel {
    fn set_color(&self, cell: DisplayRef, color: Color) {
        tracing::trace!(%cell, ?color, "panel color");
    }

    fn set_text(&self, cell: DisplayRef, text: &str) {
        tracing::debug!(%cell, text, "panel text");
    }

    fn refresh(&self) {}
}

impl StatusLeds for TracePanel {
    fn set(&self, led: StatusLed, on: bool) {
        tracing::trace!(?led, on, "status led");
    }
}
