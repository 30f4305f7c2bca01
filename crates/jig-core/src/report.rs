//! Failure aggregation and the final run summary

use serde::Serialize;

/// Final verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Every required item passed
    Pass,
    /// At least one item failed or never finished
    Fail,
}

/// What a finished run reports back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Overall verdict
    pub verdict: Verdict,
    /// Failing item names, registry order
    pub failures: Vec<&'static str>,
    /// The wrapped report lines that went to the companion
    pub lines: Vec<String>,
}

impl RunSummary {
    /// Whether the run passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Wrap failing names into report lines under a character budget.
///
/// Each name is suffixed with a `,` separator. A name that would push
/// the current line past the budget starts a new line instead.
#[must_use]
pub fn wrap_names(names: &[&str], budget: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for name in names {
        if !current.is_empty() && current.len() + name.len() + 1 > budget {
            lines.push(std::mem::take(&mut current));
        }
        current.push_str(name);
        current.push(',');
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
