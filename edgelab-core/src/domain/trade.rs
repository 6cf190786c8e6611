//! Trade: a maximal run of non-flat position, derived from the position series.

use super::signal::Signal;
use serde::{Deserialize, Serialize};

/// A completed trade segment.
///
/// Trades are never stored independently of the position series; they are
/// recomputed on every evaluation pass. `start` and `end` are inclusive row
/// indices into the evaluated series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Span ──
    pub start: usize,
    pub end: usize,

    /// Exposure held on the opening row. A trade may flip sides without
    /// passing through flat; the side here is only the opening one.
    pub side: Signal,

    // ── Equity ──
    pub entry_equity: f64,
    pub exit_equity: f64,
}

impl Trade {
    pub fn bars_held(&self) -> usize {
        self.end - self.start + 1
    }

    /// Equity change over the trade as a fraction of entry equity.
    pub fn return_pct(&self) -> f64 {
        if self.entry_equity == 0.0 {
            return 0.0;
        }
        self.exit_equity / self.entry_equity - 1.0
    }

    /// Win = equity at trade end strictly greater than equity at trade start.
    pub fn is_winner(&self) -> bool {
        self.exit_equity > self.entry_equity
    }
}
