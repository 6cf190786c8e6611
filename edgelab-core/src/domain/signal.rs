use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional exposure: long, short, or flat.
///
/// Used both for the decision made at row `t` (signal) and for the exposure
/// actually held during row `t` (position, the signal lagged by one row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Short,
    #[default]
    Flat,
    Long,
}

impl Signal {
    /// Signed unit exposure: +1, 0 or -1.
    pub fn value(self) -> i8 {
        match self {
            Signal::Long => 1,
            Signal::Flat => 0,
            Signal::Short => -1,
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.value())
    }

    pub fn is_flat(self) -> bool {
        self == Signal::Flat
    }

    /// Magnitude of the exposure change from `prev` to `self` (0, 1 or 2).
    pub fn change_from(self, prev: Signal) -> u8 {
        (self.value() - prev.value()).unsigned_abs()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "long"),
            Signal::Flat => write!(f, "flat"),
            Signal::Short => write!(f, "short"),
        }
    }
}
