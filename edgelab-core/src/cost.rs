//! Transaction-cost-aware per-row strategy returns.
//!
//! Row `t` earns `position[t] * close_return[t]` and pays
//! `|signal[t] - signal[t-1]| * rate` with `signal[-1] = Flat`. The charge is
//! taken on the row where the signal changes, one row before the position
//! reflects it.

use crate::domain::Signal;
use crate::signal::{lagged_positions, SignalError};
use serde::{Deserialize, Serialize};

/// Basis points per unit.
pub const BPS: f64 = 10_000.0;

/// Flat per-change charge in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCostModel")]
pub struct CostModel {
    fee_bps: f64,
    slippage_bps: f64,
}

#[derive(Deserialize)]
struct RawCostModel {
    fee_bps: f64,
    slippage_bps: f64,
}

impl TryFrom<RawCostModel> for CostModel {
    type Error = SignalError;

    fn try_from(raw: RawCostModel) -> Result<Self, Self::Error> {
        CostModel::new(raw.fee_bps, raw.slippage_bps)
    }
}

impl CostModel {
    pub fn new(fee_bps: f64, slippage_bps: f64) -> Result<Self, SignalError> {
        for (name, v) in [("fee_bps", fee_bps), ("slippage_bps", slippage_bps)] {
            if !v.is_finite() || v < 0.0 {
                return Err(SignalError::InvalidCost(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(Self {
            fee_bps,
            slippage_bps,
        })
    }

    /// No fees, no slippage.
    pub fn frictionless() -> Self {
        Self {
            fee_bps: 0.0,
            slippage_bps: 0.0,
        }
    }

    pub fn fee_bps(&self) -> f64 {
        self.fee_bps
    }

    pub fn slippage_bps(&self) -> f64 {
        self.slippage_bps
    }

    /// Fractional charge per unit of turnover.
    pub fn rate(&self) -> f64 {
        (self.fee_bps + self.slippage_bps) / BPS
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fee_bps: 5.0,
            slippage_bps: 2.0,
        }
    }
}

/// Signal change magnitude per row: 0, 1 or 2.
pub fn turnover(signals: &[Signal]) -> Vec<u8> {
    let mut prev = Signal::Flat;
    signals
        .iter()
        .map(|&s| {
            let t = s.change_from(prev);
            prev = s;
            t
        })
        .collect()
}

/// Per-row decomposition of strategy returns. All vectors share one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyReturns {
    pub positions: Vec<Signal>,
    pub gross: Vec<f64>,
    pub turnover: Vec<u8>,
    pub cost: Vec<f64>,
    pub net: Vec<f64>,
}

impl StrategyReturns {
    pub fn len(&self) -> usize {
        self.net.len()
    }

    pub fn is_empty(&self) -> bool {
        self.net.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.cost.iter().sum()
    }
}

pub fn strategy_returns(
    signals: &[Signal],
    close_returns: &[f64],
    costs: &CostModel,
) -> Result<StrategyReturns, SignalError> {
    SignalError::check_lengths("signals", signals.len(), "close returns", close_returns.len())?;

    let positions = lagged_positions(signals);
    let turnover = turnover(signals);
    let rate = costs.rate();

    let gross: Vec<f64> = positions
        .iter()
        .zip(close_returns)
        .map(|(p, r)| p.as_f64() * r)
        .collect();
    let cost: Vec<f64> = turnover.iter().map(|&t| f64::from(t) * rate).collect();
    let net = gross.iter().zip(&cost).map(|(g, c)| g - c).collect();

    Ok(StrategyReturns {
        positions,
        gross,
        turnover,
        cost,
        net,
    })
}
