//! Performance evaluation: pure functions from per-row returns and positions
//! to equity, trades and scalar metrics.

use crate::domain::{Signal, Trade};
use serde::{Deserialize, Serialize};

/// Denominator guard for the Sharpe ratio; a std at or below this is treated
/// as zero variance.
pub const SHARPE_EPSILON: f64 = 1e-12;

/// Aggregate metrics for one evaluated strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub sample_count: usize,
    pub trade_count: usize,
    pub sharpe: f64,
    pub win_rate_pct: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub exposure: f64,
}

impl BacktestMetrics {
    /// Metrics of a run with no evaluable rows.
    pub fn empty(initial_capital: f64) -> Self {
        Self {
            sample_count: 0,
            trade_count: 0,
            sharpe: 0.0,
            win_rate_pct: 0.0,
            final_equity: initial_capital,
            total_return: 0.0,
            max_drawdown: 0.0,
            exposure: 0.0,
        }
    }

    pub fn compute(
        net: &[f64],
        positions: &[Signal],
        equity: &[f64],
        trades: &[Trade],
        initial_capital: f64,
        periods_per_year: f64,
    ) -> Self {
        if net.is_empty() {
            return Self::empty(initial_capital);
        }
        Self {
            sample_count: net.len(),
            trade_count: trades.len(),
            sharpe: sharpe_ratio(net, periods_per_year),
            win_rate_pct: win_rate_pct(trades),
            final_equity: equity.last().copied().unwrap_or(initial_capital),
            total_return: total_return(equity, initial_capital),
            max_drawdown: max_drawdown(equity, initial_capital),
            exposure: exposure(positions),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `initial_capital * cumprod(1 + net)`. Equity is not clamped at zero.
pub fn equity_curve(net: &[f64], initial_capital: f64) -> Vec<f64> {
    let mut equity = initial_capital;
    net.iter()
        .map(|r| {
            equity *= 1.0 + r;
            equity
        })
        .collect()
}

/// Annualised Sharpe ratio with population standard deviation.
///
/// Returns 0.0 for an empty series, for zero variance, and whenever the
/// result would not be finite.
pub fn sharpe_ratio(net: &[f64], periods_per_year: f64) -> f64 {
    if net.is_empty() {
        return 0.0;
    }
    let n = net.len() as f64;
    let mean = net.iter().sum::<f64>() / n;
    let variance = net.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !std.is_finite() || std <= SHARPE_EPSILON {
        return 0.0;
    }
    let denom = std + SHARPE_EPSILON;
    if !denom.is_finite() || denom <= 0.0 {
        return 0.0;
    }
    let sharpe = mean / denom * periods_per_year.sqrt();
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Segment the position series into trades.
///
/// A trade opens on a non-flat row following a flat one (or the start of the
/// series) and closes on the last non-flat row before a flat one (or the end
/// of the series). A direct long/short flip stays inside one trade.
///
/// `equity` must be at least as long as `positions`.
pub fn extract_trades(positions: &[Signal], equity: &[f64]) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut open: Option<usize> = None;

    let n = positions.len().min(equity.len());
    for (t, position) in positions.iter().take(n).enumerate() {
        match (open, position.is_flat()) {
            (None, false) => open = Some(t),
            (Some(start), true) => {
                trades.push(make_trade(positions, equity, start, t - 1));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        trades.push(make_trade(positions, equity, start, n - 1));
    }
    trades
}

fn make_trade(positions: &[Signal], equity: &[f64], start: usize, end: usize) -> Trade {
    Trade {
        start,
        end,
        side: positions[start],
        entry_equity: equity[start],
        exit_equity: equity[end],
    }
}

/// Winning trades as a percentage. 0.0 when there are no trades.
pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    let wins = trades.iter().filter(|t| t.is_winner()).count();
    100.0 * wins as f64 / trades.len().max(1) as f64
}

/// Final equity over initial capital, minus one.
pub fn total_return(equity: &[f64], initial_capital: f64) -> f64 {
    match equity.last() {
        Some(last) if initial_capital > 0.0 => last / initial_capital - 1.0,
        _ => 0.0,
    }
}

/// Maximum peak-to-trough decline as a negative fraction. The initial
/// capital counts as the first peak.
pub fn max_drawdown(equity: &[f64], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for &e in equity {
        if e > peak {
            peak = e;
        }
        if peak > 0.0 {
            let dd = (e - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of rows holding a non-flat position.
pub fn exposure(positions: &[Signal]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    positions.iter().filter(|p| !p.is_flat()).count() as f64 / positions.len() as f64
}
