//! Vectorised backtest over a feature set and one probability per row.
//!
//! `simulate` is pure: the same feature set, probabilities and parameters
//! always produce the same `Simulation`, so callers may evaluate many
//! parameter sets against one prediction vector.

use crate::bar_size::periods_per_year;
use crate::cost::{strategy_returns, CostModel, StrategyReturns};
use crate::domain::{Signal, Trade};
use crate::evaluate::{equity_curve, extract_trades, BacktestMetrics};
use crate::features::FeatureSet;
use crate::signal::{signals_from_probabilities, SignalError, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("initial capital must be finite and > 0, got {0}")]
    InvalidCapital(f64),

    #[error("expected {expected} probabilities (one per feature row), got {actual}")]
    ProbabilityCount { expected: usize, actual: usize },

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Immutable strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub thresholds: Thresholds,
    pub costs: CostModel,
    pub initial_capital: f64,
    /// Bar string used for annualisation, e.g. `1m`.
    pub bar: String,
}

impl StrategyParams {
    pub fn new(
        thresholds: Thresholds,
        costs: CostModel,
        initial_capital: f64,
        bar: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let params = Self {
            thresholds,
            costs,
            initial_capital,
            bar: bar.into(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(EngineError::InvalidCapital(self.initial_capital));
        }
        Ok(())
    }

    /// Copy with different thresholds and costs.
    pub fn with_overrides(&self, thresholds: Thresholds, costs: CostModel) -> Self {
        Self {
            thresholds,
            costs,
            ..self.clone()
        }
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            costs: CostModel::default(),
            initial_capital: 10_000.0,
            bar: "1m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Full output of one simulation. Per-row vectors share the feature set's
/// index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub signals: Vec<Signal>,
    pub returns: StrategyReturns,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
}

impl Simulation {
    pub fn positions(&self) -> &[Signal] {
        &self.returns.positions
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity.iter().map(|p| p.equity).collect()
    }
}

pub fn simulate(
    features: &FeatureSet,
    probabilities: &[f64],
    params: &StrategyParams,
) -> Result<Simulation, EngineError> {
    params.validate()?;
    if probabilities.len() != features.len() {
        return Err(EngineError::ProbabilityCount {
            expected: features.len(),
            actual: probabilities.len(),
        });
    }

    let clamped: Vec<f64> = probabilities.iter().map(|p| p.clamp(0.0, 1.0)).collect();
    let signals = signals_from_probabilities(&clamped, &params.thresholds);
    let returns = strategy_returns(&signals, features.close_returns(), &params.costs)?;

    let values = equity_curve(&returns.net, params.initial_capital);
    let trades = extract_trades(&returns.positions, &values);
    let metrics = BacktestMetrics::compute(
        &returns.net,
        &returns.positions,
        &values,
        &trades,
        params.initial_capital,
        periods_per_year(&params.bar),
    );

    let equity = features
        .timestamps()
        .iter()
        .zip(&values)
        .map(|(&timestamp, &equity)| EquityPoint { timestamp, equity })
        .collect();

    Ok(Simulation {
        signals,
        returns,
        equity,
        trades,
        metrics,
    })
}
