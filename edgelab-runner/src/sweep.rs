//! Threshold/cost sweep over one set of predictions.
//!
//! Features and probabilities are computed once; each grid point only
//! re-runs the pure signal → cost → equity → metrics chain, so the points
//! are evaluated in parallel with rayon.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use edgelab_core::cost::CostModel;
use edgelab_core::engine::{simulate, EngineError, StrategyParams};
use edgelab_core::evaluate::BacktestMetrics;
use edgelab_core::features::FeatureSet;
use edgelab_core::signal::Thresholds;

/// Parameter grid: threshold pairs × cost levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    /// Short thresholds to test.
    pub thr_short: Vec<f64>,
    /// Long thresholds to test.
    pub thr_long: Vec<f64>,
    /// Fee levels in basis points.
    pub fee_bps: Vec<f64>,
    /// Slippage levels in basis points.
    pub slippage_bps: Vec<f64>,
}

impl SweepGrid {
    /// A small grid around the usual 0.45/0.55 band at the given costs.
    pub fn around(costs: &CostModel) -> Self {
        Self {
            thr_short: vec![0.35, 0.40, 0.45, 0.50],
            thr_long: vec![0.50, 0.55, 0.60, 0.65],
            fee_bps: vec![costs.fee_bps()],
            slippage_bps: vec![costs.slippage_bps()],
        }
    }

    /// Total number of combinations, including ones that will be skipped.
    pub fn size(&self) -> usize {
        self.thr_short.len() * self.thr_long.len() * self.fee_bps.len() * self.slippage_bps.len()
    }

    /// All valid parameter combinations, in grid order.
    ///
    /// Threshold pairs with `short >= long` and negative costs are skipped.
    pub fn combinations(&self) -> Vec<(Thresholds, CostModel)> {
        let mut combos = Vec::with_capacity(self.size());
        for &short in &self.thr_short {
            for &long in &self.thr_long {
                let Ok(thresholds) = Thresholds::new(short, long) else {
                    debug!(short, long, "skipping invalid threshold pair");
                    continue;
                };
                for &fee in &self.fee_bps {
                    for &slip in &self.slippage_bps {
                        match CostModel::new(fee, slip) {
                            Ok(costs) => combos.push((thresholds, costs)),
                            Err(e) => debug!(fee, slip, error = %e, "skipping invalid cost level"),
                        }
                    }
                }
            }
        }
        combos
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub thr_short: f64,
    pub thr_long: f64,
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub metrics: BacktestMetrics,
}

/// Results from a sweep, best Sharpe first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    points: Vec<SweepPoint>,
    skipped: usize,
}

impl SweepResults {
    fn new(mut points: Vec<SweepPoint>, skipped: usize) -> Self {
        // Stable: ties keep grid order.
        points.sort_by(|a, b| b.metrics.sharpe.total_cmp(&a.metrics.sharpe));
        Self { points, skipped }
    }

    pub fn all(&self) -> &[SweepPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of grid combinations that were not evaluated.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn best(&self) -> Option<&SweepPoint> {
        self.points.first()
    }

    pub fn top_n(&self, n: usize) -> &[SweepPoint] {
        &self.points[..n.min(self.points.len())]
    }
}

/// Evaluate every valid grid point against the same features and probabilities.
pub fn run_sweep(
    features: &FeatureSet,
    probabilities: &[f64],
    base: &StrategyParams,
    grid: &SweepGrid,
) -> Result<SweepResults, EngineError> {
    let combos = grid.combinations();
    let skipped = grid.size() - combos.len();

    let points = combos
        .par_iter()
        .map(|&(thresholds, costs)| {
            let params = base.with_overrides(thresholds, costs);
            let sim = simulate(features, probabilities, &params)?;
            Ok(SweepPoint {
                thr_short: thresholds.short(),
                thr_long: thresholds.long(),
                fee_bps: costs.fee_bps(),
                slippage_bps: costs.slippage_bps(),
                metrics: sim.metrics,
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;

    info!(evaluated = points.len(), skipped, "sweep complete");
    Ok(SweepResults::new(points, skipped))
}
