//! Application configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. `validate()` runs once after loading and again after CLI
//! overrides are applied; the core only ever sees validated, immutable
//! parameter objects built by `strategy_params()`.

use edgelab_core::bar_size::horizon_steps;
use edgelab_core::cost::CostModel;
use edgelab_core::data::OkxSettings;
use edgelab_core::engine::{EngineError, StrategyParams};
use edgelab_core::signal::{SignalError, Thresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("thr_short ({short}) must be below thr_long ({long}), both within [0, 1]")]
    InvalidThresholds { short: f64, long: f64 },

    #[error("initial capital must be finite and > 0, got {0}")]
    InvalidCapital(f64),

    #[error("{name} must be finite and >= 0, got {value}")]
    NegativeCost { name: &'static str, value: f64 },

    #[error("test_size must be in (0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("market.limit must be at least 1")]
    ZeroLimit,

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

// ── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// OKX instrument id, e.g. `BTC-USDT`.
    pub inst: String,
    /// Candle size, e.g. `1m`, `5m`, `1H`.
    pub bar: String,
    /// Number of candles to request.
    pub limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            inst: "BTC-USDT".to_string(),
            bar: "1m".to_string(),
            limit: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub horizon_minutes: u32,
    pub test_size: f64,
    pub random_state: u64,
    pub model_dir: PathBuf,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// L2 penalty strength.
    pub l2: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            horizon_minutes: 5,
            test_size: 0.2,
            random_state: 42,
            model_dir: PathBuf::from("models"),
            learning_rate: 0.1,
            max_iter: 500,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub thr_long: f64,
    pub thr_short: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            thr_long: 0.55,
            thr_short: 0.45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostsConfig {
    pub fee_bps: f64,
    pub slippage_bps: f64,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            fee_bps: 5.0,
            slippage_bps: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Root directory for saved run artifacts.
    pub output_dir: PathBuf,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            output_dir: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".cache/okx"),
            ttl_seconds: 120,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

// ── Root ────────────────────────────────────────────────────────────

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub model: ModelConfig,
    pub strategy: StrategyConfig,
    pub costs: CostsConfig,
    pub backtest: BacktestConfig,
    pub cache: CacheConfig,
    pub okx: OkxSettings,
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }

        self.thresholds()?;

        let capital = self.backtest.initial_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(ConfigError::InvalidCapital(capital));
        }

        for (name, value) in [
            ("fee_bps", self.costs.fee_bps),
            ("slippage_bps", self.costs.slippage_bps),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeCost { name, value });
            }
        }

        let test_size = self.model.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ConfigError::InvalidTestSize(test_size));
        }
        if !(self.model.learning_rate.is_finite() && self.model.learning_rate > 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "learning_rate must be > 0, got {}",
                self.model.learning_rate
            )));
        }
        if !(self.model.l2.is_finite() && self.model.l2 >= 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "l2 must be >= 0, got {}",
                self.model.l2
            )));
        }
        if !(self.okx.backoff_secs.is_finite() && self.okx.backoff_secs >= 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "okx.backoff_secs must be >= 0, got {}",
                self.okx.backoff_secs
            )));
        }

        Ok(())
    }

    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        Thresholds::new(self.strategy.thr_short, self.strategy.thr_long).map_err(|_| {
            ConfigError::InvalidThresholds {
                short: self.strategy.thr_short,
                long: self.strategy.thr_long,
            }
        })
    }

    pub fn cost_model(&self) -> Result<CostModel, ConfigError> {
        Ok(CostModel::new(self.costs.fee_bps, self.costs.slippage_bps)?)
    }

    /// Immutable parameter object for the core engine.
    pub fn strategy_params(&self) -> Result<StrategyParams, ConfigError> {
        Ok(StrategyParams::new(
            self.thresholds()?,
            self.cost_model()?,
            self.backtest.initial_capital,
            self.market.bar.clone(),
        )?)
    }

    /// Forward horizon in bars for the configured bar size.
    pub fn horizon_steps(&self) -> usize {
        horizon_steps(&self.market.bar, self.model.horizon_minutes)
    }

    /// BLAKE3 hash of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
