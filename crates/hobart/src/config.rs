//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `HOBART_*` environment variables (nested keys use `__`, for example
//! `HOBART_REGION_LIMITS__US=0.4`). `OPENAI_API_KEY`, `AGENTS_BASE_URL` and
//! `OPENAI_MODEL` configure the text generator.

use hobart_data::{OpenAiTextGenerator, TextGenerator};
use hobart_optimizer::{ConstraintError, Constraints, Target};
use hobart_scoring::{ScoreWeights, SignalThresholds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "HOBART";

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// The configured constraints are invalid
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// The text generator could not be built
    #[error(transparent)]
    Data(#[from] hobart_data::DataError),
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cap on total weight per region
    pub region_limits: BTreeMap<String, f64>,
    /// Cap on each position
    pub position_limit: f64,
    /// Minimum cash weight
    pub cash_min: f64,
    /// Maximum cash weight
    pub cash_max: f64,
    /// Weight of expected return against variance
    pub risk_aversion: f64,
    /// Optional annualized volatility cap
    pub target_vol: Option<f64>,
    /// Objective when no trade-off applies
    pub target: Target,
    /// Where artifacts are written
    pub output_dir: PathBuf,
    /// Directory holding `{REGION}.csv` universes
    pub universe_dir: PathBuf,
    /// Price history window in calendar days
    pub lookback_days: u32,
    /// Candidates kept per region
    pub top_n: usize,
    /// Regions screened at once
    pub concurrency: usize,
    /// Sub-score weights
    pub score_weights: ScoreWeights,
    /// Buy-signal thresholds
    pub signals: SignalThresholds,
    /// SQLite price cache; the platform cache directory when unset
    pub cache_path: Option<PathBuf>,
    /// Text generation model
    pub model: Option<String>,
    /// Text generation API key
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    /// Text generation base URL
    pub agents_base_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region_limits: BTreeMap::from([
                ("US".to_string(), 0.5),
                ("JP".to_string(), 0.3),
                ("EU".to_string(), 0.3),
                ("CN".to_string(), 0.2),
            ]),
            position_limit: 0.07,
            cash_min: 0.0,
            cash_max: 0.10,
            risk_aversion: 0.0,
            target_vol: None,
            target: Target::MinVol,
            output_dir: PathBuf::from("./artifacts"),
            universe_dir: PathBuf::from("./data/universe"),
            lookback_days: 260,
            top_n: 50,
            concurrency: 4,
            score_weights: ScoreWeights::default(),
            signals: SignalThresholds::default(),
            cache_path: None,
            model: None,
            openai_api_key: None,
            agents_base_url: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment and an optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Load from an explicit environment map and an optional TOML file.
    pub fn load_with_env(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let text_generation = [
            ("openai_api_key", env.get("OPENAI_API_KEY").cloned()),
            ("agents_base_url", env.get("AGENTS_BASE_URL").cloned()),
            ("model", env.get("OPENAI_MODEL").cloned()),
        ];

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(env)),
        );
        for (key, value) in text_generation {
            if value.is_some() {
                builder = builder.set_override_option(key, value)?;
            }
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.region_limits = cfg
            .region_limits
            .into_iter()
            .map(|(region, limit)| (region.to_uppercase(), limit))
            .collect();

        tracing::debug!(?path, position_limit = cfg.position_limit, "configuration loaded");
        Ok(cfg)
    }

    /// Validated optimizer constraints.
    pub fn constraints(&self) -> Result<Constraints, ConfigError> {
        Ok(Constraints::builder()
            .region_limits(self.region_limits.clone())
            .position_limit(self.position_limit)
            .cash_bounds(self.cash_min, self.cash_max)
            .target(self.target)
            .risk_aversion(self.risk_aversion)
            .target_vol(self.target_vol)
            .build()?)
    }

    /// Text generator; unavailable unless an API key is configured.
    pub fn text_generator(&self) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        Ok(Arc::new(OpenAiTextGenerator::new(
            self.agents_base_url.clone(),
            self.openai_api_key.clone(),
            self.model.clone(),
        )?))
    }
}
