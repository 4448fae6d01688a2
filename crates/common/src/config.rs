use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::Granularity;

const DEFAULT_MODEL_PATH: &str = "models/strategy.onnx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Trend,
    Range,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trend" => Ok(Self::Trend),
            "range" => Ok(Self::Range),
            other => Err(format!("unknown strategy {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_url: String,
    pub tracked_symbols: Option<Vec<String>>,
    pub intraday_granularity: Granularity,
    pub intraday_limit: Option<u32>,
    pub strategies: Vec<StrategyKind>,
    pub model_path: PathBuf,
    pub confidence_threshold: f64,
    pub prediction_window: usize,
    pub features_dir: PathBuf,
    pub busy_timeout_secs: u64,
    pub account_balance: f64,
    pub risk_per_trade: f64,
    pub pip_value: f64,
}

impl PipelineConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workdir = lookup("WORKDIR").ok_or(ConfigError::Missing("WORKDIR"))?;

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| format!("sqlite:{}/sqlitedata/forex_brain.db", workdir));

        let tracked_symbols = lookup("TRACKED_SYMBOLS").map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        let intraday_granularity = match lookup("INTRADAY_GRANULARITY") {
            Some(raw) => {
                let g = raw.parse::<Granularity>().map_err(|e| ConfigError::Invalid {
                    key: "INTRADAY_GRANULARITY",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                if !g.is_intraday() {
                    return Err(ConfigError::Invalid {
                        key: "INTRADAY_GRANULARITY",
                        value: raw,
                        reason: "signals need an intraday series".into(),
                    });
                }
                g
            }
            None => Granularity::H1,
        };

        let intraday_limit = match parse_var::<u32>(&lookup, "INTRADAY_LIMIT")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(5000),
        };

        let strategies = match lookup("SIGNAL_STRATEGIES") {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.parse::<StrategyKind>().map_err(|reason| ConfigError::Invalid {
                        key: "SIGNAL_STRATEGIES",
                        value: raw.clone(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![StrategyKind::Trend],
        };

        let confidence_threshold =
            parse_var::<f64>(&lookup, "CONFIDENCE_THRESHOLD")?.unwrap_or(0.75);
        if !(confidence_threshold > 0.0 && confidence_threshold < 1.0) {
            return Err(ConfigError::Invalid {
                key: "CONFIDENCE_THRESHOLD",
                value: confidence_threshold.to_string(),
                reason: "must lie strictly between 0 and 1".into(),
            });
        }

        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let risk_per_trade = parse_var::<f64>(&lookup, "RISK_PER_TRADE")?.unwrap_or(0.01);
        if !(risk_per_trade > 0.0 && risk_per_trade <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "RISK_PER_TRADE",
                value: risk_per_trade.to_string(),
                reason: "must lie in (0, 1]".into(),
            });
        }

        let features_dir = lookup("FEATURES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&workdir).join("processed"));

        Ok(Self {
            database_url,
            tracked_symbols,
            intraday_granularity,
            intraday_limit,
            strategies,
            model_path,
            confidence_threshold,
            prediction_window: parse_var(&lookup, "PREDICTION_WINDOW")?.unwrap_or(100),
            features_dir,
            busy_timeout_secs: parse_var(&lookup, "DB_BUSY_TIMEOUT_SECS")?.unwrap_or(30),
            account_balance: parse_var(&lookup, "ACCOUNT_BALANCE")?.unwrap_or(10_000.0),
            risk_per_trade,
            pip_value: parse_var(&lookup, "PIP_VALUE")?.unwrap_or(10.0),
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}
