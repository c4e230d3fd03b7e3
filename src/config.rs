use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::{Cents, Room};
use crate::pagination::{PaginationDefaults, Sort};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Where the nightly rate of a stay comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateSource {
    /// The room's own catalog price.
    #[default]
    Catalog,
    /// One rate for every room.
    Flat(Cents),
}

impl RateSource {
    pub fn nightly_rate(&self, room: &Room) -> Cents {
        match self {
            RateSource::Catalog => room.price,
            RateSource::Flat(rate) => *rate,
        }
    }
}

/// Settings the engine needs; passed to `Engine::new`, never read from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub rate_source: RateSource,
    /// `chrono` format string for check-in/check-out input.
    pub date_format: String,
    pub pagination: PaginationDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_source: RateSource::Catalog,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            pagination: PaginationDefaults::default(),
        }
    }
}

/// Process-level settings for the `innkeep` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Compact the WAL once this many appends have accumulated.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub metrics_port: Option<u16>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            metrics_port: None,
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl Config {
    /// Load from `INNKEEP_*` environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(dir) = lookup("INNKEEP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "INNKEEP_COMPACT_THRESHOLD")? {
            config.compact_threshold = v;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "INNKEEP_COMPACT_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(invalid("INNKEEP_COMPACT_INTERVAL_SECS", "0"));
            }
            config.compact_interval = Duration::from_secs(secs);
        }
        config.metrics_port = parse_var::<u16>(&lookup, "INNKEEP_METRICS_PORT")?;

        if let Some(fmt) = lookup("INNKEEP_DATE_FORMAT") {
            if fmt.trim().is_empty() {
                return Err(invalid("INNKEEP_DATE_FORMAT", &fmt));
            }
            config.engine.date_format = fmt;
        }
        if let Some(rate) = parse_var::<Cents>(&lookup, "INNKEEP_FLAT_RATE")? {
            if rate == 0 {
                return Err(invalid("INNKEEP_FLAT_RATE", "0"));
            }
            config.engine.rate_source = RateSource::Flat(rate);
        }
        if let Some(limit) = parse_var::<u32>(&lookup, "INNKEEP_PAGE_LIMIT")? {
            config.engine.pagination.limit = limit;
        }
        if let Some(max) = parse_var::<u32>(&lookup, "INNKEEP_MAX_PAGE_LIMIT")? {
            config.engine.pagination.max_limit = max;
        }
        if let Some(sort) = parse_var::<Sort>(&lookup, "INNKEEP_SORT")? {
            config.engine.pagination.sort = sort;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(var, &raw)),
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError {
        var,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pagination::{Direction, SortField};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.date_format, "%Y-%m-%d");
        assert_eq!(config.engine.rate_source, RateSource::Catalog);
    }

    #[test]
    fn reads_every_recognised_var() {
        let config = Config::from_lookup(lookup(&[
            ("INNKEEP_DATA_DIR", "/var/lib/innkeep"),
            ("INNKEEP_COMPACT_THRESHOLD", "50"),
            ("INNKEEP_COMPACT_INTERVAL_SECS", "5"),
            ("INNKEEP_METRICS_PORT", "9100"),
            ("INNKEEP_DATE_FORMAT", "%d/%m/%Y"),
            ("INNKEEP_FLAT_RATE", "9900"),
            ("INNKEEP_PAGE_LIMIT", "25"),
            ("INNKEEP_MAX_PAGE_LIMIT", "50"),
            ("INNKEEP_SORT", "check_in_date asc"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/innkeep"));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.compact_interval, Duration::from_secs(5));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.engine.date_format, "%d/%m/%Y");
        assert_eq!(config.engine.rate_source, RateSource::Flat(9900));
        assert_eq!(config.engine.pagination.limit, 25);
        assert_eq!(config.engine.pagination.max_limit, 50);
        assert_eq!(
            config.engine.pagination.sort,
            Sort::new(SortField::CheckIn, Direction::Asc)
        );
    }

    #[test]
    fn rejects_malformed_values() {
        let err = Config::from_lookup(lookup(&[("INNKEEP_METRICS_PORT", "ninety")])).unwrap_err();
        assert_eq!(err.var, "INNKEEP_METRICS_PORT");

        let err = Config::from_lookup(lookup(&[("INNKEEP_FLAT_RATE", "0")])).unwrap_err();
        assert_eq!(err.var, "INNKEEP_FLAT_RATE");

        let err = Config::from_lookup(lookup(&[("INNKEEP_SORT", "password")])).unwrap_err();
        assert_eq!(err.var, "INNKEEP_SORT");
    }
}
