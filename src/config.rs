use std::path::PathBuf;

use crate::logging::{obj, v_str, warn, Domain};
use crate::order::DEFAULT_UNITS_PER_NODE;
use crate::source::SourceKind;

pub const DEFAULT_SF_BIN: &str = "sf";
pub const DEFAULT_SF_ARGS: &str = "orders ls --public";
pub const DEFAULT_API_BASE: &str = "https://api.sfcompute.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub source: SourceKind,
    pub sf_bin: String,
    pub sf_args: Vec<String>,
    pub input_path: Option<PathBuf>,
    pub api_base: String,
    pub api_token: Option<String>,
    pub api_timeout_secs: u64,
    /// Divisor turning node-hours into GPU-hours.
    pub units_per_node: u32,
    /// Hide orders starting further out than this many hours.
    pub max_future_hours: Option<f64>,
    pub chart_width: usize,
    pub chart_height: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::Cli,
            sf_bin: DEFAULT_SF_BIN.to_string(),
            sf_args: split_args(DEFAULT_SF_ARGS),
            input_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            api_timeout_secs: 30,
            units_per_node: DEFAULT_UNITS_PER_NODE,
            max_future_hours: None,
            chart_width: 72,
            chart_height: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            source: SourceKind::from_env(),
            sf_bin: std::env::var("SF_BIN").unwrap_or(d.sf_bin),
            sf_args: std::env::var("SF_ARGS").map(|v| split_args(&v)).unwrap_or(d.sf_args),
            input_path: std::env::var("SF_INPUT").ok().map(PathBuf::from),
            api_base: std::env::var("SF_API_URL").unwrap_or(d.api_base),
            api_token: std::env::var("SF_TOKEN").ok().filter(|t| !t.is_empty()),
            api_timeout_secs: env_parse("SF_API_TIMEOUT_SECS").unwrap_or(d.api_timeout_secs),
            units_per_node: env_parse("UNITS_PER_NODE").unwrap_or(d.units_per_node),
            max_future_hours: positive_hours("MAX_FUTURE_HOURS", env_parse("MAX_FUTURE_HOURS")),
            chart_width: env_parse("CHART_WIDTH").unwrap_or(d.chart_width),
            chart_height: env_parse("CHART_HEIGHT").unwrap_or(d.chart_height),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Horizons must be finite and positive; anything else is dropped with a warning.
fn positive_hours(key: &str, value: Option<f64>) -> Option<f64> {
    let v = value?;
    if v.is_finite() && v > 0.0 {
        return Some(v);
    }
    warn(
        Domain::System,
        "invalid_config",
        obj(&[
            ("key", v_str(key)),
            ("value", v_str(&v.to_string())),
            ("msg", v_str("expected a positive number of hours; ignored")),
        ]),
    );
    None
}

fn split_args(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_public_listing() {
        let cfg = Config::default();
        assert_eq!(cfg.sf_bin, "sf");
        assert_eq!(cfg.sf_args, vec!["orders", "ls", "--public"]);
        assert_eq!(cfg.units_per_node, 8);
        assert_eq!(cfg.source, SourceKind::Cli);
        assert!(cfg.max_future_hours.is_none());
    }

    #[test]
    fn horizon_must_be_positive_and_finite() {
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", Some(12.5)), Some(12.5));
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", None), None);
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", Some(-5.0)), None);
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", Some(0.0)), None);
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", Some(f64::NAN)), None);
        assert_eq!(positive_hours("MAX_FUTURE_HOURS", Some(f64::INFINITY)), None);
    }

    #[test]
    fn split_args_ignores_extra_space() {
        assert_eq!(split_args("  orders  ls "), vec!["orders", "ls"]);
    }
}
