use crate::period::WeekStart;
use crate::source::SourceKind;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Week-start convention shared by every bucketer in the process.
    pub week_start: WeekStart,
    pub lookback_weeks: u32,
    pub currency_grouping: bool,
    pub ratio_suffix: String,
    pub registry_path: Option<String>,
    pub source: SourceKind,
    pub fixture_path: String,
    pub synthetic_seed: u64,
    /// Relative spread of synthetic values around the benchmark.
    pub synthetic_spread: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Monday,
            lookback_weeks: 4,
            currency_grouping: false,
            ratio_suffix: String::new(),
            registry_path: None,
            source: SourceKind::Synthetic,
            fixture_path: "./fixtures/metrics.json".to_string(),
            synthetic_seed: 42,
            synthetic_spread: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            week_start: std::env::var("WEEK_START").ok().and_then(|v| v.parse().ok()).unwrap_or(d.week_start),
            lookback_weeks: std::env::var("LOOKBACK_WEEKS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.lookback_weeks),
            currency_grouping: std::env::var("CURRENCY_GROUPING").map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(d.currency_grouping),
            ratio_suffix: std::env::var("RATIO_SUFFIX").unwrap_or(d.ratio_suffix),
            registry_path: std::env::var("METRICS_REGISTRY").ok().filter(|v| !v.is_empty()),
            source: std::env::var("METRIC_SOURCE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.source),
            fixture_path: std::env::var("FIXTURE_PATH").unwrap_or(d.fixture_path),
            synthetic_seed: std::env::var("SYNTH_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(d.synthetic_seed),
            synthetic_spread: std::env::var("SYNTH_SPREAD").ok().and_then(|v| v.parse::<f64>().ok()).filter(|s| s.is_finite() && *s >= 0.0).unwrap_or(d.synthetic_spread),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.week_start, WeekStart::Monday);
        assert_eq!(cfg.lookback_weeks, 4);
        assert_eq!(cfg.source, SourceKind::Synthetic);
        assert!(cfg.registry_path.is_none());
    }
}
