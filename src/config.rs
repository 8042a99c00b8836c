//! Search Configuration
//!
//! Everything a search run needs besides the graph: which searcher, depth
//! limit, K, threshold and output order. Loaded from `KSPA_*` environment
//! variables (with `.env` support) or a TOML file.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::brain::{LimitOrderFilter, RankedPath, SearchOptions, SearcherKind, SortOrder, ThresholdMode};
use crate::cartographer::VertexId;

// ============================================
// THRESHOLD SETTING
// ============================================

/// How the path-weight cutoff is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSetting {
    /// No cutoff at all
    NotUsed,
    /// Arbitrage only (compounded rate above 1)
    Zero,
    /// Below the mean weight of all paths in the pass
    Mean,
    /// Below mean minus one standard deviation
    MeanStdDev,
    /// Below `custom_threshold`
    Custom,
}

impl Default for ThresholdSetting {
    fn default() -> Self {
        ThresholdSetting::Zero
    }
}

impl std::fmt::Display for ThresholdSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdSetting::NotUsed => write!(f, "not_used"),
            ThresholdSetting::Zero => write!(f, "zero"),
            ThresholdSetting::Mean => write!(f, "mean"),
            ThresholdSetting::MeanStdDev => write!(f, "mean_std_dev"),
            ThresholdSetting::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for ThresholdSetting {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "not_used" | "none" => Ok(ThresholdSetting::NotUsed),
            "zero" => Ok(ThresholdSetting::Zero),
            "mean" => Ok(ThresholdSetting::Mean),
            "mean_std_dev" | "mean_stddev" => Ok(ThresholdSetting::MeanStdDev),
            "custom" => Ok(ThresholdSetting::Custom),
            other => Err(eyre::eyre!("unknown threshold mode '{}'", other)),
        }
    }
}

/// A set but unparsable variable is an error, an unset or empty one is `None`.
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|e| eyre::eyre!("invalid {}={}: {}", name, raw, e)),
        _ => Ok(None),
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Search Settings ==========
    /// Searcher variant: memo, colored or stacked
    pub algorithm: SearcherKind,

    /// Maximum hops per path. Unset means vertex count - 1.
    pub depth_limit: Option<usize>,

    /// Number of paths kept per (source, target) pair
    pub top_k: usize,

    // ========== Filtering ==========
    pub threshold_mode: ThresholdSetting,

    /// Used only with `threshold_mode = "custom"`
    pub custom_threshold: Option<f64>,

    /// Restrict results to paths through at least one limit order
    pub limit_order_filter: LimitOrderFilter,

    // ========== Output ==========
    pub sort_order: SortOrder,

    /// Spread fan-out searches over the rayon pool
    pub parallel: bool,

    /// Append one JSON line per search here
    pub journal_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            algorithm: parse_env("KSPA_ALGORITHM")?.unwrap_or(defaults.algorithm),
            depth_limit: env::var("KSPA_DEPTH_LIMIT").ok().and_then(|s| s.parse().ok()),
            top_k: env::var("KSPA_TOP_K")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            threshold_mode: parse_env("KSPA_THRESHOLD_MODE")?.unwrap_or(defaults.threshold_mode),
            custom_threshold: env::var("KSPA_CUSTOM_THRESHOLD").ok().and_then(|s| s.parse().ok()),
            limit_order_filter: match env::var("KSPA_LIMIT_ORDER_FILTER")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "limit_orders_only" | "only" => LimitOrderFilter::LimitOrdersOnly,
                _ => LimitOrderFilter::AllPaths,
            },

            sort_order: match env::var("KSPA_SORT_ORDER")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "descending" | "desc" => SortOrder::Descending,
                _ => SortOrder::Ascending,
            },
            parallel: env::var("KSPA_PARALLEL")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            journal_path: env::var("KSPA_JOURNAL_PATH").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(eyre::eyre!("TOP_K must be at least 1"));
        }
        if self.depth_limit == Some(0) {
            return Err(eyre::eyre!("DEPTH_LIMIT must be at least 1 when set"));
        }
        if self.threshold_mode == ThresholdSetting::Custom {
            match self.custom_threshold {
                None => return Err(eyre::eyre!("threshold mode 'custom' requires CUSTOM_THRESHOLD")),
                Some(t) if !t.is_finite() => {
                    return Err(eyre::eyre!("CUSTOM_THRESHOLD must be finite (currently {})", t))
                }
                Some(_) => {}
            }
        }
        if self.algorithm != SearcherKind::Memoized
            && matches!(self.threshold_mode, ThresholdSetting::Mean | ThresholdSetting::MeanStdDev)
        {
            return Err(eyre::eyre!(
                "threshold mode '{}' needs the memo searcher (currently '{}')",
                self.threshold_mode,
                self.algorithm
            ));
        }
        Ok(())
    }

    /// Library-level options for `new_searcher`.
    pub fn search_options(&self) -> SearchOptions {
        let threshold = match self.threshold_mode {
            ThresholdSetting::NotUsed => ThresholdMode::NotUsed,
            ThresholdSetting::Zero => ThresholdMode::Zero,
            ThresholdSetting::Mean => ThresholdMode::Mean,
            ThresholdSetting::MeanStdDev => ThresholdMode::MeanStdDev,
            ThresholdSetting::Custom => ThresholdMode::Custom(self.custom_threshold.unwrap_or(0.0)),
        };

        SearchOptions {
            depth_limit: self.depth_limit,
            threshold,
            limit_order_filter: self.limit_order_filter,
            sort_order: self.sort_order,
            parallel: self.parallel,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let depth = self
            .depth_limit
            .map(|d| d.to_string())
            .unwrap_or_else(|| "vertices - 1".to_string());
        let threshold = match (self.threshold_mode, self.custom_threshold) {
            (ThresholdSetting::Custom, Some(t)) => format!("custom ({})", t),
            (mode, _) => mode.to_string(),
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 KSPA - CONFIGURATION                       ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ • Algorithm:       {:^40} ║", self.algorithm);
        println!("║ • Depth Limit:     {:^40} ║", depth);
        println!("║ • Top K:           {:^40} ║", self.top_k);
        println!("║ • Threshold:       {:^40} ║", threshold);
        println!("║ • Limit Orders:    {:^40} ║",
            if self.limit_order_filter == LimitOrderFilter::LimitOrdersOnly { "required" } else { "any path" }
        );
        println!("║ • Parallel:        {:^40} ║", if self.parallel { "✓ Enabled" } else { "✗ Disabled" });
        println!("║ • Journal:         {:^40} ║", self.journal_path.as_deref().unwrap_or("✗ Disabled"));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: SearcherKind::Memoized,
            depth_limit: None,
            top_k: 10,
            threshold_mode: ThresholdSetting::Zero,
            custom_threshold: None,
            limit_order_filter: LimitOrderFilter::AllPaths,
            sort_order: SortOrder::Ascending,
            parallel: false,
            journal_path: None,
        }
    }
}

// ============================================
// SEARCH JOURNAL
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// One ranked path as written to the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalPath {
    pub chain: Vec<String>,
    pub vertices: Vec<VertexId>,
    pub weight: f64,
    pub rate: f64,
}

impl From<&RankedPath> for JournalPath {
    fn from(path: &RankedPath) -> Self {
        Self {
            chain: path.quotes.iter().map(|q| q.external_id.clone()).collect(),
            vertices: path.vertices(),
            weight: path.weight,
            rate: path.rate(),
        }
    }
}

/// Record of one search, appended as a JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub algorithm: SearcherKind,
    pub source: VertexId,
    pub target: VertexId,
    pub paths: Vec<JournalPath>,
}

impl SearchReport {
    pub fn new(operation: &str, algorithm: SearcherKind, source: VertexId, target: VertexId, paths: &[RankedPath]) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            algorithm,
            source,
            target,
            paths: paths.iter().map(JournalPath::from).collect(),
        }
    }

    /// Append this report to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Quote;
    use crate::cartographer::EdgeKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.algorithm, SearcherKind::Memoized);
        assert_eq!(config.top_k, 10);
        assert!(config.validate().is_ok());
        assert_eq!(config.search_options().threshold, ThresholdMode::Zero);
    }

    #[test]
    fn test_validation() {
        let mut config = Config {
            threshold_mode: ThresholdSetting::Custom,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.custom_threshold = Some(-0.01);
        assert!(config.validate().is_ok());
        assert_eq!(config.search_options().threshold, ThresholdMode::Custom(-0.01));

        config.custom_threshold = Some(f64::NAN);
        assert!(config.validate().is_err());

        let config = Config {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            algorithm: SearcherKind::Colored,
            threshold_mode: ThresholdSetting::Mean,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_rejects_unknown_names() {
        assert_eq!("Mean_Std_Dev".parse::<ThresholdSetting>().unwrap(), ThresholdSetting::MeanStdDev);
        assert!("median".parse::<ThresholdSetting>().is_err());

        std::env::set_var("KSPA_ALGORITHM", "dijkstra");
        let result = Config::from_env();
        std::env::remove_var("KSPA_ALGORITHM");
        assert!(result.is_err());
        assert!(Config::from_env().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            algorithm: SearcherKind::Stacked,
            depth_limit: Some(4),
            threshold_mode: ThresholdSetting::NotUsed,
            sort_order: SortOrder::Descending,
            ..Default::default()
        };
        let path = std::env::temp_dir().join(format!("kspa_config_{}.toml", std::process::id()));
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.algorithm, SearcherKind::Stacked);
        assert_eq!(loaded.depth_limit, Some(4));
        assert_eq!(loaded.threshold_mode, ThresholdSetting::NotUsed);
        assert_eq!(loaded.sort_order, SortOrder::Descending);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("algorithm = \"colored\"\ntop_k = 3\n").unwrap();
        assert_eq!(config.algorithm, SearcherKind::Colored);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.threshold_mode, ThresholdSetting::Zero);
    }

    #[test]
    fn test_journal_append() {
        let path = std::env::temp_dir()
            .join(format!("kspa_journal_{}", std::process::id()))
            .join("searches.jsonl");
        let ranked = RankedPath {
            quotes: vec![Quote {
                external_id: "q1".to_string(),
                origin: 1,
                destination: 1,
                rate: 1.25,
                weight: -(1.25f64.ln()),
                kind: EdgeKind::Regular,
            }],
            weight: -(1.25f64.ln()),
        };

        let report = SearchReport::new("top_k", SearcherKind::Memoized, 1, 1, &[ranked]);
        report.append_to_file(&path).unwrap();
        report.append_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: SearchReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.paths[0].chain, vec!["q1"]);
        assert_eq!(parsed.paths[0].vertices, vec![1, 1]);
        assert!((parsed.paths[0].rate - 1.25).abs() < 1e-12);
    }
}
