use crate::error::{Result, ScraperError};
use crate::parsing::last_entry::PmAssumption;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Cities to scrape from the marketplace API
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,
    #[serde(default = "default_limit_per_city")]
    pub limit_per_city: usize,
    /// Bounds for the randomized delay between page requests
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// When to assume a bare hour is PM: "bare-only", "always" or "off".
    /// The scraped sources are inconsistent about am/pm markers, so this
    /// stays configurable rather than baked in.
    #[serde(default = "default_pm_assumption")]
    pub pm_assumption: String,
    #[serde(default = "default_pm_window_start")]
    pub pm_window_start: u32,
    #[serde(default = "default_pm_window_end")]
    pub pm_window_end: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_cities() -> Vec<String> {
    ["london", "manchester", "nottingham", "birmingham", "leeds"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_limit_per_city() -> usize {
    100
}

fn default_min_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    1250
}

fn default_interval_hours() -> u64 {
    6
}

fn default_pm_assumption() -> String {
    "bare-only".to_string()
}

fn default_pm_window_start() -> u32 {
    6
}

fn default_pm_window_end() -> u32 {
    11
}

fn default_similarity_threshold() -> f64 {
    0.75
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            limit_per_city: default_limit_per_city(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            pm_assumption: default_pm_assumption(),
            pm_window_start: default_pm_window_start(),
            pm_window_end: default_pm_window_end(),
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Load config.toml if present, otherwise fall back to defaults.
    pub fn load_or_default() -> Self {
        if Path::new("config.toml").exists() {
            match Self::load() {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config.toml, using defaults: {}", e);
                }
            }
        }
        Config::default()
    }
}

impl ParserConfig {
    pub fn pm_assumption(&self) -> PmAssumption {
        let window = self.pm_window_start..=self.pm_window_end;
        match self.pm_assumption.as_str() {
            "off" => PmAssumption::Off,
            "always" => PmAssumption::Always(window),
            _ => PmAssumption::BareOnly(window),
        }
    }
}
