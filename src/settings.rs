//! Code for loading program settings.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// The default log level for the program
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_max_iterations() -> usize {
    500
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_initial_price() -> f64 {
    1.0
}

fn default_bracket_interval() -> f64 {
    1.0
}

/// Parameters controlling the equilibrium solver
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SolverSettings {
    /// Maximum number of price-adjustment iterations per period
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Relative tolerance on the supply/demand imbalance for a market to count as cleared
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Seed price for all markets in the first period
    #[serde(default = "default_initial_price")]
    pub initial_price: f64,
    /// Fractional price step used to widen the bracket before the excess-demand sign flips
    #[serde(default = "default_bracket_interval")]
    pub bracket_interval: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            initial_price: default_initial_price(),
            bracket_interval: default_bracket_interval(),
        }
    }
}

/// Program settings from config file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Solver parameters
    #[serde(default)]
    pub solver: SolverSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: default_log_level(),
            solver: SolverSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from the given TOML file.
    ///
    /// If the file is not present, default values for settings will be used.
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(file_path)
            .with_context(|| format!("Could not read {}", file_path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Could not parse {}", file_path.display()))
    }
}
