//! Program settings, read from a `settings.toml` in the model directory.
use crate::input::input_err_msg;
use crate::model::ModuleToggles;
use crate::time::TemporalSpec;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Which optional modules are assembled
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct Modules {
    /// Heat balance, heat assets and converters
    #[serde(default)]
    pub heat: bool,
    /// Hydrogen, natural gas, CO2 and industry
    #[serde(default)]
    pub supply_chain: bool,
    /// Whether industrial production may shift freely within the year
    #[serde(default)]
    pub flexible_industry: bool,
}

/// Penalty costs on the slack variables of the non-electric balances.
///
/// The electric balance uses the per-node lost-load cost input instead.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Penalties {
    /// Unserved heat, EUR/MWh
    pub heat_shed: f64,
    /// Unserved hydrogen, EUR/MWh
    pub hydrogen_shed: f64,
    /// Unserved natural gas, EUR/MWh
    pub gas_shed: f64,
    /// Captured CO2 vented instead of sequestered, EUR/t
    pub co2_vent: f64,
    /// Missed industrial production, EUR/t
    pub industry_shortfall: f64,
}

impl Default for Penalties {
    fn default() -> Penalties {
        Penalties {
            heat_shed: 3000.0,
            hydrogen_shed: 5000.0,
            gas_shed: 1000.0,
            co2_vent: 2000.0,
            industry_shortfall: 10_000.0,
        }
    }
}

/// Program settings from the model directory's settings file
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// Shape of the temporal structure
    pub temporal: TemporalSpec,
    /// Optional-module switches
    #[serde(default)]
    pub modules: Modules,
    /// Slack penalty costs
    #[serde(default)]
    pub penalties: Penalties,
    /// Program log level override
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Settings {
    /// Read the settings file from `model_dir`
    pub fn from_path(model_dir: &Path) -> Result<Settings> {
        let file_path = model_dir.join(SETTINGS_FILE_NAME);
        let contents = fs::read_to_string(&file_path).with_context(|| input_err_msg(&file_path))?;
        toml::from_str(&contents).with_context(|| input_err_msg(&file_path))
    }

    /// Module switches in the form the model loader takes
    pub fn toggles(&self) -> ModuleToggles {
        ModuleToggles {
            heat: self.modules.heat,
            supply_chain: self.modules.supply_chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_minimal_settings() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            "[temporal]\n\
             n_periods = 8\n\
             period_step_years = 5\n\
             n_scenarios = 3\n\
             regular_season_hours = 168\n\
             peak_season_hours = 24\n",
        )
        .unwrap();

        let settings = Settings::from_path(dir.path()).unwrap();
        assert_eq!(settings.temporal.n_periods, 8);
        assert_eq!(settings.modules, Modules::default());
        assert_eq!(settings.penalties, Penalties::default());
        assert!(settings.log_level.is_none());
    }

    #[test]
    fn test_missing_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Settings::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_module_switches() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            "[temporal]\n\
             n_periods = 2\n\
             period_step_years = 5\n\
             n_scenarios = 1\n\
             regular_season_hours = 24\n\
             peak_season_hours = 2\n\
             [modules]\n\
             heat = true\n",
        )
        .unwrap();

        let settings = Settings::from_path(dir.path()).unwrap();
        assert!(settings.toggles().heat);
        assert!(!settings.toggles().supply_chain);
    }
}
