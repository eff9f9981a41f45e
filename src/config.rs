//! Configuration file support for pota-adif.
//!
//! Loads settings from `~/.config/pota-adif/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::convert::ConvertOptions;
use crate::dedup::DedupConfig;

/// Default name for the generated ADIF file.
pub const DEFAULT_OUTPUT_FILE: &str = "pota_log.adi";

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operator callsign for records that do not name one.
    pub station_callsign: Option<String>,

    /// Where to write the ADIF output.
    pub output_file: PathBuf,

    /// Write an ADIF header before the records.
    pub write_header: bool,

    /// Extra substrings that mark header or pagination lines in a paste.
    pub header_markers: Vec<String>,

    /// Duplicate detection settings.
    pub dedup: DedupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station_callsign: None,
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            write_header: true,
            header_markers: Vec::new(),
            dedup: DedupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pota-adif/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        self.dedup
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [dedup] section: {}", e))?;
        if let Some(ref call) = self.station_callsign
            && call.trim().is_empty()
        {
            anyhow::bail!("station_callsign must not be empty");
        }
        Ok(())
    }

    /// Conversion options derived from this configuration.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            dedup: self.dedup.clone(),
            station_callsign: self.station_callsign.clone(),
            extra_header_markers: self.header_markers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DEFAULT_TOLERANCE_MINUTES;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_file, PathBuf::from("pota_log.adi"));
        assert!(config.write_header);
        assert!(config.station_callsign.is_none());
        assert_eq!(config.dedup.tolerance_minutes, DEFAULT_TOLERANCE_MINUTES);
        assert!(!config.dedup.within_batch);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            station_callsign = "K5OHY"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.station_callsign.as_deref(), Some("K5OHY"));
        // Other fields should use defaults
        assert_eq!(config.output_file, PathBuf::from(DEFAULT_OUTPUT_FILE));
        assert_eq!(config.dedup, DedupConfig::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            station_callsign = "K5OHY"
            output_file = "hunted.adif"
            write_header = false
            header_markers = ["Page ", "Showing"]

            [dedup]
            tolerance_minutes = 20
            within_batch = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output_file, PathBuf::from("hunted.adif"));
        assert!(!config.write_header);
        assert_eq!(config.header_markers, vec!["Page ", "Showing"]);
        assert_eq!(config.dedup.tolerance_minutes, 20);
        assert!(config.dedup.within_batch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_dedup_section() {
        let toml = r#"
            [dedup]
            within_batch = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.dedup.tolerance_minutes, DEFAULT_TOLERANCE_MINUTES);
        assert!(config.dedup.within_batch);
    }

    #[test]
    fn test_validate_rejects_huge_tolerance() {
        let toml = r#"
            [dedup]
            tolerance_minutes = 5000
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_callsign() {
        let config = Config {
            station_callsign: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_convert_options() {
        let config = Config {
            station_callsign: Some("K5OHY".to_string()),
            header_markers: vec!["Page ".to_string()],
            ..Default::default()
        };
        let options = config.convert_options();
        assert_eq!(options.station_callsign.as_deref(), Some("K5OHY"));
        assert_eq!(options.extra_header_markers, vec!["Page ".to_string()]);
        assert_eq!(options.dedup, config.dedup);
    }

    #[test]
    fn test_invalid_toml_type() {
        let toml = r#"
            [dedup]
            tolerance_minutes = "ten"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
