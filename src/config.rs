use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{DigestError, Result};
use crate::pipeline::processing::{InstantFormat, KeyStrategy, ParserConfig};

pub const DEFAULT_CONFIG_PATH: &str = "event_digest.toml";

const MAX_SANITY_YEARS: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub merge: MergeConfig,
    pub digest: DigestConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub key_strategy: KeyStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub instant_format: InstantFormat,
    /// Drop events whose last date is already behind `now`.
    pub drop_past_events: bool,
    /// Where the digest JSON goes; stdout when unset.
    pub output: Option<PathBuf>,
}

/// A JSON file of scraped records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub path: PathBuf,
}

impl Config {
    /// Load from `path` if given, else from `event_digest.toml` if present,
    /// else defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("EVENT_DIGEST_KEY_STRATEGY") {
            self.merge.key_strategy = value.parse().map_err(DigestError::Config)?;
        }
        if let Ok(value) = std::env::var("EVENT_DIGEST_INSTANT_FORMAT") {
            self.digest.instant_format = value.parse().map_err(DigestError::Config)?;
        }
        if let Ok(value) = std::env::var("EVENT_DIGEST_OUTPUT") {
            if !value.trim().is_empty() {
                self.digest.output = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.parser.sanity_years == 0 || self.parser.sanity_years > MAX_SANITY_YEARS {
            return Err(DigestError::Config(format!(
                "parser.sanity_years must be between 1 and {}",
                MAX_SANITY_YEARS
            )));
        }
        if let Some(source) = self.sources.iter().find(|s| s.id.trim().is_empty()) {
            return Err(DigestError::Config(format!(
                "source with path '{}' has an empty id",
                source.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.parser.location_separator, '*');
        assert_eq!(config.parser.sanity_years, 5);
        assert_eq!(config.merge.key_strategy, KeyStrategy::TitleAndDescription);
        assert_eq!(config.digest.instant_format, InstantFormat::Iso);
        assert!(!config.digest.drop_past_events);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
            [parser]
            location_separator = "|"
            sanity_years = 2

            [merge]
            key_strategy = "title_only"

            [digest]
            instant_format = "display"
            drop_past_events = true
            output = "out/digest.json"

            [[sources]]
            id = "wine_country"
            path = "data/wine_country.json"

            [[sources]]
            id = "downtown"
            path = "data/downtown.json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.parser.location_separator, '|');
        assert_eq!(config.parser.sanity_years, 2);
        assert_eq!(config.merge.key_strategy, KeyStrategy::TitleOnly);
        assert_eq!(config.digest.instant_format, InstantFormat::Display);
        assert!(config.digest.drop_past_events);
        assert_eq!(config.digest.output, Some(PathBuf::from("out/digest.json")));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].id, "downtown");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml("[merge]\nkey_strategy = \"venue\"").is_err());
        assert!(Config::from_toml("[parser]\nsanity_years = 0").is_err());
        assert!(Config::from_toml("[parser]\nsanity_years = 1000000").is_err());
        assert!(Config::from_toml("[parser]\nsanity_years = 100").is_ok());
        assert!(Config::from_toml("[[sources]]\nid = \" \"\npath = \"a.json\"").is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[digest]\ndrop_past_events = true").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.digest.drop_past_events);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = Config::from_file(Path::new("/nonexistent/event_digest.toml")).unwrap_err();
        assert!(matches!(err, DigestError::Config(_)));
    }
}
