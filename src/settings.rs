use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::categorizer::EXACT_VENDOR_SCORE;
use crate::error::{CoraError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub categorizer: CategorizerConfig,
}

/// Tunables for automatic categorization. Percentages are 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    /// Best scores below this are not applied.
    pub confidence_floor: u8,
    /// A learned pattern must reach this share of a fragment's corrections.
    pub learning_threshold: u8,
    /// A learned pattern also needs at least this many corrections.
    pub min_corrections: i64,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 50,
            learning_threshold: 85,
            min_corrections: 3,
        }
    }
}

impl CategorizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.confidence_floor > EXACT_VENDOR_SCORE {
            return Err(CoraError::InvalidConfig(format!(
                "confidence_floor {} is above the exact vendor score {EXACT_VENDOR_SCORE}",
                self.confidence_floor
            )));
        }
        if self.learning_threshold > 100 {
            return Err(CoraError::InvalidConfig(format!(
                "learning_threshold {} is above 100",
                self.learning_threshold
            )));
        }
        if self.min_corrections < 1 {
            return Err(CoraError::InvalidConfig(
                "min_corrections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            categorizer: CategorizerConfig::default(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("cora.db")
    }

    pub fn effective_user<'a>(&'a self, cli_user: Option<&'a str>) -> &'a str {
        match cli_user {
            Some(u) if !u.trim().is_empty() => u,
            _ if !self.user_name.is_empty() => self.user_name.as_str(),
            _ => "default",
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cora")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cora")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CoraError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user_name: "Alice".to_string(),
            categorizer: CategorizerConfig {
                confidence_floor: 60,
                learning_threshold: 90,
                min_corrections: 5,
            },
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.user_name, "Alice");
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.categorizer.confidence_floor, 60);
        assert_eq!(loaded.categorizer.min_corrections, 5);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "categorizer": {"confidence_floor": 70}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.user_name.is_empty());
        assert_eq!(s.categorizer.confidence_floor, 70);
        assert_eq!(s.categorizer.learning_threshold, 85);
        assert_eq!(s.categorizer.min_corrections, 3);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(CategorizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = CategorizerConfig::default();
        c.confidence_floor = 99;
        assert!(matches!(c.validate(), Err(CoraError::InvalidConfig(_))));

        let mut c = CategorizerConfig::default();
        c.learning_threshold = 101;
        assert!(c.validate().is_err());

        let mut c = CategorizerConfig::default();
        c.min_corrections = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_effective_user_fallbacks() {
        let mut s = Settings::default();
        assert_eq!(s.effective_user(None), "default");
        s.user_name = "carol".to_string();
        assert_eq!(s.effective_user(None), "carol");
        assert_eq!(s.effective_user(Some("dave")), "dave");
        assert_eq!(s.effective_user(Some("  ")), "carol");
    }
}
