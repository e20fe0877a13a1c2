use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::engine::EngineConfig;

const DEV_API_BASE_URL: &str = "http://localhost:3000/api";
const PROD_API_BASE_URL: &str = "https://www.getskipit.com/api";
const DEV_APP_URL: &str = "http://localhost:3000";
const PROD_APP_URL: &str = "https://www.getskipit.com";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            Environment::Development => DEV_API_BASE_URL,
            Environment::Production => PROD_API_BASE_URL,
        }
    }

    pub fn app_url(&self) -> &'static str {
        match self {
            Environment::Development => DEV_APP_URL,
            Environment::Production => PROD_APP_URL,
        }
    }
}

/// Which in-player buttons disappear when an admin marked the title clean.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CleanContentRule {
    #[default]
    HideSkipButton,
    HideMarkButton,
    HideBoth,
    ShowBoth,
}

impl CleanContentRule {
    pub fn hides_skip_button(&self) -> bool {
        matches!(self, CleanContentRule::HideSkipButton | CleanContentRule::HideBoth)
    }

    pub fn hides_mark_button(&self) -> bool {
        matches!(self, CleanContentRule::HideMarkButton | CleanContentRule::HideBoth)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtensionSettings {
    pub environment: Environment,
    /// Overrides the environment's API host when set.
    pub api_base_url: Option<String>,
    pub clean_content_rule: CleanContentRule,
    pub debug: bool,
    pub engine: EngineConfig,
}

impl ExtensionSettings {
    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| self.environment.api_base_url().to_string())
    }

    /// Apply `SKIPIT_ENV`, `SKIPIT_API_BASE_URL` and `SKIPIT_DEBUG`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("SKIPIT_ENV").as_deref().and_then(Environment::parse) {
            self.environment = env;
        }
        if let Some(url) = lookup("SKIPIT_API_BASE_URL").filter(|url| !url.trim().is_empty()) {
            self.api_base_url = Some(url.trim().trim_end_matches('/').to_string());
        }
        if let Some(debug) = lookup("SKIPIT_DEBUG") {
            self.debug = debug == "1" || debug.eq_ignore_ascii_case("true");
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ExtensionSettings>,
}

impl SettingsStore {
    /// Load from `path`, falling back to defaults when the file is missing or
    /// unparsable, then apply process environment overrides.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data: ExtensionSettings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ExtensionSettings::default()
        };
        data.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> ExtensionSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn engine(&self) -> EngineConfig {
        self.get().engine
    }

    pub fn clean_content_rule(&self) -> CleanContentRule {
        self.get().clean_content_rule
    }

    pub fn update(&self, settings: ExtensionSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    pub fn update_clean_content_rule(&self, rule: CleanContentRule) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.clean_content_rule = rule;
        self.persist(&guard)
    }

    fn persist(&self, data: &ExtensionSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: ExtensionSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_production_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.get();

        assert_eq!(settings.clean_content_rule, CleanContentRule::HideSkipButton);
        assert_eq!(settings.engine.skip_poll_ms, 50);
        if std::env::var("SKIPIT_ENV").is_err() && std::env::var("SKIPIT_API_BASE_URL").is_err() {
            assert_eq!(settings.api_base_url(), "https://www.getskipit.com/api");
        }
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.engine(), EngineConfig::default());
    }

    #[test]
    fn updates_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store.update_clean_content_rule(CleanContentRule::HideBoth).unwrap();
        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.clean_content_rule(), CleanContentRule::HideBoth);
        assert!(reopened.clean_content_rule().hides_mark_button());
    }

    #[test]
    fn partial_engine_overrides_keep_other_defaults() {
        let parsed: ExtensionSettings =
            serde_json::from_str(r#"{"engine":{"skipCooldownMs":750}}"#).unwrap();
        assert_eq!(parsed.engine.skip_cooldown_ms, 750);
        assert_eq!(parsed.engine.vote_lead_ms, 3000);
    }

    #[test]
    fn env_overrides_pick_host() {
        let vars = HashMap::from([
            ("SKIPIT_ENV", "dev"),
            ("SKIPIT_DEBUG", "true"),
        ]);
        let mut settings = ExtensionSettings::default();
        settings.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.api_base_url(), "http://localhost:3000/api");
        assert!(settings.debug);

        settings.apply_env_overrides(|key| {
            (key == "SKIPIT_API_BASE_URL").then(|| "https://staging.example/api/".to_string())
        });
        assert_eq!(settings.api_base_url(), "https://staging.example/api");
    }
}
