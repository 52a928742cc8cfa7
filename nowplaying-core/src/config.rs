use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NowPlayingConfig {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider sections, parsed lazily by the provider crates
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// How often the host asks the playback source for a fresh snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval() -> u64 {
    1000
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `~/.cache/nowplaying/nowplaying.log`
    #[serde(default)]
    pub enabled: bool,
}

/// Untyped `[providers.*]` tables.
///
/// Each provider crate owns the schema of its own section and pulls it out
/// with [`ProvidersConfig::get`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidersConfig(toml::Table);

impl ProvidersConfig {
    /// Deserialize the section named `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .cloned()
            .map(toml::Value::try_into::<T>)
            .transpose()
            .map_err(CoreError::from)
    }
}

impl NowPlayingConfig {
    /// Get the config file path (~/.config/nowplaying/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or the
    /// display settings are out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;

        if config.display.poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "display.poll_interval_ms must be greater than zero".into(),
            });
        }

        Ok(config)
    }

    /// Load config from file or create the template on first run.
    ///
    /// `provider_templates` are appended to the base template so every
    /// provider documents its own section.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing a fresh template,
    /// or an error if the file cannot be read or parsed.
    pub fn load_or_create(provider_templates: Option<&[&str]>) -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, build_config_template(provider_templates))?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }
}

/// Build the full config template from the base and provider sections.
#[must_use]
pub fn build_config_template(provider_templates: Option<&[&str]>) -> String {
    let mut template = String::from(BASE_CONFIG_TEMPLATE);
    for provider in provider_templates.unwrap_or_default() {
        template.push('\n');
        template.push_str(provider);
    }
    template
}

const BASE_CONFIG_TEMPLATE: &str = r"# nowplaying configuration
# ~/.config/nowplaying/config.toml

[display]
# How often the current track is fetched, in milliseconds
poll_interval_ms = 1000

[logging]
# Also write logs to ~/.cache/nowplaying/nowplaying.log
enabled = false
";

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct DummyProvider {
        client_id: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = NowPlayingConfig::from_toml_str("").unwrap();
        assert_eq!(config.display.poll_interval_ms, 1000);
        assert!(!config.logging.enabled);
        let spotify: Option<toml::Value> = config.providers.get("spotify").unwrap();
        assert!(spotify.is_none());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = NowPlayingConfig::from_toml_str("[display]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_provider_section_lookup() {
        let config = NowPlayingConfig::from_toml_str(
            "[providers.dummy]\nclient_id = \"abc\"\nretries = 2\n",
        )
        .unwrap();

        let dummy: DummyProvider = config.providers.get("dummy").unwrap().unwrap();
        assert_eq!(dummy.client_id, "abc");
        assert_eq!(dummy.retries, 2);

        let missing: Option<DummyProvider> = config.providers.get("other").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_provider_section_type_mismatch() {
        let config =
            NowPlayingConfig::from_toml_str("[providers.dummy]\nclient_id = 42\n").unwrap();
        let result: Result<Option<DummyProvider>> = config.providers.get("dummy");
        assert!(matches!(result, Err(CoreError::ConfigParseError(_))));
    }

    #[test]
    fn test_template_with_provider_parses() {
        let provider = "[providers.dummy]\nclient_id = \"\"\n";
        let template = build_config_template(Some(&[provider][..]));

        let config = NowPlayingConfig::from_toml_str(&template).unwrap();
        assert_eq!(config.display.poll_interval_ms, 1000);
        let dummy: Option<toml::Value> = config.providers.get("dummy").unwrap();
        assert!(dummy.is_some());
    }
}
