use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{Endpoints, ProviderKind};
use crate::request::InputMode;
use crate::{Config, ConfigStore, DEFAULT_ATTEMPT_TIMEOUT_SECS, ProviderConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Ordered fallback chain. Replaced as a whole when merging.
    pub providers: Option<Vec<ProviderConfig>>,
    pub endpoints: Option<EndpointsConfig>,
    pub analysis: Option<AnalysisConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub glm: Option<String>,
    pub deepseek: Option<String>,
    pub gemini: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub attempt_timeout_secs: Option<u64>,
    pub default_journal: Option<String>,
    pub mode: Option<InputMode>,
}

/// Platform config directory path: `<config_dir>/finformatter/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("finformatter").join("config.toml"))
}

/// Project-local override, relative to the working directory.
pub const LOCAL_CONFIG: &str = ".finformatter.toml";

/// Load config by cascading CWD `.finformatter.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(LOCAL_CONFIG));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed; parse failures are logged.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match try_load_from_path(path) {
        Ok(config) => Some(config),
        Err(ConfigError::Read { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring config file");
            None
        }
    }
}

/// Strict variant of [`load_from_path`].
pub fn try_load_from_path(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        providers: overlay.providers.or(base.providers),
        endpoints: Some(EndpointsConfig {
            glm: overlay
                .endpoints
                .as_ref()
                .and_then(|e| e.glm.clone())
                .or_else(|| base.endpoints.as_ref().and_then(|e| e.glm.clone())),
            deepseek: overlay
                .endpoints
                .as_ref()
                .and_then(|e| e.deepseek.clone())
                .or_else(|| base.endpoints.as_ref().and_then(|e| e.deepseek.clone())),
            gemini: overlay
                .endpoints
                .as_ref()
                .and_then(|e| e.gemini.clone())
                .or_else(|| base.endpoints.as_ref().and_then(|e| e.gemini.clone())),
        }),
        analysis: Some(AnalysisConfig {
            attempt_timeout_secs: overlay
                .analysis
                .as_ref()
                .and_then(|a| a.attempt_timeout_secs)
                .or_else(|| base.analysis.as_ref().and_then(|a| a.attempt_timeout_secs)),
            default_journal: overlay
                .analysis
                .as_ref()
                .and_then(|a| a.default_journal.clone())
                .or_else(|| {
                    base.analysis
                        .as_ref()
                        .and_then(|a| a.default_journal.clone())
                }),
            mode: overlay
                .analysis
                .as_ref()
                .and_then(|a| a.mode)
                .or_else(|| base.analysis.as_ref().and_then(|a| a.mode)),
        }),
    }
}

impl ConfigFile {
    /// Resolve into a runtime [`Config`], filling gaps with defaults.
    pub fn into_config(self) -> Config {
        let defaults = Config::default();
        let endpoints = self.endpoints.unwrap_or_default();
        let analysis = self.analysis.unwrap_or_default();
        let default_endpoints = Endpoints::default();

        Config {
            providers: self.providers.unwrap_or(defaults.providers),
            endpoints: Endpoints {
                glm: endpoints.glm.unwrap_or(default_endpoints.glm),
                deepseek: endpoints.deepseek.unwrap_or(default_endpoints.deepseek),
                gemini: endpoints.gemini.unwrap_or(default_endpoints.gemini),
            },
            attempt_timeout_secs: analysis
                .attempt_timeout_secs
                .filter(|&s| s > 0)
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            default_journal: analysis
                .default_journal
                .unwrap_or(defaults.default_journal),
        }
    }

    /// Set the key for `kind`, appending the provider to the chain if absent.
    pub fn set_api_key(&mut self, kind: ProviderKind, api_key: &str) {
        let entry = self.provider_entry(kind);
        entry.api_key = api_key.trim().to_string();
    }

    /// Enable or disable `kind`, appending the provider to the chain if absent.
    pub fn set_enabled(&mut self, kind: ProviderKind, enabled: bool) {
        self.provider_entry(kind).enabled = enabled;
    }

    fn provider_entry(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        let providers = self.providers.get_or_insert_with(ProviderConfig::defaults);
        let pos = match providers
            .iter()
            .position(|p| p.provider.eq_ignore_ascii_case(kind.id()))
        {
            Some(pos) => pos,
            None => {
                providers.push(ProviderConfig::new(kind, "", false));
                providers.len() - 1
            }
        };
        &mut providers[pos]
    }
}

impl ConfigStore for ConfigFile {
    fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.providers
            .clone()
            .unwrap_or_else(ProviderConfig::defaults)
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to_path(config, &path)?;
    Ok(path)
}

/// Write `config` as TOML to `path`, creating parent directories.
pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_round_trip_toml() {
        let mut config = ConfigFile::default();
        config.set_api_key(ProviderKind::DeepSeek, " sk-1 ");
        config.set_enabled(ProviderKind::DeepSeek, true);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        let providers = parsed.providers.unwrap();
        assert_eq!(providers.len(), 3);
        assert_eq!(providers[1].provider, "deepseek");
        assert_eq!(providers[1].api_key, "sk-1");
        assert!(providers[1].is_active());
    }

    #[test]
    fn partial_file_parses() {
        let toml_str = "[analysis]\nattempt_timeout_secs = 30\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.providers.is_none());
        let config = parsed.into_config();
        assert_eq!(config.attempt_timeout_secs, 30);
        assert_eq!(config.providers, ProviderConfig::defaults());
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn provider_array_of_tables() {
        let toml_str = r#"
[[providers]]
provider = "gemini"
api_key = "g"

[[providers]]
provider = "glm"
model = "glm-4-plus"
api_key = "z"
enabled = false
"#;
        let config = toml::from_str::<ConfigFile>(toml_str).unwrap().into_config();
        let tags: Vec<_> = config.providers.iter().map(|p| p.provider.as_str()).collect();
        assert_eq!(tags, ["gemini", "glm"]);
        assert!(config.providers[0].enabled);
        assert_eq!(config.providers[1].model, "glm-4-plus");
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            endpoints: Some(EndpointsConfig {
                glm: Some("http://base/glm".into()),
                gemini: Some("http://base/gemini".into()),
                ..Default::default()
            }),
            analysis: Some(AnalysisConfig {
                default_journal: Some("aer".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            endpoints: Some(EndpointsConfig {
                glm: Some("http://overlay/glm".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let endpoints = merged.endpoints.unwrap();
        assert_eq!(endpoints.glm.unwrap(), "http://overlay/glm");
        assert_eq!(endpoints.gemini.unwrap(), "http://base/gemini");
        assert_eq!(merged.analysis.unwrap().default_journal.unwrap(), "aer");
    }

    #[test]
    fn merge_replaces_provider_list_wholesale() {
        let base = ConfigFile {
            providers: Some(ProviderConfig::defaults()),
            ..Default::default()
        };
        let overlay = ConfigFile {
            providers: Some(vec![ProviderConfig::new(ProviderKind::Gemini, "g", true)]),
            ..Default::default()
        };
        let merged = merge(base.clone(), overlay);
        assert_eq!(merged.providers.unwrap().len(), 1);

        let kept = merge(base, ConfigFile::default());
        assert_eq!(kept.providers.unwrap().len(), 3);
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let config = ConfigFile {
            analysis: Some(AnalysisConfig {
                attempt_timeout_secs: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        }
        .into_config();
        assert_eq!(config.attempt_timeout_secs, DEFAULT_ATTEMPT_TIMEOUT_SECS);
    }

    #[test]
    fn set_api_key_appends_missing_provider() {
        let mut config = ConfigFile {
            providers: Some(vec![ProviderConfig::new(ProviderKind::Glm, "z", true)]),
            ..Default::default()
        };
        config.set_api_key(ProviderKind::Gemini, "g");
        let providers = config.providers.unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[1].provider, "gemini");
        assert!(!providers[1].enabled);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ConfigFile::default();
        config.set_api_key(ProviderKind::Glm, "z");

        save_to_path(&config, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_or_broken_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("absent.toml")).is_none());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "providers = 3").unwrap();
        assert!(load_from_path(&broken).is_none());
        assert!(matches!(
            try_load_from_path(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
