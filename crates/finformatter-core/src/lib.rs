use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod audit;
pub mod catalog;
pub mod config_file;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod request;
pub mod sanitize;
pub mod types;

// Re-export for convenience
pub use catalog::{Journal, JournalRules};
pub use config_file::ConfigError;
pub use orchestrator::{Analysis, AnalysisError, AttemptFailure, Orchestrator};
pub use prompt::Prompt;
pub use providers::{Endpoints, ProviderError, ProviderKind};
pub use request::{AnalysisRequest, InputError, InputMode, MIN_INPUT_CHARS, check_input_length};
pub use sanitize::{MalformedResponse, parse_response, sanitize};
pub use types::{AnalysisResult, Metadata, Segment, SegmentKind, StatusReport};

/// Default per-attempt timeout in seconds.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 120;

/// One entry of the provider fallback chain.
///
/// `provider` is kept as a free-form tag so that an unknown value read from a
/// config file only fails its own attempt instead of the whole load.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>, enabled: bool) -> Self {
        Self {
            provider: kind.id().to_string(),
            model: kind.default_model().to_string(),
            api_key: api_key.into(),
            enabled,
        }
    }

    /// Enabled and holding a non-blank key.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }

    /// The chain used when nothing is configured.
    pub fn defaults() -> Vec<ProviderConfig> {
        vec![
            ProviderConfig::new(ProviderKind::Glm, "", true),
            ProviderConfig::new(ProviderKind::DeepSeek, "", false),
            ProviderConfig::new(ProviderKind::Gemini, "", false),
        ]
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field(
                "api_key",
                &(!self.api_key.trim().is_empty()).then_some("***"),
            )
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Source of the ordered provider chain.
pub trait ConfigStore {
    fn provider_configs(&self) -> Vec<ProviderConfig>;
}

impl ConfigStore for Vec<ProviderConfig> {
    fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.clone()
    }
}

impl ConfigStore for [ProviderConfig] {
    fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.to_vec()
    }
}

/// Runtime configuration, resolved from flags, environment and config files.
#[derive(Clone)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,
    pub endpoints: Endpoints,
    pub attempt_timeout_secs: u64,
    /// Catalog id used when none is given.
    pub default_journal: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProviderConfig::defaults(),
            endpoints: Endpoints::default(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            default_journal: catalog::default_journal().id.to_string(),
        }
    }
}

impl Config {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Config entry for `kind`, if present in the chain.
    pub fn provider_mut(&mut self, kind: ProviderKind) -> Option<&mut ProviderConfig> {
        self.providers
            .iter_mut()
            .find(|p| p.provider.eq_ignore_ascii_case(kind.id()))
    }
}

impl ConfigStore for Config {
    fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.providers.clone()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("providers", &self.providers)
            .field("endpoints", &self.endpoints)
            .field("attempt_timeout_secs", &self.attempt_timeout_secs)
            .field("default_journal", &self.default_journal)
            .finish()
    }
}

/// Progress events emitted while the fallback chain runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// About to call the provider at `index` (0-based) of `total`.
    Attempting {
        index: usize,
        total: usize,
        provider: String,
        model: String,
    },
    AttemptFailed {
        index: usize,
        total: usize,
        provider: String,
        error: ProviderError,
    },
    Succeeded {
        provider: String,
        elapsed: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_order_and_flags() {
        let defaults = ProviderConfig::defaults();
        let tags: Vec<_> = defaults.iter().map(|c| c.provider.as_str()).collect();
        assert_eq!(tags, ["glm", "deepseek", "gemini"]);
        assert_eq!(defaults[0].model, "glm-4-flash");
        assert!(defaults[0].enabled);
        assert!(!defaults[1].enabled && !defaults[2].enabled);
        assert!(defaults.iter().all(|c| !c.is_active()));
    }

    #[test]
    fn whitespace_key_is_not_active() {
        let mut c = ProviderConfig::new(ProviderKind::Gemini, "  \t", true);
        assert!(!c.is_active());
        c.api_key = "k".into();
        assert!(c.is_active());
        c.enabled = false;
        assert!(!c.is_active());
    }

    #[test]
    fn debug_never_prints_keys() {
        let mut config = Config::default();
        config.provider_mut(ProviderKind::Glm).unwrap().api_key = "sk-very-secret".into();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn provider_config_toml_defaults() {
        let c: ProviderConfig = toml::from_str("provider = \"deepseek\"").unwrap();
        assert_eq!(c.model, "");
        assert_eq!(c.api_key, "");
        assert!(c.enabled);
    }
}
