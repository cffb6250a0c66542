use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ConfigStore, ProviderConfig};

/// Inputs shorter than this are rejected before any provider is contacted.
pub const MIN_INPUT_CHARS: usize = 20;

/// Whether the input is a whole manuscript or an excerpt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Full,
    Snippet,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Full => "full",
            InputMode::Snippet => "snippet",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(InputMode::Full),
            "snippet" => Ok(InputMode::Snippet),
            other => Err(format!("unknown input mode '{other}' (expected full or snippet)")),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("input is empty")]
    Empty,
    #[error("input is too short ({chars} characters, at least {min} required)")]
    TooShort { chars: usize, min: usize },
}

/// Caller-side length guard, run before [`AnalysisRequest`] reaches the core.
///
/// Length is measured in Unicode scalar values so CJK text is not penalized.
pub fn check_input_length(text: &str) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let chars = text.chars().count();
    if chars < MIN_INPUT_CHARS {
        return Err(InputError::TooShort {
            chars,
            min: MIN_INPUT_CHARS,
        });
    }
    Ok(())
}

/// One user-triggered analysis. Not retained after the run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub text: String,
    pub mode: InputMode,
    /// Provider chain captured when the request was built; edits to the
    /// store afterwards do not affect this run.
    pub configs: Vec<ProviderConfig>,
}

impl AnalysisRequest {
    pub fn new(text: impl Into<String>, mode: InputMode, store: &dyn ConfigStore) -> Self {
        Self {
            text: text.into(),
            mode,
            configs: store.provider_configs(),
        }
    }

    /// Enabled configs with a usable credential, in fallback order.
    pub fn active_configs(&self) -> Vec<ProviderConfig> {
        self.configs
            .iter()
            .filter(|c| c.is_active())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: &str, key: &str, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            provider: provider.into(),
            model: "m".into(),
            api_key: key.into(),
            enabled,
        }
    }

    #[test]
    fn nineteen_chars_rejected_twenty_accepted() {
        let nineteen = "a".repeat(19);
        let twenty = "a".repeat(20);
        assert_eq!(
            check_input_length(&nineteen),
            Err(InputError::TooShort { chars: 19, min: 20 })
        );
        assert_eq!(check_input_length(&twenty), Ok(()));
    }

    #[test]
    fn cjk_counted_by_character() {
        let text = "金融".repeat(10);
        assert_eq!(text.chars().count(), 20);
        assert!(check_input_length(&text).is_ok());
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(check_input_length("   \n\t  "), Err(InputError::Empty));
    }

    #[test]
    fn active_configs_keep_order_and_drop_inactive() {
        let store = vec![
            cfg("glm", "k1", true),
            cfg("deepseek", "", true),
            cfg("gemini", "k3", false),
            cfg("deepseek", "   ", true),
            cfg("gemini", "k5", true),
        ];
        let request = AnalysisRequest::new("text", InputMode::Full, &store);
        let active: Vec<_> = request
            .active_configs()
            .into_iter()
            .map(|c| c.api_key)
            .collect();
        assert_eq!(active, vec!["k1", "k5"]);
    }

    #[test]
    fn mode_parses() {
        assert_eq!("Snippet".parse::<InputMode>(), Ok(InputMode::Snippet));
        assert!("draft".parse::<InputMode>().is_err());
    }
}
