use serde::{Deserialize, Serialize};
use twig_diff::DiffConfig;

use crate::error::ConfigError;

/// Settings for a [`Twig`](crate::Twig) instance.
///
/// Every field has a default, so an empty TOML document is valid:
///
/// ```toml
/// git_dir = ".git"
///
/// [diff]
/// context_lines = 3
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwigConfig {
    /// Name of the git directory inside the uploaded folder.
    pub git_dir: String,
    pub diff: DiffConfig,
}

impl Default for TwigConfig {
    fn default() -> Self {
        Self {
            git_dir: ".git".into(),
            diff: DiffConfig::default(),
        }
    }
}

impl TwigConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}
