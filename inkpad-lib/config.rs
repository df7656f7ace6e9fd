use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  history,
  trigger,
};

/// Settings for one editor instance, the `[editor]` table of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EditorConfig {
  /// Most undo snapshots kept, the initial content included.
  pub history_limit:        usize,
  /// Pause in typing, in milliseconds, after which a snapshot is taken.
  pub history_debounce_ms:  u64,
  pub trigger_char:         char,
  /// Collapse three or more newlines to two in pasted text.
  pub collapse_blank_lines: bool,
  /// Turn `http(s)://` URLs in pasted plain text into links.
  pub autolink:             bool,
  /// Most suggestions shown for a trigger query. `None` shows all.
  pub search_limit:         Option<usize>,
}

impl Default for EditorConfig {
  fn default() -> Self {
    Self {
      history_limit:        history::DEFAULT_LIMIT,
      history_debounce_ms:  history::DEFAULT_DEBOUNCE.as_millis() as u64,
      trigger_char:         trigger::DEFAULT_TRIGGER,
      collapse_blank_lines: true,
      autolink:             true,
      search_limit:         Some(20),
    }
  }
}

impl EditorConfig {
  pub fn history_debounce(&self) -> Duration {
    Duration::from_millis(self.history_debounce_ms)
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid config: {0}")]
  BadConfig(#[from] toml::de::Error),
  #[error("trigger-char cannot be whitespace")]
  BadTrigger,
}

/// The root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub editor: EditorConfig,
}

impl Config {
  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(source)?;
    config.validate()
  }

  /// Converts an already merged TOML value.
  pub fn from_toml(value: toml::Value) -> Result<Self, ConfigError> {
    let config: Self = value.try_into()?;
    config.validate()
  }

  fn validate(self) -> Result<Self, ConfigError> {
    if self.editor.trigger_char.is_whitespace() {
      return Err(ConfigError::BadTrigger);
    }
    Ok(self)
  }
}
