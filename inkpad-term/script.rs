//! Scripted editor sessions for `inkpad replay`.

use std::path::PathBuf;

use anyhow::{
  Context,
  Result,
};
use inkpad_lib::Key;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
  Focus,
  Blur,
  /// Types `text` one char at a time.
  Type {
    text: String,
  },
  Key {
    key: KeyName,
  },
  /// Moves the caret to a flat offset.
  Cursor {
    offset: usize,
  },
  Paste {
    #[serde(default)]
    text:   Option<String>,
    #[serde(default)]
    html:   Option<String>,
    /// Image files on disk, pasted as clipboard files.
    #[serde(default)]
    images: Vec<PathBuf>,
  },
  Undo,
  Redo,
  /// Lets `ms` milliseconds of wall time pass, so debounced work can run.
  Wait {
    ms: u64,
  },
  /// Picks a suggestion of the open trigger by candidate id.
  Select {
    id: String,
  },
  Link {
    href:  String,
    #[serde(default)]
    label: Option<String>,
  },
  Image {
    path: PathBuf,
  },
  /// Content pushed by the host.
  Sync {
    content: String,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyName {
  Space,
  Enter,
  Backspace,
  Delete,
  Left,
  Right,
  Home,
  End,
  Escape,
}

impl From<KeyName> for Key {
  fn from(name: KeyName) -> Self {
    match name {
      KeyName::Space => Key::Char(' '),
      KeyName::Enter => Key::Enter,
      KeyName::Backspace => Key::Backspace,
      KeyName::Delete => Key::Delete,
      KeyName::Left => Key::Left,
      KeyName::Right => Key::Right,
      KeyName::Home => Key::Home,
      KeyName::End => Key::End,
      KeyName::Escape => Key::Escape,
    }
  }
}

pub fn parse(source: &str) -> Result<Vec<Action>> {
  serde_json::from_str(source).context("invalid replay script")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_actions() {
    let actions = parse(
      r##"[
        {"action": "type", "text": "#inv"},
        {"action": "key", "key": "space"},
        {"action": "paste", "text": "hi"},
        {"action": "wait", "ms": 600},
        {"action": "undo"}
      ]"##,
    )
    .unwrap();
    assert_eq!(actions.len(), 5);
    assert_eq!(actions[1], Action::Key {
      key: KeyName::Space,
    });
    assert_eq!(actions[2], Action::Paste {
      text:   Some("hi".into()),
      html:   None,
      images: Vec::new(),
    });
    assert_eq!(Key::from(KeyName::Space), Key::Char(' '));
  }

  #[test]
  fn unknown_action_is_an_error() {
    assert!(parse(r#"[{"action": "spellcheck"}]"#).is_err());
  }
}
