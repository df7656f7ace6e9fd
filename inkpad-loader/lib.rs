//! Locations of inkpad's config, cache and log files, and TOML merging.

pub mod config;

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::OnceLock,
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};

static CONFIG_FILE: OnceLock<PathBuf> = OnceLock::new();

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

/// Name of the per-workspace directory holding local overrides.
pub const WORKSPACE_DIR: &str = ".inkpad";

pub fn initialize_config_file(specified_file: Option<PathBuf>) {
  let config_file = specified_file.unwrap_or_else(default_config_file);
  ensure_parent_dir(&config_file);
  CONFIG_FILE.set(config_file).ok();
}

pub fn initialize_log_file(specified_file: Option<PathBuf>) {
  let log_file = specified_file.unwrap_or_else(default_log_file);
  ensure_parent_dir(&log_file);
  LOG_FILE.set(log_file).ok();
}

pub fn config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("INKPAD_CONFIG_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => strategy.config_dir().join("inkpad"),
    Err(err) => {
      log::warn!("unable to find the config directory: {err}");
      PathBuf::from(WORKSPACE_DIR)
    },
  }
}

pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("INKPAD_CACHE_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => strategy.cache_dir().join("inkpad"),
    Err(err) => {
      log::warn!("unable to find the cache directory: {err}");
      std::env::temp_dir().join("inkpad")
    },
  }
}

pub fn config_file() -> PathBuf {
  CONFIG_FILE
    .get_or_init(|| {
      let path = default_config_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn log_file() -> PathBuf {
  LOG_FILE
    .get_or_init(|| {
      let path = default_log_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn workspace_config_file() -> PathBuf {
  find_workspace().0.join(WORKSPACE_DIR).join("config.toml")
}

pub fn default_log_file() -> PathBuf {
  cache_dir().join("inkpad.log")
}

/// Merge two TOML documents, merging values from `right` onto `left`
///
/// `merge_depth` sets the nesting depth up to which tables are merged instead
/// of overridden. Arrays are always taken from `right`.
///
/// With `merge_depth = 2`,
///
/// ```toml
/// [editor]
/// history-limit = 50
/// ```
///
/// merged onto
///
/// ```toml
/// [editor]
/// history-limit = 100
/// trigger-char = "#"
/// ```
///
/// keeps `trigger-char` and takes `history-limit = 50`.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (rname, rvalue) in right_map {
        let merged = match left_map.remove(&rname) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(rname, merged);
      }
      Value::Table(left_map)
    },
    // everything else, including tables past the merge depth, takes the right value
    (_, value) => value,
  }
}

/// Finds the current workspace folder: the first ancestor of the working
/// directory containing `.git` or `.inkpad`. Returns `(cwd, true)` when none
/// is found, otherwise `(workspace, false)`.
pub fn find_workspace() -> (PathBuf, bool) {
  match std::env::current_dir() {
    Ok(current_dir) => find_workspace_in(current_dir),
    Err(_) => (PathBuf::new(), true),
  }
}

pub fn find_workspace_in(dir: impl AsRef<Path>) -> (PathBuf, bool) {
  let dir = dir.as_ref();
  for ancestor in dir.ancestors() {
    if ancestor.join(".git").exists() || ancestor.join(WORKSPACE_DIR).exists() {
      return (ancestor.to_owned(), false);
    }
  }

  (dir.to_owned(), true)
}

fn default_config_file() -> PathBuf {
  config_dir().join("config.toml")
}

fn expand_tilde(path: &Path) -> PathBuf {
  let Ok(rest) = path.strip_prefix("~") else {
    return path.to_owned();
  };
  match etcetera::home_dir() {
    Ok(home) => home.join(rest),
    Err(_) => path.to_owned(),
  }
}

fn ensure_parent_dir(path: &Path) {
  if let Some(parent) = path.parent()
    && !parent.exists()
  {
    std::fs::create_dir_all(parent).ok();
  }
}

#[cfg(test)]
mod merge_toml_tests {
  use toml::Value;

  use super::*;

  #[test]
  fn nested_tables_merge() {
    const BASE: &str = r##"
        [editor]
        history-limit = 100
        trigger-char = "#"
        "##;
    const USER: &str = r#"
        [editor]
        history-limit = 50
        "#;

    let base: Value = toml::from_str(BASE).unwrap();
    let user: Value = toml::from_str(USER).unwrap();
    let merged = merge_toml_values(base, user, 2);
    let editor = merged.get("editor").unwrap();

    assert_eq!(editor.get("history-limit").unwrap().as_integer(), Some(50));
    assert_eq!(editor.get("trigger-char").unwrap().as_str(), Some("#"));
  }

  #[test]
  fn depth_zero_overrides() {
    let base: Value = toml::from_str("a = 1\nb = 2").unwrap();
    let user: Value = toml::from_str("a = 3").unwrap();
    let merged = merge_toml_values(base, user, 0);
    assert_eq!(merged.get("a").unwrap().as_integer(), Some(3));
    assert!(merged.get("b").is_none());
  }

  #[test]
  fn workspace_found_by_marker_dir() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::create_dir(root.path().join(WORKSPACE_DIR)).unwrap();

    let (found, fallback) = find_workspace_in(&nested);
    assert!(!fallback);
    assert_eq!(found, root.path());
  }
}
