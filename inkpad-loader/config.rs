use std::path::Path;

use eyre::{
  Context,
  Result,
};

/// Reads a TOML file. A missing file is an empty table, not an error.
pub fn read_toml_file(path: &Path) -> Result<toml::Value> {
  match std::fs::read_to_string(path) {
    Ok(contents) => {
      toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    },
    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
      Ok(toml::Value::Table(Default::default()))
    },
    Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
  }
}

/// The user's `config.toml` with the workspace `.inkpad/config.toml` merged
/// on top.
pub fn user_config() -> Result<toml::Value> {
  let global = read_toml_file(&crate::config_file())?;
  let local = read_toml_file(&crate::workspace_config_file())?;
  log::debug!(
    "loaded config from {} and {}",
    crate::config_file().display(),
    crate::workspace_config_file().display()
  );
  Ok(crate::merge_toml_values(global, local, 3))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_is_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let value = read_toml_file(&dir.path().join("nope.toml")).unwrap();
    assert!(value.as_table().unwrap().is_empty());
  }

  #[test]
  fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "editor = [").unwrap();
    let err = read_toml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("config.toml"));
  }
}
