use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info
};

const CONFIG_ENV_VAR: &str =
  "TASKMATTER_CONFIG";
const CONFIG_DIR: &str =
  ".config/taskmatter";
const CONFIG_FILE_NAMES: [&str; 1] =
  ["config.toml"];
const DEFAULT_PATH: &str = "./";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
  default_path: Option<PathList>,
  color:        Option<String>
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathList {
  One(String),
  Many(Vec<String>)
}

#[derive(Debug, Clone)]
pub struct Config {
  pub default_paths: Vec<PathBuf>,
  pub color:         bool,
  pub loaded_file:   Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      default_paths: vec![PathBuf::from(
        DEFAULT_PATH
      )],
      color:         true,
      loaded_file:   None
    }
  }
}

impl Config {
  #[tracing::instrument]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let Some(path) =
      resolve_config_path(override_path)?
    else {
      debug!(
        "no config file found; using \
         defaults"
      );
      return Ok(cfg);
    };

    info!(config = %path.display(), "loading config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let raw: RawConfig =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;

    if let Some(paths) = raw.default_path
    {
      let paths = match paths {
        | PathList::One(one) => vec![one],
        | PathList::Many(many) => many
      };
      if !paths.is_empty() {
        cfg.default_paths = paths
          .iter()
          .map(|p| expand_tilde(Path::new(p)))
          .collect();
      }
    }

    if let Some(color) = raw.color {
      cfg.color = parse_switch(&color)?;
    }

    cfg.loaded_file = Some(path);
    debug!(
      paths = ?cfg.default_paths,
      color = cfg.color,
      "config loaded"
    );
    Ok(cfg)
  }

  pub fn apply_color_override(
    &mut self,
    raw: &str
  ) -> anyhow::Result<()> {
    self.color = parse_switch(raw)?;
    debug!(color = self.color, "applying color override");
    Ok(())
  }

  /// `paths` when any were given,
  /// otherwise the configured defaults.
  pub fn search_paths(
    &self,
    paths: &[PathBuf]
  ) -> Vec<PathBuf> {
    if paths.is_empty() {
      self.default_paths.clone()
    } else {
      paths.to_vec()
    }
  }
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Ok(Some(expand_tilde(
        Path::new(trimmed)
      )));
    }
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let dir = home.join(CONFIG_DIR);
  Ok(
    CONFIG_FILE_NAMES
      .iter()
      .map(|name| dir.join(name))
      .find(|candidate| candidate.is_file())
  )
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_switch(
  raw: &str
) -> anyhow::Result<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    | "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    | other => {
      Err(anyhow!(
        "invalid color setting: {other}"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::PathBuf;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn loads_paths_and_color() {
    let temp =
      tempdir().expect("tempdir");
    let path =
      temp.path().join("config.toml");
    fs::write(
      &path,
      "default_path = [\"/notes\", \
       \"/work\"]\ncolor = \"off\"\n"
    )
    .expect("write config");

    let cfg = Config::load(Some(&path))
      .expect("load config");
    assert_eq!(
      cfg.default_paths,
      vec![
        PathBuf::from("/notes"),
        PathBuf::from("/work")
      ]
    );
    assert!(!cfg.color);
    assert_eq!(
      cfg.loaded_file.as_deref(),
      Some(path.as_path())
    );
  }

  #[test]
  fn single_path_and_defaults() {
    let temp =
      tempdir().expect("tempdir");
    let path =
      temp.path().join("config.toml");
    fs::write(
      &path,
      "default_path = \"/notes\"\n"
    )
    .expect("write config");

    let cfg = Config::load(Some(&path))
      .expect("load config");
    assert_eq!(
      cfg.default_paths,
      vec![PathBuf::from("/notes")]
    );
    assert!(cfg.color);
    assert_eq!(
      cfg.search_paths(&[]),
      vec![PathBuf::from("/notes")]
    );
    assert_eq!(
      cfg.search_paths(&[PathBuf::from(
        "here"
      )]),
      vec![PathBuf::from("here")]
    );
  }

  #[test]
  fn rejects_bad_color() {
    let temp =
      tempdir().expect("tempdir");
    let path =
      temp.path().join("config.toml");
    fs::write(&path, "color = \"maybe\"\n")
      .expect("write config");
    assert!(
      Config::load(Some(&path)).is_err()
    );

    let mut cfg = Config::default();
    cfg
      .apply_color_override("no")
      .expect("valid override");
    assert!(!cfg.color);
  }

  #[test]
  fn missing_override_file_is_an_error() {
    let temp =
      tempdir().expect("tempdir");
    let path = temp.path().join("nope.toml");
    assert!(
      Config::load(Some(&path)).is_err()
    );
  }
}
