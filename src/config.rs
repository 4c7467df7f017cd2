//! Site configuration for the concatenation planner and delivery endpoint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::resolver::site_base;

const DEFAULT_CONFIG_FILE: &str = "css_concat.config.json";

/// Settings shared by the planner and the delivery endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcatConfig {
  /// Public base URL of the site; same-origin checks are made against it.
  pub site_url: String,
  /// Filesystem directory every concatenated stylesheet must live under.
  pub trusted_root: PathBuf,
  /// URL of the delivery endpoint combined links point at.
  pub endpoint_url: String,
  /// Whether combined links allow transport compression.
  pub allow_gzip_compression: bool,
  /// `max-age` advertised by the delivery endpoint, in seconds.
  pub cache_max_age: u64,
}

impl Default for ConcatConfig {
  fn default() -> Self {
    Self {
      site_url: "http://localhost/".into(),
      trusted_root: PathBuf::from("."),
      endpoint_url: "/concat.css".into(),
      allow_gzip_compression: false,
      cache_max_age: 31_536_000,
    }
  }
}

impl ConcatConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// A missing or unreadable configuration file falls back to default values.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    match Self::from_path(&candidate) {
      Ok(config) => config,
      Err(err) => {
        tracing::debug!(path = %candidate.display(), error = %err, "using default concat config");
        Self::default()
      }
    }
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("config not found at {}", path.display()))?;
    let config: ConcatConfig = serde_json::from_str(&content)
      .with_context(|| format!("failed to parse {}", path.display()))?;
    config.site_base_url()?;
    Ok(config)
  }

  /// Parsed site URL, normalised to end with `/` so relative sources join beneath it.
  pub fn site_base_url(&self) -> Result<Url> {
    let url = Url::parse(&self.site_url)
      .with_context(|| format!("invalid site url `{}`", self.site_url))?;
    Ok(site_base(&url))
  }
}
