// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod tests;

use crate::arch::{ArchitectureProfile, PointerWidth};
use crate::compact::CompactHeaders;
use crate::hash_table::{DEFAULT_LOAD_FACTOR, validate_load_factor};
use crate::pipeline::ErrorPolicy;
use regex::bytes::Regex;
use std::path::Path;

//
// ConfigError
//

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("unable to read config file: {0}")]
  Io(#[from] std::io::Error),
  #[error("unable to deserialize config: {0}")]
  Parse(#[from] serde_yaml::Error),
  #[error("invalid config: {0}")]
  Invalid(String),
  #[error("invalid key pattern: {0}")]
  KeyPattern(#[from] regex::Error),
}

//
// ProfilerConfig
//

/// Everything a profiling run is parameterized by. Every field has a default, so an empty document
/// is a valid config.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
  pub pointer_width: PointerWidth,
  pub load_factor: f64,
  // Seeds skip list level sampling. Without a seed levels come from the OS generator.
  pub seed: Option<u64>,
  // Tags every report entry.
  pub instance_label: String,
  pub compact_headers: CompactHeaders,
  pub error_policy: ErrorPolicy,
  // Only keys matching this regex are reported.
  pub key_pattern: Option<String>,
  pub workers: usize,
  // RUST_LOG style rules applied once the config is loaded.
  pub log_filter: Option<String>,
}

impl Default for ProfilerConfig {
  fn default() -> Self {
    Self {
      pointer_width: PointerWidth::default(),
      load_factor: DEFAULT_LOAD_FACTOR,
      seed: None,
      instance_label: String::new(),
      compact_headers: CompactHeaders::default(),
      error_policy: ErrorPolicy::default(),
      key_pattern: None,
      workers: 1,
      log_filter: None,
    }
  }
}

impl ProfilerConfig {
  pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
    // serde_yaml reads an empty document as null rather than an empty mapping.
    if yaml.trim().is_empty() {
      return Ok(Self::default());
    }

    let config: Self = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    log::debug!("loading profiler config from {}", path.display());
    Self::from_yaml(&std::fs::read_to_string(path)?)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    validate_load_factor(self.load_factor)?;
    if self.workers == 0 {
      return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
    }
    self.key_regex()?;
    Ok(())
  }

  #[must_use]
  pub const fn profile(&self) -> ArchitectureProfile {
    ArchitectureProfile::new(self.pointer_width)
  }

  /// The compiled key filter, if one is configured.
  pub fn key_regex(&self) -> Result<Option<Regex>, ConfigError> {
    Ok(
      self
        .key_pattern
        .as_deref()
        .map(Regex::new)
        .transpose()?,
    )
  }
}
