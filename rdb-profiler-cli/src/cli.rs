// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./cli_test.rs"]
mod tests;

use clap::Parser;
use rdb_profiler::{ErrorPolicy, PointerWidth, ProfilerConfig};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Options {
  /// Decoded objects as JSON lines, or "-" for stdin
  #[clap(env = "RDB_PROFILER_INPUT", long, default_value = "-")]
  pub input: String,

  /// Profiler config file (YAML). Flags below override its values
  #[clap(env = "RDB_PROFILER_CONFIG", long)]
  pub config: Option<PathBuf>,

  /// Target pointer width in bits (32 or 64)
  #[clap(env = "RDB_PROFILER_POINTER_WIDTH", long)]
  pub pointer_width: Option<u32>,

  /// Seed for skip list level sampling
  #[clap(env = "RDB_PROFILER_SEED", long)]
  pub seed: Option<u64>,

  /// Instance label attached to every report entry
  #[clap(env = "RDB_PROFILER_INSTANCE", long)]
  pub instance: Option<String>,

  /// Number of estimation workers
  #[clap(env = "RDB_PROFILER_WORKERS", long)]
  pub workers: Option<usize>,

  /// Only report keys matching this regex
  #[clap(long)]
  pub key_pattern: Option<String>,

  /// Skip objects that cannot be estimated instead of failing the run
  #[clap(long)]
  pub skip_errors: bool,

  /// Only print the N largest keys, largest first
  #[clap(long)]
  pub top: Option<usize>,
}

impl Options {
  /// Overlay the flags that were given on top of `config`.
  pub fn apply(&self, config: &mut ProfilerConfig) -> anyhow::Result<()> {
    if let Some(bits) = self.pointer_width {
      config.pointer_width = PointerWidth::try_from(bits).map_err(anyhow::Error::msg)?;
    }
    if let Some(seed) = self.seed {
      config.seed = Some(seed);
    }
    if let Some(instance) = &self.instance {
      config.instance_label.clone_from(instance);
    }
    if let Some(workers) = self.workers {
      config.workers = workers;
    }
    if let Some(pattern) = &self.key_pattern {
      config.key_pattern = Some(pattern.clone());
    }
    if self.skip_errors {
      config.error_policy = ErrorPolicy::Skip;
    }

    config.validate()?;
    Ok(())
  }
}
