// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./lib_test.rs"]
mod tests;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload::Handle as ReloadHandle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub const DEFAULT_FILTER_RULES: &str = "info";

//
// ProfilerLogger
//

// Process wide logging for the profiler binaries. Output goes to stderr so that stdout stays free
// for report entries. The filter can be replaced after startup, e.g. once the config file has
// been read.
pub struct ProfilerLogger {
  handle: Mutex<Option<ReloadHandle<EnvFilter, Registry>>>,
}

impl ProfilerLogger {
  const fn new() -> Self {
    Self {
      handle: Mutex::new(None),
    }
  }

  fn get() -> &'static Self {
    static LOGGER: ProfilerLogger = ProfilerLogger::new();

    &LOGGER
  }

  // Install the global subscriber. RUST_LOG wins over the provided default rules. Only the first
  // call has an effect.
  pub fn initialize(default_rules: &str) {
    let mut handle = Self::get().handle.lock();
    if handle.is_some() {
      return;
    }

    let stderr = tracing_subscriber::fmt::layer()
      .with_writer(std::io::stderr)
      .with_ansi(std::env::var("RDB_LOG_ANSI").is_ok())
      .with_line_number(true)
      .compact();

    let filter = EnvFilter::new(
      std::env::var("RUST_LOG")
        .as_deref()
        .unwrap_or(default_rules),
    );

    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    *handle = Some(reload_handle);

    // Another subscriber may already be installed (e.g. by a test harness). Keep it in that case.
    let _ignored = Registry::default().with(filter).with(stderr).try_init();
  }

  #[must_use]
  pub fn is_initialized() -> bool {
    Self::get().handle.lock().is_some()
  }

  // Replace the active filter with the provided RUST_LOG style rules.
  pub fn swap(new_rules: &str) -> anyhow::Result<()> {
    let new_filter = EnvFilter::try_new(new_rules)?;
    let handle = Self::get().handle.lock();
    let Some(handle) = handle.as_ref() else {
      return Err(anyhow!("logger not initialized"));
    };
    handle.reload(new_filter)?;

    // The log facade caches the max level at init time and tracing_subscriber does not update it
    // on reload.
    log::set_max_level(tracing_log::AsLog::as_log(
      &tracing_subscriber::filter::LevelFilter::current(),
    ));

    Ok(())
  }
}
