// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::cli::Options;
use crate::json_lines::{EntryWriter, ObjectReader, open_input};
use clap::Parser;
use rdb_log::{DEFAULT_FILTER_RULES, ProfilerLogger};
use rdb_profiler::{BiggestKeys, Profiler, ProfilerConfig, ReportSink, RunError, RunSummary};
use std::io::{BufRead, Write};

mod cli;
mod json_lines;

#[cfg(test)]
#[path = "./main_test.rs"]
mod tests;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  ProfilerLogger::initialize(DEFAULT_FILTER_RULES);
  let options = Options::parse();

  let mut config = match &options.config {
    Some(path) => ProfilerConfig::load(path)?,
    None => ProfilerConfig::default(),
  };
  options.apply(&mut config)?;
  if let Some(filter) = &config.log_filter {
    ProfilerLogger::swap(filter)?;
  }

  let profiler = Profiler::new(&config)?;
  let (summary, _) = profile(
    &profiler,
    open_input(&options.input)?,
    std::io::stdout().lock(),
    options.top,
    config.workers,
  )
  .await?;

  for error in &summary.skipped {
    log::warn!("skipped: {error}");
  }
  log::info!(
    "{} objects reported, {} filtered, {} skipped",
    summary.reported,
    summary.filtered,
    summary.skipped.len()
  );

  Ok(())
}

/// Estimate every object read from `input` and write the report to `output`. With `top` only the
/// largest entries are written, largest first.
async fn profile<R, W>(
  profiler: &Profiler,
  input: R,
  output: W,
  top: Option<usize>,
  workers: usize,
) -> anyhow::Result<(RunSummary, W)>
where
  R: BufRead + Send + 'static,
  W: Write,
{
  let objects = ObjectReader::new(input);
  let mut writer = EntryWriter::new(output);

  let summary = if let Some(top) = top {
    let mut biggest = BiggestKeys::new(top);
    let summary = run(profiler, objects, &mut biggest, workers).await?;
    for entry in biggest.into_sorted_vec() {
      writer.accept(entry)?;
    }
    summary
  } else {
    run(profiler, objects, &mut writer, workers).await?
  };

  Ok((summary, writer.into_inner()?))
}

async fn run<R: BufRead + Send + 'static>(
  profiler: &Profiler,
  objects: ObjectReader<R>,
  sink: &mut dyn ReportSink,
  workers: usize,
) -> Result<RunSummary, RunError> {
  if workers > 1 {
    profiler.run_parallel(objects, sink, workers).await
  } else {
    profiler.run(objects, sink)
  }
}
