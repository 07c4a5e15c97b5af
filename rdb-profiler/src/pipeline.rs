// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./pipeline_test.rs"]
mod tests;

use crate::config::{ConfigError, ProfilerConfig};
use crate::error::{EstimateError, RunError};
use crate::estimator::Estimator;
use crate::object::DecodedObject;
use crate::report::{ReportEntry, ReportSink, aggregate};
use crate::skip_list::RandomLevels;
use parking_lot::Mutex;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

// Objects a single worker may run ahead of the sink. Together they bound the reorder buffer.
const RESULTS_PER_WORKER: usize = 64;

//
// ErrorPolicy
//

/// What to do when a single object cannot be estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
  /// End the run with the error.
  #[default]
  Abort,
  /// Record the error in the run summary and carry on with the next object.
  Skip,
}

//
// RunSummary
//

#[derive(Debug, Default)]
pub struct RunSummary {
  // Entries handed to the sink.
  pub reported: u64,
  // Objects whose key did not match the key pattern.
  pub filtered: u64,
  // Per object failures tolerated under ErrorPolicy::Skip, in input order.
  pub skipped: Vec<EstimateError>,
}

// What became of one input item.
enum Outcome {
  Reported(ReportEntry),
  Filtered,
  Failed(EstimateError),
  DecodeFailed(anyhow::Error),
}

// Input shared by the parallel workers. Ordinals are handed out under the same lock as the item so
// they follow input order.
struct SharedSource<I> {
  objects: I,
  next_ordinal: u64,
  done: bool,
}

// Derive an independent generator seed for every object so that results do not depend on which
// worker picked the object up.
const fn object_seed(seed: u64, ordinal: u64) -> u64 {
  seed ^ ordinal.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

//
// Profiler
//

/// Drives the estimator over a stream of decoded objects and forwards a report entry per object to
/// a sink.
#[derive(Clone, Debug)]
pub struct Profiler {
  estimator: Estimator,
  seed: Option<u64>,
  instance_label: String,
  error_policy: ErrorPolicy,
  key_filter: Option<Regex>,
}

impl Profiler {
  pub fn new(config: &ProfilerConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let estimator = Estimator::new(
      config.profile(),
      config.load_factor,
      config.compact_headers,
    )?;

    log::debug!(
      "profiler: {} target, load factor {}, seed {:?}, error policy {:?}",
      config.pointer_width,
      config.load_factor,
      config.seed,
      config.error_policy
    );

    Ok(Self {
      estimator,
      seed: config.seed,
      instance_label: config.instance_label.clone(),
      error_policy: config.error_policy,
      key_filter: config.key_regex()?,
    })
  }

  #[must_use]
  pub const fn estimator(&self) -> &Estimator {
    &self.estimator
  }

  /// Estimate every object in input order on the calling thread. A decode failure ends the run
  /// after all preceding objects have been reported.
  pub fn run<I, E>(
    &self,
    objects: I,
    sink: &mut (impl ReportSink + ?Sized),
  ) -> Result<RunSummary, RunError>
  where
    I: IntoIterator<Item = Result<DecodedObject, E>>,
    E: Into<anyhow::Error>,
  {
    let mut levels = self.worker_levels();
    let mut summary = RunSummary::default();
    for (ordinal, object) in (0_u64 ..).zip(objects) {
      let outcome = self.process(ordinal, object.map_err(Into::into), &mut levels);
      self.deliver(outcome, sink, &mut summary)?;
    }

    log::debug!(
      "run complete: {} reported, {} filtered, {} skipped",
      summary.reported,
      summary.filtered,
      summary.skipped.len()
    );
    Ok(summary)
  }

  /// Same contract as [`Self::run`], with estimation spread over `workers` blocking tasks. Results
  /// are reordered before they reach the sink, so the sink observes input order. With a seed
  /// configured the output is identical to a sequential run.
  pub async fn run_parallel<I, E>(
    &self,
    objects: I,
    sink: &mut (impl ReportSink + ?Sized),
    workers: usize,
  ) -> Result<RunSummary, RunError>
  where
    I: IntoIterator<Item = Result<DecodedObject, E>>,
    I::IntoIter: Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let workers = workers.max(1);
    let source = Arc::new(Mutex::new(SharedSource {
      objects: objects.into_iter(),
      next_ordinal: 0,
      done: false,
    }));
    // One permit per object pulled but not yet delivered to the sink. Since ordinals are handed
    // out in order, the oldest undelivered object always holds a permit and progress is
    // guaranteed.
    let window = workers * RESULTS_PER_WORKER;
    let in_flight = Arc::new(Semaphore::new(window));
    let (tx, mut rx) = mpsc::channel(window);
    let runtime = tokio::runtime::Handle::current();

    let handles: Vec<_> = (0 .. workers)
      .map(|worker| {
        let profiler = self.clone();
        let source = source.clone();
        let in_flight = in_flight.clone();
        let runtime = runtime.clone();
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || {
          let mut levels = profiler.worker_levels();
          // Acquisition fails once the collector has closed the semaphore.
          while let Ok(permit) = runtime.block_on(in_flight.clone().acquire_owned()) {
            let (ordinal, object) = {
              let mut source = source.lock();
              if source.done {
                break;
              }
              let Some(object) = source.objects.next() else {
                source.done = true;
                break;
              };
              // Returned by the collector once this object reaches the sink.
              permit.forget();
              let object: Result<DecodedObject, anyhow::Error> = object.map_err(Into::into);
              // Nothing after a decode failure is consumed.
              source.done = object.is_err();
              let ordinal = source.next_ordinal;
              source.next_ordinal += 1;
              (ordinal, object)
            };

            let outcome = profiler.process(ordinal, object, &mut levels);
            if tx.blocking_send((ordinal, outcome)).is_err() {
              break;
            }
          }
          log::trace!("estimation worker {worker} done");
        })
      })
      .collect();
    drop(tx);

    let mut summary = RunSummary::default();
    let mut pending = BTreeMap::new();
    let mut next_ordinal = 0_u64;
    let mut result = Ok(());
    'collect: while let Some((ordinal, outcome)) = rx.recv().await {
      pending.insert(ordinal, outcome);
      while let Some(outcome) = pending.remove(&next_ordinal) {
        next_ordinal += 1;
        if let Err(e) = self.deliver(outcome, sink, &mut summary) {
          result = Err(e);
          break 'collect;
        }
        in_flight.add_permits(1);
      }
    }

    in_flight.close();
    drop(rx);
    for handle in handles {
      if let Err(e) = handle.await
        && result.is_ok()
      {
        result = Err(RunError::Worker(e.to_string()));
      }
    }
    result?;

    log::debug!(
      "parallel run complete ({workers} workers): {} reported, {} filtered, {} skipped",
      summary.reported,
      summary.filtered,
      summary.skipped.len()
    );
    Ok(summary)
  }

  fn worker_levels(&self) -> RandomLevels {
    self
      .seed
      .map_or_else(RandomLevels::from_os_rng, RandomLevels::seeded)
  }

  fn process(
    &self,
    ordinal: u64,
    object: Result<DecodedObject, anyhow::Error>,
    levels: &mut RandomLevels,
  ) -> Outcome {
    let object = match object {
      Ok(object) => object,
      Err(e) => return Outcome::DecodeFailed(e),
    };

    if let Some(filter) = &self.key_filter
      && !filter.is_match(&object.key)
    {
      return Outcome::Filtered;
    }

    let estimate = match self.seed {
      Some(seed) => self
        .estimator
        .estimate(&object, &mut RandomLevels::seeded(object_seed(seed, ordinal))),
      None => self.estimator.estimate(&object, levels),
    };
    match estimate {
      Ok(estimate) => Outcome::Reported(aggregate(&object, estimate, &self.instance_label)),
      Err(e) => Outcome::Failed(e),
    }
  }

  fn deliver(
    &self,
    outcome: Outcome,
    sink: &mut (impl ReportSink + ?Sized),
    summary: &mut RunSummary,
  ) -> Result<(), RunError> {
    match outcome {
      Outcome::Reported(entry) => {
        sink.accept(entry).map_err(RunError::Sink)?;
        summary.reported += 1;
      },
      Outcome::Filtered => summary.filtered += 1,
      Outcome::Failed(e) => match self.error_policy {
        ErrorPolicy::Abort => return Err(e.into()),
        ErrorPolicy::Skip => {
          log::debug!("skipping object: {e}");
          summary.skipped.push(e);
        },
      },
      Outcome::DecodeFailed(e) => return Err(RunError::Decode(e)),
    }
    Ok(())
  }
}
