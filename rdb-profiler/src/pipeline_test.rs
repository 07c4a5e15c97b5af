// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::{ErrorPolicy, Profiler, RESULTS_PER_WORKER, RunSummary};
use crate::config::ProfilerConfig;
use crate::error::{EstimateError, RunError};
use crate::object::{DecodedObject, Encoding, ObjectType};
use crate::report::ReportEntry;
use crate::test::{compact, hash_table, keyed, quicklist, set_table, skip_list, string};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn profiler(configure: impl FnOnce(&mut ProfilerConfig)) -> Profiler {
  let mut config = ProfilerConfig {
    instance_label: "test".to_string(),
    ..ProfilerConfig::default()
  };
  configure(&mut config);
  Profiler::new(&config).unwrap()
}

fn ok(objects: Vec<DecodedObject>) -> Vec<anyhow::Result<DecodedObject>> {
  objects.into_iter().map(anyhow::Ok).collect()
}

// A mix of every structure, including plenty of skip lists so that level sampling matters.
fn mixed_objects(count: usize) -> Vec<DecodedObject> {
  (0 .. count)
    .map(|i| {
      let object = match i % 5 {
        0 => string("value"),
        1 => skip_list(
          &(0 .. i % 40 + 1)
            .map(|m| (m % 9 + 1, f64::from(u32::try_from(m).unwrap())))
            .collect::<Vec<_>>(),
        ),
        2 => hash_table(&[(4, i % 30), (6, 2)]),
        3 => quicklist(&[(i % 100 + 10, 3)]),
        _ => set_table(&[i % 7 + 1; 6]),
      };
      keyed(object, u32::try_from(i % 3).unwrap(), &format!("key:{i}"))
    })
    .collect()
}

fn keys(entries: &[ReportEntry]) -> Vec<&str> {
  entries.iter().map(|entry| entry.key.as_str()).collect()
}

fn run(
  profiler: &Profiler,
  objects: Vec<anyhow::Result<DecodedObject>>,
) -> (Result<RunSummary, RunError>, Vec<ReportEntry>) {
  let mut entries = Vec::new();
  let result = profiler.run(objects, &mut |entry: ReportEntry| {
    entries.push(entry);
    anyhow::Ok(())
  });
  (result, entries)
}

async fn run_parallel(
  profiler: &Profiler,
  objects: Vec<anyhow::Result<DecodedObject>>,
  workers: usize,
) -> (Result<RunSummary, RunError>, Vec<ReportEntry>) {
  let mut entries = Vec::new();
  let result = profiler
    .run_parallel(
      objects,
      &mut |entry: ReportEntry| {
        entries.push(entry);
        anyhow::Ok(())
      },
      workers,
    )
    .await;
  (result, entries)
}

#[test]
fn reports_every_object_in_order() {
  let profiler = profiler(|_| {});
  let (result, entries) = run(&profiler, ok(mixed_objects(20)));

  let summary = result.unwrap();
  assert_eq!(summary.reported, 20);
  assert_eq!(summary.filtered, 0);
  assert!(summary.skipped.is_empty());

  let expected: Vec<String> = (0 .. 20).map(|i| format!("key:{i}")).collect();
  assert_eq!(keys(&entries), expected);
  assert!(entries.iter().all(|entry| entry.instance == "test"));
  assert_eq!(entries[0].size, 5);
  assert_eq!(entries[0].element_count, 5);
}

#[test]
fn seeded_runs_repeat() {
  let profiler = profiler(|config| config.seed = Some(11));
  let (_, first) = run(&profiler, ok(mixed_objects(50)));
  let (_, second) = run(&profiler, ok(mixed_objects(50)));
  assert_eq!(first, second);
}

#[tokio::test]
async fn parallel_matches_sequential_under_seed() {
  let profiler = profiler(|config| config.seed = Some(42));
  let (sequential, expected) = run(&profiler, ok(mixed_objects(300)));
  sequential.unwrap();

  for workers in [1, 3, 8] {
    let (parallel, entries) = run_parallel(&profiler, ok(mixed_objects(300)), workers).await;
    assert_eq!(parallel.unwrap().reported, 300);
    assert_eq!(entries, expected);
  }
}

#[tokio::test]
async fn parallel_keeps_input_order_without_seed() {
  let profiler = profiler(|_| {});
  let (result, entries) = run_parallel(&profiler, ok(mixed_objects(200)), 4).await;
  result.unwrap();

  let expected: Vec<String> = (0 .. 200).map(|i| format!("key:{i}")).collect();
  assert_eq!(keys(&entries), expected);
}

#[tokio::test]
async fn workers_stay_within_window_of_sink() {
  let profiler = profiler(|config| config.seed = Some(3));
  let workers = 2;
  let window = workers * RESULTS_PER_WORKER;

  let pulled = Arc::new(AtomicUsize::new(0));
  let counter = pulled.clone();
  let objects = ok(mixed_objects(2000))
    .into_iter()
    .inspect(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

  let mut delivered = 0;
  let summary = profiler
    .run_parallel(
      objects,
      &mut |_: ReportEntry| {
        assert!(pulled.load(Ordering::SeqCst) <= delivered + window);
        delivered += 1;
        anyhow::Ok(())
      },
      workers,
    )
    .await
    .unwrap();

  assert_eq!(summary.reported, 2000);
  assert_eq!(delivered, 2000);
}

#[tokio::test]
async fn decode_failure_ends_run() {
  let objects = || {
    vec![
      Ok(keyed(string("a"), 0, "first")),
      Err(anyhow::anyhow!("truncated snapshot")),
      Ok(keyed(string("b"), 0, "never")),
    ]
  };
  let profiler = profiler(|config| config.error_policy = ErrorPolicy::Skip);

  let (result, entries) = run(&profiler, objects());
  assert_matches!(result, Err(RunError::Decode(e)) if e.to_string() == "truncated snapshot");
  assert_eq!(keys(&entries), vec!["first"]);

  let (result, entries) = run_parallel(&profiler, objects(), 4).await;
  assert_matches!(result, Err(RunError::Decode(_)));
  assert_eq!(keys(&entries), vec!["first"]);
}

fn with_unsupported() -> Vec<anyhow::Result<DecodedObject>> {
  ok(vec![
    keyed(string("a"), 0, "before"),
    keyed(compact(ObjectType::Stream, Encoding::ListPack, 10, 1), 2, "bad"),
    keyed(string("b"), 0, "after"),
  ])
}

#[tokio::test]
async fn abort_policy_stops_at_first_error() {
  let profiler = profiler(|_| {});

  let (result, entries) = run(&profiler, with_unsupported());
  assert_matches!(
    result,
    Err(RunError::Estimate(EstimateError::UnsupportedEncoding(context))) => {
      assert_eq!(context.key, "bad");
      assert_eq!(context.db_index, 2);
    }
  );
  assert_eq!(keys(&entries), vec!["before"]);

  let (result, entries) = run_parallel(&profiler, with_unsupported(), 2).await;
  assert_matches!(result, Err(RunError::Estimate(_)));
  assert_eq!(keys(&entries), vec!["before"]);
}

#[tokio::test]
async fn skip_policy_records_errors() {
  let profiler = profiler(|config| config.error_policy = ErrorPolicy::Skip);

  let (result, entries) = run(&profiler, with_unsupported());
  let summary = result.unwrap();
  assert_eq!(summary.reported, 2);
  assert_eq!(summary.skipped.len(), 1);
  assert_eq!(summary.skipped[0].context().key, "bad");
  assert_eq!(keys(&entries), vec!["before", "after"]);

  let (result, entries) = run_parallel(&profiler, with_unsupported(), 3).await;
  assert_eq!(result.unwrap().skipped.len(), 1);
  assert_eq!(keys(&entries), vec!["before", "after"]);
}

#[test]
fn key_pattern_filters() {
  let profiler = profiler(|config| config.key_pattern = Some("^key:1".to_string()));
  let (result, entries) = run(&profiler, ok(mixed_objects(20)));

  let summary = result.unwrap();
  // key:1 and key:10 through key:19.
  assert_eq!(summary.reported, 11);
  assert_eq!(summary.filtered, 9);
  assert!(entries.iter().all(|entry| entry.key.starts_with("key:1")));
}

#[test]
fn sink_failure_ends_run() {
  let profiler = profiler(|_| {});
  let mut accepted = 0;
  let result = profiler.run(ok(mixed_objects(5)), &mut |_: ReportEntry| {
    accepted += 1;
    if accepted == 2 {
      anyhow::bail!("disk full");
    }
    anyhow::Ok(())
  });

  assert_matches!(result, Err(RunError::Sink(e)) if e.to_string() == "disk full");
  assert_eq!(accepted, 2);
}

#[test]
fn rejects_invalid_config() {
  let config = ProfilerConfig {
    workers: 0,
    ..ProfilerConfig::default()
  };
  assert!(Profiler::new(&config).is_err());
}
