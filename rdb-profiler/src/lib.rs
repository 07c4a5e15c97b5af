// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]

//! Memory footprint estimation for objects recovered from a Redis RDB snapshot.
//!
//! The estimator never talks to Redis. It models the structures Redis builds in memory for each
//! value (dicts, skip lists, linked lists, quicklists) and charges their headers, bucket arrays
//! and per node metadata, plus the payload bytes carried by the decoded object. Compact
//! encodings (ziplist, listpack, intset, zipmap) are charged their serialized length, since Redis
//! keeps those buffers as is.
//!
//! A decoded object flows through [`estimator::Estimator`], the result is bound to the object's
//! metadata by [`report::aggregate`], and the [`pipeline::Profiler`] drives both over a stream of
//! decoded objects while forwarding every [`report::ReportEntry`] to a caller supplied sink.

pub mod arch;
pub mod compact;
pub mod config;
pub mod error;
pub mod estimator;
pub mod hash_table;
pub mod object;
pub mod pipeline;
pub mod report;
pub mod skip_list;


#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  rdb_test_helpers::test_global_init();
}

pub use arch::{ArchitectureProfile, PointerWidth};
pub use config::ProfilerConfig;
pub use error::{EstimateError, ObjectContext, RunError};
pub use estimator::{Estimate, Estimator};
pub use object::{DecodedObject, Encoding, ObjectType, Payload};
pub use pipeline::{ErrorPolicy, Profiler, RunSummary};
pub use report::{BiggestKeys, ReportEntry, ReportSink, aggregate};
pub use skip_list::{FixedLevels, LevelSource, RandomLevels};
