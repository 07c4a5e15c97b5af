// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./report_test.rs"]
mod tests;

use crate::estimator::Estimate;
use crate::object::{DecodedObject, Encoding, ObjectType};
use humansize::{BINARY, FormatSizeOptions};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Written in place of a timestamp for keys without a TTL.
pub const NO_EXPIRATION: &str = "-1";

const EXPIRATION_FORMAT: &[BorrowedFormatItem<'static>] =
  format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// Binary scaling, always two decimals, no space before the unit.
fn size_format() -> FormatSizeOptions {
  FormatSizeOptions::from(BINARY)
    .decimal_places(2)
    .decimal_zeroes(2)
    .space_after_value(false)
}

//
// ReportEntry
//

/// One output record per estimated object.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ReportEntry {
  pub db_index: u32,
  pub instance: String,
  pub key: String,
  #[serde(rename = "type")]
  pub object_type: ObjectType,
  pub encoding: Encoding,
  pub size: u64,
  pub size_readable: String,
  pub element_count: usize,
  pub expiration: String,
}

/// Bind an estimate to the identifying metadata of the object it was computed for.
#[must_use]
pub fn aggregate(object: &DecodedObject, estimate: Estimate, instance_label: &str) -> ReportEntry {
  ReportEntry {
    db_index: object.db_index,
    instance: instance_label.to_string(),
    key: object.key_lossy(),
    object_type: object.object_type,
    encoding: object.encoding,
    size: estimate.size,
    size_readable: format_size(estimate.size),
    element_count: estimate.element_count,
    expiration: format_expiration(object.expiration),
  }
}

/// Human readable size in binary units, e.g. `512B` or `1.50KB`.
#[must_use]
pub fn format_size(size: u64) -> String {
  if size < 1024 {
    return format!("{size}B");
  }

  // Short labels: KiB is printed as KB.
  humansize::format_size(size, size_format()).replace("iB", "B")
}

/// Expiration as a UTC timestamp, or [`NO_EXPIRATION`].
#[must_use]
pub fn format_expiration(expiration: Option<OffsetDateTime>) -> String {
  let Some(expiration) = expiration else {
    return NO_EXPIRATION.to_string();
  };

  expiration
    .to_offset(UtcOffset::UTC)
    .format(EXPIRATION_FORMAT)
    .unwrap_or_else(|e| {
      log::debug!("unable to format expiration {expiration}: {e}");
      expiration.unix_timestamp().to_string()
    })
}

//
// ReportSink
//

/// Receives every report entry of a run, once per object and in input order.
pub trait ReportSink {
  fn accept(&mut self, entry: ReportEntry) -> anyhow::Result<()>;
}

impl<F: FnMut(ReportEntry) -> anyhow::Result<()>> ReportSink for F {
  fn accept(&mut self, entry: ReportEntry) -> anyhow::Result<()> {
    self(entry)
  }
}

//
// BiggestKeys
//

// Heap slot ordered so that the heap top is the entry to evict next: the smallest size, and among
// equal sizes the latest arrival.
#[derive(Debug)]
struct Ranked {
  sequence: u64,
  entry: ReportEntry,
}

impl Ranked {
  fn rank(&self) -> (u64, Reverse<u64>) {
    (self.entry.size, Reverse(self.sequence))
  }
}

impl PartialEq for Ranked {
  fn eq(&self, other: &Self) -> bool {
    self.rank() == other.rank()
  }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Ranked {
  fn cmp(&self, other: &Self) -> Ordering {
    // Reversed so the max heap behaves as a min heap on rank.
    other.rank().cmp(&self.rank())
  }
}

/// Sink keeping only the `limit` largest entries. Entries of equal size keep arrival order.
#[derive(Debug)]
pub struct BiggestKeys {
  limit: usize,
  next_sequence: u64,
  heap: BinaryHeap<Ranked>,
}

impl BiggestKeys {
  #[must_use]
  pub fn new(limit: usize) -> Self {
    Self {
      limit,
      next_sequence: 0,
      heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(1024)),
    }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.heap.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.heap.is_empty()
  }

  pub fn push(&mut self, entry: ReportEntry) {
    if self.limit == 0 {
      return;
    }

    let candidate = Ranked {
      sequence: self.next_sequence,
      entry,
    };
    self.next_sequence += 1;

    if self.heap.len() < self.limit {
      self.heap.push(candidate);
      return;
    }
    if let Some(mut smallest) = self.heap.peek_mut()
      && candidate.rank() > smallest.rank()
    {
      *smallest = candidate;
    }
  }

  /// The retained entries, largest first.
  #[must_use]
  pub fn into_sorted_vec(self) -> Vec<ReportEntry> {
    // BinaryHeap::into_sorted_vec is ascending by Ord, which is descending by rank here.
    self
      .heap
      .into_sorted_vec()
      .into_iter()
      .map(|ranked| ranked.entry)
      .collect()
  }
}

impl ReportSink for BiggestKeys {
  fn accept(&mut self, entry: ReportEntry) -> anyhow::Result<()> {
    self.push(entry);
    Ok(())
  }
}
