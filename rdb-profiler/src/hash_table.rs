// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./hash_table_test.rs"]
mod tests;

use crate::arch::ArchitectureProfile;
use crate::config::ConfigError;

/// Smallest bucket array a dict ever allocates.
pub const MIN_BUCKETS: u64 = 4;

pub const DEFAULT_LOAD_FACTOR: f64 = 1.0;

/// Smallest accepted load factor. Anything lower asks for more than a thousand buckets per entry.
pub const MIN_LOAD_FACTOR: f64 = 1.0 / 1024.0;

// Largest bucket array that still has a power of two representation in a u64.
const MAX_BUCKETS: u64 = 1 << 63;

// dict: type and privdata pointers, rehashidx, and two dictht each holding a table pointer plus
// size, sizemask and used. That is 4 pointers and 7 longs.
const HEADER_POINTERS: u64 = 4;
const HEADER_LONGS: u64 = 7;
// dict.iterators
const HEADER_FIXED_BYTES: u64 = 4;

// dictEntry: key pointer, next pointer and an 8 byte value union. The union is charged as a fixed
// 8 bytes on both targets.
const ENTRY_POINTERS: u64 = 2;
const ENTRY_FIXED_BYTES: u64 = 8;

//
// HashTableSizer
//

/// Overhead model for a Redis dict.
#[derive(Clone, Copy, Debug)]
pub struct HashTableSizer {
  profile: ArchitectureProfile,
  load_factor: f64,
}

impl HashTableSizer {
  pub fn new(profile: ArchitectureProfile, load_factor: f64) -> Result<Self, ConfigError> {
    validate_load_factor(load_factor)?;
    Ok(Self {
      profile,
      load_factor,
    })
  }

  #[must_use]
  pub const fn profile(&self) -> ArchitectureProfile {
    self.profile
  }

  /// Number of buckets allocated for `entry_count` entries: the smallest power of two covering
  /// the load factor target, never below [`MIN_BUCKETS`].
  #[must_use]
  pub fn bucket_count(&self, entry_count: usize) -> u64 {
    #[allow(
      clippy::cast_possible_truncation,
      clippy::cast_precision_loss,
      clippy::cast_sign_loss
    )]
    let target = (entry_count as f64 / self.load_factor).ceil() as u64;
    target
      .checked_next_power_of_two()
      .unwrap_or(MAX_BUCKETS)
      .max(MIN_BUCKETS)
  }

  #[must_use]
  pub const fn header(&self) -> u64 {
    self.profile.pointers(HEADER_POINTERS)
      + HEADER_LONGS * self.profile.long_size()
      + HEADER_FIXED_BYTES
  }

  /// Header plus bucket array, without any entries.
  #[must_use]
  pub fn overhead(&self, entry_count: usize) -> u64 {
    self
      .header()
      .saturating_add(self.profile.pointers(self.bucket_count(entry_count)))
  }

  #[must_use]
  pub const fn entry_overhead(&self) -> u64 {
    self.profile.pointers(ENTRY_POINTERS) + ENTRY_FIXED_BYTES
  }

  /// Full size of a dict with `entry_count` entries. `entry_payload` is called with each entry
  /// index and returns the bytes owned by that entry beyond the dictEntry itself (key and value
  /// storage).
  pub fn size(&self, entry_count: usize, mut entry_payload: impl FnMut(usize) -> u64) -> u64 {
    let entries = (0 .. entry_count).fold(0_u64, |total, index| {
      total
        .saturating_add(self.entry_overhead())
        .saturating_add(entry_payload(index))
    });
    self.overhead(entry_count).saturating_add(entries)
  }
}

/// Load factors must be finite and no smaller than [`MIN_LOAD_FACTOR`].
pub fn validate_load_factor(load_factor: f64) -> Result<(), ConfigError> {
  if !load_factor.is_finite() || load_factor < MIN_LOAD_FACTOR {
    return Err(ConfigError::Invalid(format!(
      "load_factor must be finite and at least {MIN_LOAD_FACTOR}, got {load_factor}"
    )));
  }
  Ok(())
}
