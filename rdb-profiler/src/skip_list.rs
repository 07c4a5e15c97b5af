// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./skip_list_test.rs"]
mod tests;

use crate::arch::ArchitectureProfile;
use crate::hash_table::HashTableSizer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Highest level a skip list node can reach.
pub const MAX_LEVEL: u32 = 32;

// Draws are uniform in [0, LEVEL_DRAW_MAX]. A draw below the threshold promotes the node one
// level, which gives a branching probability of 1/4.
const LEVEL_DRAW_MAX: u32 = 0xFFFF;
const LEVEL_PROMOTE_THRESHOLD: u32 = LEVEL_DRAW_MAX / 4;

// zset: dict and zsl pointers. zskiplist: header and tail pointers plus an 8 byte length and a
// 4 byte level padded to 8.
const HEADER_POINTERS: u64 = 4;
const HEADER_FIXED_BYTES: u64 = 16;

// zskiplistNode: member sds pointer and backward pointer plus the 8 byte score.
const NODE_POINTERS: u64 = 2;
const SCORE_BYTES: u64 = 8;
// Every level holds a forward pointer and an 8 byte span.
const SPAN_BYTES: u64 = 8;

/// Sample a node level using `draw` as the source of uniform values in `[0, 65535]`. Sampling
/// stops as soon as the level reaches [`MAX_LEVEL`].
pub fn sample_level_with(mut draw: impl FnMut() -> u32) -> u32 {
  let mut level = 1;
  while draw() < LEVEL_PROMOTE_THRESHOLD {
    level += 1;
    if level >= MAX_LEVEL {
      return MAX_LEVEL;
    }
  }
  level
}

pub fn sample_level<R: Rng>(rng: &mut R) -> u32 {
  sample_level_with(|| rng.random_range(0 ..= LEVEL_DRAW_MAX))
}

//
// LevelSource
//

/// Supplies the level of every skip list node being sized.
pub trait LevelSource {
  fn next_level(&mut self) -> u32;
}

impl<T: LevelSource + ?Sized> LevelSource for &mut T {
  fn next_level(&mut self) -> u32 {
    (**self).next_level()
  }
}

//
// RandomLevels
//

/// Levels drawn from a pseudo random generator, reproducing the distribution Redis uses when it
/// inserts into a skip list.
pub struct RandomLevels<R = StdRng> {
  rng: R,
}

impl<R: Rng> RandomLevels<R> {
  pub const fn new(rng: R) -> Self {
    Self { rng }
  }
}

impl RandomLevels<StdRng> {
  #[must_use]
  pub fn seeded(seed: u64) -> Self {
    Self::new(StdRng::seed_from_u64(seed))
  }

  #[must_use]
  pub fn from_os_rng() -> Self {
    Self::new(StdRng::from_os_rng())
  }
}

impl<R: Rng> LevelSource for RandomLevels<R> {
  fn next_level(&mut self) -> u32 {
    sample_level(&mut self.rng)
  }
}

//
// FixedLevels
//

/// Replays a fixed sequence of levels, wrapping around at the end. Levels are clamped to
/// `[1, MAX_LEVEL]`. An empty sequence always yields 1.
#[derive(Clone, Debug, Default)]
pub struct FixedLevels {
  levels: Vec<u32>,
  position: usize,
}

impl FixedLevels {
  #[must_use]
  pub fn new(levels: impl Into<Vec<u32>>) -> Self {
    Self {
      levels: levels.into(),
      position: 0,
    }
  }
}

impl LevelSource for FixedLevels {
  fn next_level(&mut self) -> u32 {
    let Some(level) = self.levels.get(self.position).copied() else {
      return 1;
    };
    self.position = (self.position + 1) % self.levels.len();
    level.clamp(1, MAX_LEVEL)
  }
}

//
// SkipListSizer
//

/// Overhead model for a skip list encoded sorted set: the skip list itself plus the dict that
/// maps members to scores.
#[derive(Clone, Copy, Debug)]
pub struct SkipListSizer {
  hash_table: HashTableSizer,
}

impl SkipListSizer {
  #[must_use]
  pub const fn new(hash_table: HashTableSizer) -> Self {
    Self { hash_table }
  }

  const fn profile(&self) -> ArchitectureProfile {
    self.hash_table.profile()
  }

  /// zset and zskiplist headers, without the companion dict.
  #[must_use]
  pub const fn header(&self) -> u64 {
    self.profile().pointers(HEADER_POINTERS) + HEADER_FIXED_BYTES
  }

  /// Headers plus the companion dict's header and bucket array.
  #[must_use]
  pub fn overhead(&self, entry_count: usize) -> u64 {
    self.header() + self.hash_table.overhead(entry_count)
  }

  /// Cost of one node at `level`, including its dict entry.
  #[must_use]
  pub const fn entry_overhead(&self, level: u32) -> u64 {
    let profile = self.profile();
    self.hash_table.entry_overhead()
      + profile.pointers(NODE_POINTERS)
      + SCORE_BYTES
      + (profile.pointer_size() + SPAN_BYTES) * level as u64
  }

  /// Full size of a sorted set with `entry_count` members. One level is drawn from `levels` per
  /// entry, in entry order. `entry_payload` returns the bytes owned by each member.
  pub fn size(
    &self,
    entry_count: usize,
    levels: &mut (impl LevelSource + ?Sized),
    mut entry_payload: impl FnMut(usize) -> u64,
  ) -> u64 {
    let entries: u64 = (0 .. entry_count)
      .map(|index| self.entry_overhead(levels.next_level()) + entry_payload(index))
      .sum();
    self.overhead(entry_count) + entries
  }
}
