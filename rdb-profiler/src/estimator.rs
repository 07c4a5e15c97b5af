// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./estimator_test.rs"]
mod tests;

use crate::arch::ArchitectureProfile;
use crate::compact::{CompactHeaders, CompactSizer};
use crate::config::ConfigError;
use crate::error::{EstimateError, ObjectContext};
use crate::hash_table::HashTableSizer;
use crate::object::{CompactBuffer, DecodedObject, Encoding, ObjectType, Payload};
use crate::skip_list::{LevelSource, SkipListSizer};

// adlist list: head, tail, dup, free and match pointers plus the length.
const LINKED_LIST_HEADER_POINTERS: u64 = 5;
const LINKED_LIST_HEADER_LONGS: u64 = 1;
// listNode: prev, next and value pointers.
const LINKED_LIST_NODE_POINTERS: u64 = 3;

// quicklist: head and tail pointers, count, and two 4 byte fields (len and fill/compress).
const QUICKLIST_HEADER_POINTERS: u64 = 2;
const QUICKLIST_HEADER_LONGS: u64 = 1;
const QUICKLIST_HEADER_FIXED_BYTES: u64 = 2 * 4;
// quicklistNode: prev, next, zl and entry pointers, sz, and two 4 byte fields.
const QUICKLIST_NODE_POINTERS: u64 = 4;
const QUICKLIST_NODE_LONGS: u64 = 1;
const QUICKLIST_NODE_FIXED_BYTES: u64 = 2 * 4;

//
// Estimate
//

/// Estimated in-memory size of one object and its element count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Estimate {
  pub size: u64,
  pub element_count: usize,
}

//
// Sizing
//

// How a (type, encoding) pair is sized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sizing {
  Compact,
  QuickList,
  LinkedList,
  HashTable,
  SkipList,
  StreamListPacks,
}

// The dispatch table. Pairs missing here have no sizing formula.
const fn sizing_for(object_type: ObjectType, encoding: Encoding) -> Option<Sizing> {
  match (object_type, encoding) {
    (ObjectType::String, Encoding::Raw | Encoding::Int | Encoding::EmbStr)
    | (ObjectType::List, Encoding::ZipList | Encoding::ListPack)
    | (ObjectType::Hash, Encoding::ZipMap | Encoding::ZipList | Encoding::ListPack)
    | (ObjectType::Set, Encoding::IntSet | Encoding::ListPack)
    | (ObjectType::SortedSet, Encoding::ZipList | Encoding::ListPack) => Some(Sizing::Compact),
    (ObjectType::List, Encoding::QuickList) => Some(Sizing::QuickList),
    (ObjectType::List, Encoding::LinkedList) => Some(Sizing::LinkedList),
    (ObjectType::Hash | ObjectType::Set, Encoding::HashTable) => Some(Sizing::HashTable),
    (ObjectType::SortedSet, Encoding::SkipList) => Some(Sizing::SkipList),
    (ObjectType::Stream, Encoding::Stream) => Some(Sizing::StreamListPacks),
    _ => None,
  }
}

//
// Estimator
//

/// Per type estimator. Stateless apart from its configuration, so a single instance can be shared
/// by any number of workers. The only mutable input is the level source used for skip lists.
#[derive(Clone, Copy, Debug)]
pub struct Estimator {
  profile: ArchitectureProfile,
  compact: CompactSizer,
  hash_table: HashTableSizer,
  skip_list: SkipListSizer,
}

impl Estimator {
  pub fn new(
    profile: ArchitectureProfile,
    load_factor: f64,
    headers: CompactHeaders,
  ) -> Result<Self, ConfigError> {
    let hash_table = HashTableSizer::new(profile, load_factor)?;
    Ok(Self {
      profile,
      compact: CompactSizer::new(headers),
      hash_table,
      skip_list: SkipListSizer::new(hash_table),
    })
  }

  #[must_use]
  pub const fn profile(&self) -> ArchitectureProfile {
    self.profile
  }

  #[must_use]
  pub const fn compact(&self) -> &CompactSizer {
    &self.compact
  }

  #[must_use]
  pub const fn hash_table(&self) -> &HashTableSizer {
    &self.hash_table
  }

  #[must_use]
  pub const fn skip_list(&self) -> &SkipListSizer {
    &self.skip_list
  }

  /// Estimate the in-memory size of `object`. Skip list levels are drawn from `levels` in member
  /// order.
  pub fn estimate(
    &self,
    object: &DecodedObject,
    levels: &mut (impl LevelSource + ?Sized),
  ) -> Result<Estimate, EstimateError> {
    let Some(sizing) = sizing_for(object.object_type, object.encoding) else {
      return Err(EstimateError::UnsupportedEncoding(object.into()));
    };
    let object_type = object.object_type;
    let element_size = |len: usize| self.compact.size(object_type, len as u64);

    let estimate = match (sizing, &object.payload) {
      (Sizing::Compact, Payload::Compact(compact)) => {
        let element_count = if object_type == ObjectType::String {
          compact.buffer.len()
        } else {
          check_compact(object, compact)?;
          compact.entries
        };
        Estimate {
          size: self.compact.size(object_type, compact.len()),
          element_count,
        }
      },
      (Sizing::QuickList, Payload::Segments { segments }) => {
        let mut size = self.quicklist_header();
        let mut element_count = 0;
        for segment in segments {
          check_compact(object, segment)?;
          size += self.quicklist_node() + self.compact.size(object_type, segment.len());
          element_count += segment.entries;
        }
        Estimate {
          size,
          element_count,
        }
      },
      (Sizing::LinkedList, Payload::ListElements { elements }) => Estimate {
        size: self.linked_list_header()
          + elements
            .iter()
            .map(|element| self.linked_list_node() + element_size(element.len()))
            .sum::<u64>(),
        element_count: elements.len(),
      },
      (Sizing::HashTable, Payload::HashEntries { entries })
        if object_type == ObjectType::Hash =>
      {
        Estimate {
          size: self.hash_table.size(entries.len(), |i| {
            element_size(entries[i].field.len() + entries[i].value.len())
          }),
          element_count: entries.len(),
        }
      },
      (Sizing::HashTable, Payload::SetMembers { members }) if object_type == ObjectType::Set => {
        Estimate {
          size: self
            .hash_table
            .size(members.len(), |i| element_size(members[i].len())),
          element_count: members.len(),
        }
      },
      (Sizing::SkipList, Payload::SortedSetEntries { entries }) => {
        if let Some(entry) = entries.iter().find(|entry| entry.score.is_nan()) {
          return Err(malformed(
            object,
            format!(
              "member {:?} has a NaN score",
              String::from_utf8_lossy(&entry.member)
            ),
          ));
        }
        Estimate {
          size: self
            .skip_list
            .size(entries.len(), levels, |i| element_size(entries[i].member.len())),
          element_count: entries.len(),
        }
      },
      (Sizing::StreamListPacks, Payload::Segments { segments }) => {
        let mut size = 0;
        let mut element_count = 0;
        for segment in segments {
          check_compact(object, segment)?;
          size += self.compact.size(object_type, segment.len());
          element_count += segment.entries;
        }
        Estimate {
          size,
          element_count,
        }
      },
      (_, payload) => {
        return Err(malformed(
          object,
          format!(
            "{} payload does not match {} encoding",
            payload.kind(),
            object.encoding
          ),
        ));
      },
    };

    log::trace!(
      "estimated {} {} key {:?}: {} bytes, {} elements",
      object.object_type,
      object.encoding,
      object.key,
      estimate.size,
      estimate.element_count
    );

    Ok(estimate)
  }

  const fn linked_list_header(&self) -> u64 {
    self.profile.pointers(LINKED_LIST_HEADER_POINTERS)
      + LINKED_LIST_HEADER_LONGS * self.profile.long_size()
  }

  const fn linked_list_node(&self) -> u64 {
    self.profile.pointers(LINKED_LIST_NODE_POINTERS)
  }

  const fn quicklist_header(&self) -> u64 {
    self.profile.pointers(QUICKLIST_HEADER_POINTERS)
      + QUICKLIST_HEADER_LONGS * self.profile.long_size()
      + QUICKLIST_HEADER_FIXED_BYTES
  }

  const fn quicklist_node(&self) -> u64 {
    self.profile.pointers(QUICKLIST_NODE_POINTERS)
      + QUICKLIST_NODE_LONGS * self.profile.long_size()
      + QUICKLIST_NODE_FIXED_BYTES
  }
}

fn malformed(object: &DecodedObject, reason: String) -> EstimateError {
  EstimateError::MalformedPayload {
    context: ObjectContext::from(object),
    reason,
  }
}

// Every packed entry takes at least one byte, so a buffer cannot hold more entries than bytes.
fn check_compact(object: &DecodedObject, compact: &CompactBuffer) -> Result<(), EstimateError> {
  if compact.entries > compact.buffer.len() {
    return Err(malformed(
      object,
      format!(
        "{} entries cannot fit in a {} byte buffer",
        compact.entries,
        compact.buffer.len()
      ),
    ));
  }
  Ok(())
}
