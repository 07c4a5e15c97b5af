// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

//! Decoded snapshot objects as handed over by an RDB decoder.

use bytes::Bytes;
use std::fmt;
use time::OffsetDateTime;

//
// ObjectType
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
  String,
  List,
  Hash,
  Set,
  #[serde(rename = "zset")]
  SortedSet,
  Stream,
}

impl ObjectType {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::String => "string",
      Self::List => "list",
      Self::Hash => "hash",
      Self::Set => "set",
      Self::SortedSet => "zset",
      Self::Stream => "stream",
    }
  }
}

impl fmt::Display for ObjectType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

//
// Encoding
//

/// Encoding tag recorded for an object. Which tags are valid depends on the object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
  Raw,
  Int,
  EmbStr,
  LinkedList,
  ZipList,
  ListPack,
  QuickList,
  HashTable,
  ZipMap,
  IntSet,
  SkipList,
  Stream,
}

impl Encoding {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Raw => "raw",
      Self::Int => "int",
      Self::EmbStr => "embstr",
      Self::LinkedList => "linkedlist",
      Self::ZipList => "ziplist",
      Self::ListPack => "listpack",
      Self::QuickList => "quicklist",
      Self::HashTable => "hashtable",
      Self::ZipMap => "zipmap",
      Self::IntSet => "intset",
      Self::SkipList => "skiplist",
      Self::Stream => "stream",
    }
  }
}

impl fmt::Display for Encoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

//
// CompactBuffer
//

/// A packed, pointer free buffer (ziplist, listpack, intset, zipmap, or a plain string value).
/// The buffer length is authoritative for sizing. `entries` is the element count reported by the
/// decoder, since it cannot be derived without parsing the buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub struct CompactBuffer {
  pub buffer: Bytes,
  #[serde(default)]
  pub entries: usize,
}

impl CompactBuffer {
  #[must_use]
  pub fn new(buffer: impl Into<Bytes>, entries: usize) -> Self {
    Self {
      buffer: buffer.into(),
      entries,
    }
  }

  #[must_use]
  pub fn len(&self) -> u64 {
    self.buffer.len() as u64
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct HashEntry {
  pub field: Bytes,
  pub value: Bytes,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct ScoredMember {
  pub member: Bytes,
  pub score: f64,
}

//
// Payload
//

/// Type specific content of a decoded object. Compact encodings carry their raw buffer, pointer
/// based encodings carry the decoded elements.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
  Compact(CompactBuffer),
  // Ordered compact buffers: quicklist nodes or stream listpacks.
  Segments { segments: Vec<CompactBuffer> },
  ListElements { elements: Vec<Bytes> },
  HashEntries { entries: Vec<HashEntry> },
  SetMembers { members: Vec<Bytes> },
  SortedSetEntries { entries: Vec<ScoredMember> },
}

impl Payload {
  #[must_use]
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::Compact(_) => "compact",
      Self::Segments { .. } => "segments",
      Self::ListElements { .. } => "list_elements",
      Self::HashEntries { .. } => "hash_entries",
      Self::SetMembers { .. } => "set_members",
      Self::SortedSetEntries { .. } => "sorted_set_entries",
    }
  }
}

//
// DecodedObject
//

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct DecodedObject {
  pub db_index: u32,
  pub key: Bytes,
  #[serde(rename = "type")]
  pub object_type: ObjectType,
  pub encoding: Encoding,
  #[serde(default, with = "time::serde::rfc3339::option")]
  pub expiration: Option<OffsetDateTime>,
  pub payload: Payload,
}

impl DecodedObject {
  #[must_use]
  pub fn key_lossy(&self) -> String {
    String::from_utf8_lossy(&self.key).into_owned()
  }
}
