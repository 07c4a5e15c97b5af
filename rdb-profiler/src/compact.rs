// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./compact_test.rs"]
mod tests;

use crate::object::ObjectType;

//
// CompactHeaders
//

/// Fixed struct header charged on top of every compact buffer, per object type. All entries
/// default to zero: a packed buffer is charged exactly its serialized length unless the caller
/// opts into a header model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompactHeaders {
  pub string: u64,
  pub list: u64,
  pub hash: u64,
  pub set: u64,
  pub zset: u64,
  pub stream: u64,
}

impl CompactHeaders {
  /// The same header for every type.
  #[must_use]
  pub const fn uniform(header: u64) -> Self {
    Self {
      string: header,
      list: header,
      hash: header,
      set: header,
      zset: header,
      stream: header,
    }
  }

  #[must_use]
  pub const fn for_type(&self, object_type: ObjectType) -> u64 {
    match object_type {
      ObjectType::String => self.string,
      ObjectType::List => self.list,
      ObjectType::Hash => self.hash,
      ObjectType::Set => self.set,
      ObjectType::SortedSet => self.zset,
      ObjectType::Stream => self.stream,
    }
  }
}

//
// CompactSizer
//

#[derive(Clone, Copy, Debug, Default)]
pub struct CompactSizer {
  headers: CompactHeaders,
}

impl CompactSizer {
  #[must_use]
  pub const fn new(headers: CompactHeaders) -> Self {
    Self { headers }
  }

  #[must_use]
  pub const fn headers(&self) -> &CompactHeaders {
    &self.headers
  }

  /// Size of a packed buffer of `raw_len` bytes held by an object of the given type.
  #[must_use]
  pub const fn size(&self, object_type: ObjectType, raw_len: u64) -> u64 {
    raw_len + self.headers.for_type(object_type)
  }
}
