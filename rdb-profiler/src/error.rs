// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::object::{DecodedObject, Encoding, ObjectType};
use std::fmt;

//
// ObjectContext
//

/// Identifies the object an error refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectContext {
  pub db_index: u32,
  pub key: String,
  pub object_type: ObjectType,
  pub encoding: Encoding,
}

impl From<&DecodedObject> for ObjectContext {
  fn from(object: &DecodedObject) -> Self {
    Self {
      db_index: object.db_index,
      key: object.key_lossy(),
      object_type: object.object_type,
      encoding: object.encoding,
    }
  }
}

impl fmt::Display for ObjectContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "db={} key={:?} type={} encoding={}",
      self.db_index, self.key, self.object_type, self.encoding
    )
  }
}

//
// EstimateError
//

/// Failure to size a single object. Other objects in the same run are unaffected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
  // The (type, encoding) pair has no sizing formula.
  #[error("unsupported encoding: {0}")]
  UnsupportedEncoding(ObjectContext),
  // The payload contradicts the object's type or encoding.
  #[error("malformed payload: {context}: {reason}")]
  MalformedPayload {
    context: ObjectContext,
    reason: String,
  },
}

impl EstimateError {
  #[must_use]
  pub const fn context(&self) -> &ObjectContext {
    match self {
      Self::UnsupportedEncoding(context) | Self::MalformedPayload { context, .. } => context,
    }
  }
}

//
// RunError
//

/// Failure that ends a profiling run.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
  #[error("upstream decode failure: {0}")]
  Decode(#[source] anyhow::Error),
  #[error(transparent)]
  Estimate(#[from] EstimateError),
  #[error("report sink failure: {0}")]
  Sink(#[source] anyhow::Error),
  #[error("estimation worker failed: {0}")]
  Worker(String),
}
