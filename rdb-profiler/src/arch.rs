// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./arch_test.rs"]
mod tests;

use std::fmt;

//
// PointerWidth
//

/// Native pointer width of the Redis build being modeled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PointerWidth {
  Bits32,
  #[default]
  Bits64,
}

impl PointerWidth {
  #[must_use]
  pub const fn bytes(self) -> u64 {
    match self {
      Self::Bits32 => 4,
      Self::Bits64 => 8,
    }
  }

  #[must_use]
  pub const fn bits(self) -> u32 {
    match self {
      Self::Bits32 => 32,
      Self::Bits64 => 64,
    }
  }
}

impl TryFrom<u32> for PointerWidth {
  type Error = String;

  fn try_from(bits: u32) -> Result<Self, Self::Error> {
    match bits {
      32 => Ok(Self::Bits32),
      64 => Ok(Self::Bits64),
      other => Err(format!("unsupported pointer width {other}, expected 32 or 64")),
    }
  }
}

impl From<PointerWidth> for u32 {
  fn from(width: PointerWidth) -> Self {
    width.bits()
  }
}

impl fmt::Display for PointerWidth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-bit", self.bits())
  }
}

//
// ArchitectureProfile
//

/// Word sizes every overhead formula is parameterized by. Redis targets LP64 and ILP32, so a C
/// `long` always has the width of a pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchitectureProfile {
  width: PointerWidth,
}

impl ArchitectureProfile {
  #[must_use]
  pub const fn new(width: PointerWidth) -> Self {
    Self { width }
  }

  #[must_use]
  pub const fn width(&self) -> PointerWidth {
    self.width
  }

  #[must_use]
  pub const fn pointer_size(&self) -> u64 {
    self.width.bytes()
  }

  #[must_use]
  pub const fn long_size(&self) -> u64 {
    self.width.bytes()
  }

  // Cost of `count` pointer sized slots.
  #[must_use]
  pub const fn pointers(&self, count: u64) -> u64 {
    count.saturating_mul(self.pointer_size())
  }
}
