// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

/// Global initialization for a test binary. Call it from a `#[ctor::ctor]` function so it runs
/// once before any test.
pub fn test_global_init() {
  rdb_log::ProfilerLogger::initialize("debug");
}
