// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::{Estimate, Estimator};
use crate::arch::{ArchitectureProfile, PointerWidth};
use crate::compact::CompactHeaders;
use crate::error::EstimateError;
use crate::hash_table::DEFAULT_LOAD_FACTOR;
use crate::object::{CompactBuffer, DecodedObject, Encoding, ObjectType, Payload};
use crate::skip_list::{FixedLevels, RandomLevels};
use crate::test::{
  bytes_of_len,
  compact,
  hash_table,
  linked_list,
  object,
  quicklist,
  set_table,
  skip_list,
  string,
};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn estimator(width: PointerWidth) -> Estimator {
  Estimator::new(
    ArchitectureProfile::new(width),
    DEFAULT_LOAD_FACTOR,
    CompactHeaders::default(),
  )
  .unwrap()
}

fn estimate(object: &DecodedObject) -> Result<Estimate, EstimateError> {
  estimator(PointerWidth::Bits64).estimate(object, &mut FixedLevels::default())
}

#[test]
fn string_counts_bytes() {
  assert_eq!(
    estimate(&string("hello")).unwrap(),
    Estimate {
      size: 5,
      element_count: 5,
    }
  );
  assert_eq!(
    estimate(&string("")).unwrap(),
    Estimate {
      size: 0,
      element_count: 0,
    }
  );
}

#[rstest]
#[case(ObjectType::String, Encoding::Int)]
#[case(ObjectType::String, Encoding::EmbStr)]
#[case(ObjectType::List, Encoding::ZipList)]
#[case(ObjectType::List, Encoding::ListPack)]
#[case(ObjectType::Hash, Encoding::ZipMap)]
#[case(ObjectType::Hash, Encoding::ZipList)]
#[case(ObjectType::Hash, Encoding::ListPack)]
#[case(ObjectType::Set, Encoding::IntSet)]
#[case(ObjectType::Set, Encoding::ListPack)]
#[case(ObjectType::SortedSet, Encoding::ZipList)]
#[case(ObjectType::SortedSet, Encoding::ListPack)]
fn compact_size_is_buffer_length_plus_header(
  #[case] object_type: ObjectType,
  #[case] encoding: Encoding,
) {
  for header in [0, 16] {
    let estimator = Estimator::new(
      ArchitectureProfile::default(),
      DEFAULT_LOAD_FACTOR,
      CompactHeaders::uniform(header),
    )
    .unwrap();
    let estimate = estimator
      .estimate(
        &compact(object_type, encoding, 77, 7),
        &mut FixedLevels::default(),
      )
      .unwrap();
    assert_eq!(estimate.size, 77 + header);

    let expected_count = if object_type == ObjectType::String {
      77
    } else {
      7
    };
    assert_eq!(estimate.element_count, expected_count);
  }
}

#[test]
fn empty_compact_hash_is_header_only() {
  let estimator = Estimator::new(
    ArchitectureProfile::default(),
    DEFAULT_LOAD_FACTOR,
    CompactHeaders::uniform(16),
  )
  .unwrap();
  let estimate = estimator
    .estimate(
      &compact(ObjectType::Hash, Encoding::ZipList, 0, 0),
      &mut FixedLevels::default(),
    )
    .unwrap();
  assert_eq!(
    estimate,
    Estimate {
      size: 16,
      element_count: 0,
    }
  );
}

#[test]
fn linked_list_nodes() {
  // header 5 pointers + length, 3 pointers per node.
  assert_eq!(
    estimate(&linked_list(&[3, 5])).unwrap(),
    Estimate {
      size: 48 + (24 + 3) + (24 + 5),
      element_count: 2,
    }
  );
  assert_eq!(estimate(&linked_list(&[])).unwrap().size, 48);
}

#[test]
fn quicklist_nodes() {
  assert_eq!(
    estimate(&quicklist(&[(100, 10), (50, 4)])).unwrap(),
    Estimate {
      size: 32 + (48 + 100) + (48 + 50),
      element_count: 14,
    }
  );
}

#[test]
fn hash_table_encoded_hash() {
  // dict 92 + 4 buckets, two entries of 24 plus field and value bytes.
  assert_eq!(
    estimate(&hash_table(&[(3, 5), (4, 4)])).unwrap(),
    Estimate {
      size: 124 + 2 * 24 + 8 + 8,
      element_count: 2,
    }
  );
}

#[test]
fn hash_table_encoded_set() {
  // 5 members grow the bucket array to 8.
  assert_eq!(
    estimate(&set_table(&[1, 2, 3, 4, 5])).unwrap(),
    Estimate {
      size: 92 + 8 * 8 + 5 * 24 + 15,
      element_count: 5,
    }
  );
}

#[rstest]
#[case(PointerWidth::Bits64, 401)]
#[case(PointerWidth::Bits32, 261)]
fn sorted_set_with_fixed_levels(#[case] width: PointerWidth, #[case] expected: u64) {
  let estimator = estimator(width);
  let object = skip_list(&[(5, 1.0), (7, 2.0), (9, 3.0)]);
  let estimate = estimator
    .estimate(&object, &mut FixedLevels::new([1, 1, 2]))
    .unwrap();

  let skip_list = estimator.skip_list();
  let hash_table = estimator.hash_table();
  assert_eq!(
    estimate.size,
    skip_list.header()
      + hash_table.overhead(3)
      + skip_list.entry_overhead(1)
      + skip_list.entry_overhead(1)
      + skip_list.entry_overhead(2)
      + (5 + 7 + 9)
  );
  assert_eq!(estimate.size, expected);
  assert_eq!(estimate.element_count, 3);
}

#[test]
fn sorted_set_is_deterministic_under_seed() {
  let estimator = estimator(PointerWidth::Bits64);
  let members: Vec<(usize, f64)> = (0 .. 500_u32)
    .map(|i| (i as usize % 17 + 1, f64::from(i)))
    .collect();
  let object = skip_list(&members);

  let first = estimator
    .estimate(&object, &mut RandomLevels::seeded(1234))
    .unwrap();
  let second = estimator
    .estimate(&object, &mut RandomLevels::seeded(1234))
    .unwrap();
  assert_eq!(first, second);
}

#[test]
fn stream_listpacks() {
  let object = object(
    ObjectType::Stream,
    Encoding::Stream,
    Payload::Segments {
      segments: vec![
        CompactBuffer::new(bytes_of_len(200), 20),
        CompactBuffer::new(bytes_of_len(64), 3),
      ],
    },
  );
  assert_eq!(
    estimate(&object).unwrap(),
    Estimate {
      size: 264,
      element_count: 23,
    }
  );
}

#[rstest]
#[case(ObjectType::String, Encoding::HashTable)]
#[case(ObjectType::List, Encoding::SkipList)]
#[case(ObjectType::Hash, Encoding::IntSet)]
#[case(ObjectType::Set, Encoding::ZipList)]
#[case(ObjectType::SortedSet, Encoding::HashTable)]
#[case(ObjectType::Stream, Encoding::ListPack)]
fn unsupported_encoding(#[case] object_type: ObjectType, #[case] encoding: Encoding) {
  let object = compact(object_type, encoding, 10, 1);
  let error = estimate(&object).unwrap_err();
  assert_matches!(&error, EstimateError::UnsupportedEncoding(context) => {
    assert_eq!(context.object_type, object_type);
    assert_eq!(context.encoding, encoding);
    assert_eq!(context.key, "key");
  });
}

#[test]
fn payload_must_match_encoding() {
  let object = object(
    ObjectType::Hash,
    Encoding::HashTable,
    Payload::SetMembers {
      members: vec![bytes_of_len(3)],
    },
  );
  assert_matches!(
    estimate(&object),
    Err(EstimateError::MalformedPayload { reason, .. }) if reason.contains("set_members")
  );

  let object = compact(ObjectType::SortedSet, Encoding::SkipList, 10, 1);
  assert_matches!(
    estimate(&object),
    Err(EstimateError::MalformedPayload { .. })
  );
}

#[test]
fn compact_entries_must_fit() {
  assert_matches!(
    estimate(&compact(ObjectType::Set, Encoding::IntSet, 4, 5)),
    Err(EstimateError::MalformedPayload { .. })
  );
  assert_matches!(
    estimate(&quicklist(&[(10, 2), (3, 4)])),
    Err(EstimateError::MalformedPayload { .. })
  );
}

#[test]
fn nan_score_is_malformed() {
  assert_matches!(
    estimate(&skip_list(&[(3, 1.0), (3, f64::NAN)])),
    Err(EstimateError::MalformedPayload { reason, .. }) if reason.contains("NaN")
  );
}

#[test]
fn never_below_raw_payload() {
  let objects = [
    (linked_list(&[10, 20, 30]), 60),
    (quicklist(&[(1000, 100)]), 1000),
    (hash_table(&[(10, 100), (20, 200)]), 330),
    (set_table(&[40, 40, 40]), 120),
    (skip_list(&[(50, 1.0), (60, 2.0)]), 110),
  ];
  for (object, raw) in objects {
    assert!(estimate(&object).unwrap().size >= raw);
  }
}
