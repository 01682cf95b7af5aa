//! Assertions over converter output.

use crate::record::Record;
use crate::shard::{ShardInfo, ShardLimits};
use std::collections::HashMap;

/// Assert that shards respect their limits.
///
/// Every shard must be non-empty, and a shard may exceed the byte budget only
/// when it holds a single record.
///
/// # Panics
///
/// Panics naming the first shard that breaks a rule.
pub fn assert_shards_within_limits(shards: &[ShardInfo], limits: ShardLimits) {
    for shard in shards {
        assert!(
            shard.records > 0,
            "shard {} ({}) is empty",
            shard.index,
            shard.path.display()
        );
        assert!(
            shard.bytes <= limits.max_bytes || shard.records == 1,
            "shard {} holds {} records in {} bytes, over the budget of {}",
            shard.index,
            shard.records,
            shard.bytes,
            limits.max_bytes
        );
        if let Some(cap) = limits.max_records {
            assert!(
                shard.records <= cap,
                "shard {} holds {} records, over the cap of {cap}",
                shard.index,
                shard.records
            );
        }
    }
    for (i, shard) in shards.iter().enumerate() {
        assert_eq!(shard.index, i, "shard indices are not sequential");
    }
}

/// Assert two record lists hold the same records, ignoring order.
///
/// Records are matched by key, then compared field by field.
///
/// # Panics
///
/// Panics on a missing, extra, or differing record.
pub fn assert_same_records(actual: &[Record], expected: &[Record]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "record count mismatch: expected {}, got {}",
        expected.len(),
        actual.len()
    );
    let by_key: HashMap<&str, &Record> = actual.iter().map(|r| (r.key.as_str(), r)).collect();
    assert_eq!(by_key.len(), actual.len(), "duplicate keys in actual records");
    for want in expected {
        let got = by_key
            .get(want.key.as_str())
            .unwrap_or_else(|| panic!("record {:?} missing", want.key));
        assert_eq!(got.label, want.label, "label mismatch for {:?}", want.key);
        assert_eq!(
            got.extension, want.extension,
            "extension mismatch for {:?}",
            want.key
        );
        assert!(
            got.payload == want.payload,
            "payload mismatch for {:?} ({} vs {} bytes)",
            want.key,
            got.payload.len(),
            want.payload.len()
        );
    }
}
