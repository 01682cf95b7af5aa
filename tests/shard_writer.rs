//! Shard rotation, ordering and limit properties of `ShardWriter`.

use anyhow::Result;
use rand::{Rng, SeedableRng, rngs::StdRng};
use shardpack::io::archive::RecordEncoder;
use shardpack::testing::*;
use shardpack::{Record, ShardInfo, ShardLimits, ShardPattern, ShardWriter};
use tempfile::TempDir;

fn record(i: usize, size: usize) -> Record {
    Record {
        key: format!("rec_{i:05}"),
        payload: fake_jpeg(size, i as u32),
        label: (i % 7) as u32,
        extension: "jpg".to_string(),
    }
}

fn encoded_len(r: &Record) -> Result<u64> {
    Ok(RecordEncoder::with_mtime(0).encode(r)?.len() as u64)
}

fn write_all(
    dir: &TempDir,
    records: &[Record],
    limits: ShardLimits,
) -> Result<(ShardPattern, Vec<ShardInfo>)> {
    let pattern = ShardPattern::new(dir.path(), "shard", "train", "tar");
    let mut writer = ShardWriter::new(pattern.clone(), limits);
    for r in records {
        writer.write(r)?;
    }
    Ok((pattern, writer.finish()?))
}

#[test]
fn four_records_of_thirty_percent_fill_two_shards() -> Result<()> {
    // 300 KiB records against a 1 MB budget: three fit, the fourth rotates.
    let dir = TempDir::new()?;
    let records: Vec<Record> = (0..4).map(|i| record(i, 300 * 1024)).collect();
    let (_, shards) = write_all(&dir, &records, ShardLimits::bytes(1_000_000))?;

    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0].records, 3);
    assert_eq!(shards[1].records, 1);
    assert!(shards[0].bytes <= 1_000_000);
    Ok(())
}

#[test]
fn record_twice_the_budget_is_written_alone() -> Result<()> {
    let dir = TempDir::new()?;
    let records = vec![record(0, 2_000_000)];
    let (pattern, shards) = write_all(&dir, &records, ShardLimits::bytes(1_000_000))?;

    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].records, 1);
    assert!(shards[0].bytes > 1_000_000);
    assert_eq!(read_shard(pattern.path(0))?, records);
    Ok(())
}

#[test]
fn no_records_means_no_files() -> Result<()> {
    let dir = TempDir::new()?;
    let (pattern, shards) = write_all(&dir, &[], ShardLimits::bytes(1_000))?;
    assert!(shards.is_empty());
    assert!(!pattern.path(0).exists());
    Ok(())
}

#[test]
fn close_is_idempotent_and_keeps_output_readable() -> Result<()> {
    let dir = TempDir::new()?;
    let pattern = ShardPattern::new(dir.path(), "shard", "val", "tar");
    let mut writer = ShardWriter::new(pattern.clone(), ShardLimits::bytes(1 << 20));
    writer.write(&record(1, 100))?;
    assert!(writer.is_open());
    writer.close()?;
    writer.close()?;
    assert!(!writer.is_open());
    assert_eq!(writer.shards().len(), 1);
    drop(writer);

    assert_eq!(read_shard(pattern.path(0))?, vec![record(1, 100)]);
    Ok(())
}

#[test]
fn shard_files_are_valid_tar_with_expected_members() -> Result<()> {
    let dir = TempDir::new()?;
    let records = vec![record(3, 10)];
    let (pattern, _) = write_all(&dir, &records, ShardLimits::default())?;

    let mut archive = tar::Archive::new(std::fs::File::open(pattern.path(0))?);
    let names: Vec<String> = archive
        .entries()?
        .map(|e| Ok(e?.path()?.to_string_lossy().into_owned()))
        .collect::<Result<_>>()?;
    assert_eq!(names, vec!["rec_00003.jpg", "rec_00003.cls"]);
    Ok(())
}

#[test]
fn long_keys_survive_the_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let mut r = record(0, 64);
    r.key = "k".repeat(180);
    let (pattern, _) = write_all(&dir, std::slice::from_ref(&r), ShardLimits::default())?;
    assert_eq!(read_shard(pattern.path(0))?, vec![r]);
    Ok(())
}

/// Randomised record streams must come back complete and in order, and every
/// rotation must have been forced by the budget.
#[test]
fn property_rotation_is_greedy_and_lossless() -> Result<()> {
    const SEEDS: u64 = 24;

    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(0x5AAD_0000 ^ seed);
        let n = rng.gen_range(0..40);
        let max_bytes = rng.gen_range(1..20_000u64);
        let records: Vec<Record> = (0..n)
            .map(|i| record(i, rng.gen_range(0..8_000)))
            .collect();
        let sizes: Vec<u64> = records.iter().map(encoded_len).collect::<Result<_>>()?;

        let dir = TempDir::new()?;
        let limits = ShardLimits::bytes(max_bytes);
        let (pattern, shards) = write_all(&dir, &records, limits)?;

        assert_shards_within_limits(&shards, limits);
        assert_eq!(
            shards.iter().map(|s| s.bytes).sum::<u64>(),
            sizes.iter().sum::<u64>(),
            "seed {seed}: byte accounting"
        );

        // Each closed shard plus the first record of its successor overflows.
        let mut first = 0usize;
        for pair in shards.windows(2) {
            first += pair[0].records as usize;
            assert!(
                pair[0].bytes + sizes[first] > max_bytes,
                "seed {seed}: shard {} rotated early",
                pair[0].index
            );
        }

        let back = read_split(&pattern)?;
        assert_eq!(back.len(), shards.len(), "seed {seed}: shard count");
        assert_eq!(back.concat(), records, "seed {seed}: records lost or reordered");
    }
    Ok(())
}

#[test]
fn property_record_cap_bounds_every_shard() -> Result<()> {
    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let cap = rng.gen_range(1..6u64);
        let n = rng.gen_range(1..30usize);
        let records: Vec<Record> = (0..n).map(|i| record(i, 16)).collect();

        let dir = TempDir::new()?;
        let limits = ShardLimits {
            max_bytes: u64::MAX,
            max_records: Some(cap),
        };
        let (_, shards) = write_all(&dir, &records, limits)?;

        assert_shards_within_limits(&shards, limits);
        assert_eq!(shards.len() as u64, (n as u64).div_ceil(cap), "seed {seed}");
    }
    Ok(())
}
