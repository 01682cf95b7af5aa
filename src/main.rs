use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use shardpack::convert::{ConvertOptions, convert};
use shardpack::record::KeyScope;
use shardpack::shard::{DEFAULT_MAX_SHARD_BYTES, DEFAULT_MAX_SHARD_RECORDS, ShardLimits};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Pack per-class image folders into shuffled, size-bounded tar shards"
)]
struct Cli {
    /// Dataset root containing one directory per split, each holding one directory per class
    #[arg(long, value_name = "DIR", default_value = "/imagenet")]
    source: PathBuf,

    /// Directory where shards are written (created if missing)
    #[arg(long, value_name = "DIR", default_value = "./data")]
    shards: PathBuf,

    /// Comma-separated list of splits to convert
    #[arg(long, value_name = "LIST", default_value = "train,val", value_delimiter = ',')]
    splits: Vec<String>,

    /// File name prefix of every shard
    #[arg(long, value_name = "NAME", default_value = "shard")]
    prefix: String,

    /// Byte budget per shard (uncompressed)
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_SHARD_BYTES)]
    max_shard_bytes: u64,

    /// Maximum records per shard (0 => unlimited)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_SHARD_RECORDS)]
    max_shard_records: u64,

    /// Shard file extension; a codec suffix such as tar.gz compresses the shards
    #[arg(long, value_name = "EXT", default_value = "tar")]
    extension: String,

    /// Seed for the shuffle (omit for a fresh random order every run)
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Uniqueness domain of record keys: "run" or "split"
    #[arg(long, value_name = "SCOPE", default_value = "run")]
    key_scope: KeyScope,

    /// Write a JSON summary of the produced shards to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,
}

impl Cli {
    fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            source_root: self.source.clone(),
            output_dir: self.shards.clone(),
            prefix: self.prefix.clone(),
            splits: self.splits.iter().map(|s| s.trim().to_string()).collect(),
            limits: ShardLimits {
                max_bytes: self.max_shard_bytes,
                max_records: Some(self.max_shard_records).filter(|&n| n > 0),
            },
            extension: self.extension.clone(),
            seed: self.seed,
            key_scope: self.key_scope,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = cli.convert_options();
    let summary = convert(&options).context("dataset conversion failed")?;
    info!(
        "Completed conversion: {} split(s), {} records, {} shard(s)",
        summary.splits.len(),
        summary.total_records(),
        summary.total_shards()
    );

    if let Some(path) = cli.summary {
        summary.save_to_file(&path)?;
        info!("Wrote summary to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shardpack").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = parse(&[]);
        let options = cli.convert_options();
        assert_eq!(options, ConvertOptions::default());
        assert_eq!(options.source_root, PathBuf::from("/imagenet"));
        assert_eq!(options.output_dir, PathBuf::from("./data"));
        assert_eq!(options.splits, ["train", "val"]);
        assert_eq!(options.limits.max_records, Some(DEFAULT_MAX_SHARD_RECORDS));
        assert!(cli.summary.is_none());
    }

    #[test]
    fn splits_are_comma_separated_and_trimmed() {
        let options = parse(&["--splits", "train, val ,test"]).convert_options();
        assert_eq!(options.splits, ["train", "val", "test"]);
    }

    #[test]
    fn zero_record_cap_means_unlimited() {
        let options = parse(&["--max-shard-records", "0"]).convert_options();
        assert_eq!(options.limits.max_records, None);

        let options = parse(&["--max-shard-records", "25"]).convert_options();
        assert_eq!(options.limits.max_records, Some(25));
    }

    #[test]
    fn key_scope_is_parsed() {
        let options = parse(&["--key-scope", "split"]).convert_options();
        assert_eq!(options.key_scope, KeyScope::Split);
        assert!(Cli::try_parse_from(["shardpack", "--key-scope", "global"]).is_err());
    }

    #[test]
    fn explicit_flags_reach_the_options() {
        let cli = parse(&[
            "--source",
            "/data/in",
            "--shards",
            "/data/out",
            "--prefix",
            "imagenet",
            "--max-shard-bytes",
            "4096",
            "--extension",
            "tar.gz",
            "--seed",
            "7",
            "--summary",
            "run.json",
        ]);
        let options = cli.convert_options();
        assert_eq!(options.source_root, PathBuf::from("/data/in"));
        assert_eq!(options.output_dir, PathBuf::from("/data/out"));
        assert_eq!(options.prefix, "imagenet");
        assert_eq!(options.limits.max_bytes, 4096);
        assert_eq!(options.extension, "tar.gz");
        assert_eq!(options.seed, Some(7));
        assert_eq!(cli.summary, Some(PathBuf::from("run.json")));
        assert_eq!(
            options.pattern("val").path(3),
            PathBuf::from("/data/out/imagenet-val-000003.tar.gz")
        );
    }
}
