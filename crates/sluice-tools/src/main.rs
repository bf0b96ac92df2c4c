#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prost::Message;
use tracing::{info, warn};

use sluice_core::types::{FeatureLayout, ShardPartition};
use sluice_loader::loader::{LoaderConfig, LoaderMetrics, ShardLoader};
use sluice_loader::shard::{enumerate_shard_files, read_shard_file, write_shard_file};
use sluice_proto::v0::{summary_value, TensorRecord, DATA_TYPE_FLOAT, DATA_TYPE_INT64};
use sluice_summary::ops::{histogram_summary, scalar_summary};

#[derive(Debug, Parser)]
#[command(name = "sluice-tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a directory of synthetic shard files for experiments.
    Seed {
        #[arg(long, env = "SLUICE_OUT_DIR")]
        out_dir: PathBuf,

        #[arg(long, env = "SLUICE_SHARDS", default_value_t = 4)]
        shards: usize,

        #[arg(long, env = "SLUICE_SAMPLES_PER_SHARD", default_value_t = 64)]
        samples_per_shard: usize,

        #[arg(long, env = "SLUICE_VALUES_PER_SAMPLE", default_value_t = 16)]
        values_per_sample: usize,

        #[arg(long, env = "SLUICE_EXTENSION", default_value = "pb")]
        extension: String,
    },

    /// Aggregate one feature across every shard into a serialized summary.
    Summarize {
        #[arg(long, env = "SLUICE_DIR")]
        dir: PathBuf,

        #[arg(long, env = "SLUICE_EXTENSION", default_value = "pb")]
        extension: String,

        /// Record name of the feature to aggregate.
        #[arg(long, env = "SLUICE_FEATURE", default_value = "input_0")]
        feature: String,

        #[arg(long, env = "SLUICE_TAG", default_value = "values")]
        tag: String,

        /// Where to write the serialized summary; stats are logged either way.
        #[arg(long, env = "SLUICE_OUT")]
        out: Option<PathBuf>,
    },

    /// Drive a shard loader the way a training loop would and report metrics.
    Stream {
        #[arg(long, env = "SLUICE_DIR")]
        dir: PathBuf,

        #[arg(long, env = "SLUICE_EXTENSION", default_value = "pb")]
        extension: String,

        /// `record_name=input_name` pairs defining the feature layout.
        #[arg(long = "feature", value_parser = parse_feature_pair, default_value = "input_0=input_0")]
        features: Vec<(String, String)>,

        #[arg(long, env = "SLUICE_PRELOAD_WINDOW", default_value_t = 3)]
        preload_window: usize,

        #[arg(long, env = "SLUICE_WORKER_THREADS", default_value_t = 2)]
        worker_threads: usize,

        #[arg(long, env = "SLUICE_WORLD_RANK", default_value_t = 0)]
        world_rank: usize,

        #[arg(long, env = "SLUICE_WORLD_SIZE", default_value_t = 1)]
        world_size: usize,

        #[arg(long, env = "SLUICE_STEPS", default_value_t = 32)]
        steps: usize,

        /// Simulated per-step consumption time.
        #[arg(long, env = "SLUICE_STEP_MS", default_value_t = 10)]
        step_ms: u64,
    },
}

fn parse_feature_pair(raw: &str) -> Result<(String, String), String> {
    let Some((record_name, input_name)) = raw.split_once('=') else {
        return Err(format!("expected record_name=input_name, got {raw:?}"));
    };
    if record_name.trim().is_empty() || input_name.trim().is_empty() {
        return Err(format!("expected record_name=input_name, got {raw:?}"));
    }
    Ok((record_name.to_string(), input_name.to_string()))
}

fn main() -> Result<()> {
    sluice_observe::logging::init_tracing();
    let args = Args::parse();

    match args.command {
        Command::Seed {
            out_dir,
            shards,
            samples_per_shard,
            values_per_sample,
            extension,
        } => seed(out_dir, shards, samples_per_shard, values_per_sample, &extension),
        Command::Summarize {
            dir,
            extension,
            feature,
            tag,
            out,
        } => summarize(&dir, &extension, &feature, &tag, out),
        Command::Stream {
            dir,
            extension,
            features,
            preload_window,
            worker_threads,
            world_rank,
            world_size,
            steps,
            step_ms,
        } => stream(
            dir,
            extension,
            features,
            preload_window,
            worker_threads,
            ShardPartition {
                world_rank,
                world_size,
            },
            steps,
            step_ms,
        ),
    }
}

fn seed(
    out_dir: PathBuf,
    shards: usize,
    samples_per_shard: usize,
    values_per_sample: usize,
    extension: &str,
) -> Result<()> {
    anyhow::ensure!(shards > 0, "shards must be > 0");
    anyhow::ensure!(samples_per_shard > 0, "samples_per_shard must be > 0");
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create_dir_all failed: {}", out_dir.display()))?;

    for shard_index in 0..shards {
        let samples: Vec<Vec<TensorRecord>> = (0..samples_per_shard)
            .map(|sample_index| {
                let values: Vec<f32> = (0..values_per_sample)
                    .map(|k| {
                        let phase = (shard_index * 31 + sample_index * 7 + k) as f32;
                        (phase * 0.01).sin()
                    })
                    .collect();
                vec![
                    TensorRecord {
                        dims: vec![values.len() as i64],
                        data_type: DATA_TYPE_FLOAT,
                        float_data: values,
                        int64_data: vec![],
                        name: "input_0".to_string(),
                        raw_data: vec![],
                    },
                    TensorRecord {
                        dims: vec![1],
                        data_type: DATA_TYPE_INT64,
                        float_data: vec![],
                        int64_data: vec![(sample_index % 10) as i64],
                        name: "label".to_string(),
                        raw_data: vec![],
                    },
                ]
            })
            .collect();

        let path = out_dir.join(format!("shard-{shard_index:05}.{extension}"));
        write_shard_file(&path, &samples)?;
        info!(
            target: "sluice_proof",
            event = "shard_seeded",
            path = %path.display(),
            samples = samples_per_shard,
            "seeded shard"
        );
    }

    info!(
        shards,
        samples_per_shard,
        out_dir = %out_dir.display(),
        "seed complete"
    );
    Ok(())
}

fn summarize(
    dir: &Path,
    extension: &str,
    feature: &str,
    tag: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let layout = FeatureLayout::from_pairs([(feature, feature)])?;
    let files = enumerate_shard_files(dir, extension)?;
    anyhow::ensure!(
        !files.is_empty(),
        "no .{extension} shard files under {}",
        dir.display()
    );

    let mut values: Vec<f64> = Vec::new();
    let mut samples: u64 = 0;
    for path in &files {
        let data_set = read_shard_file(path, &layout)?;
        samples = samples.saturating_add(data_set.len() as u64);
        for sample in data_set.samples() {
            if let Some(tensor) = sample.feature(0) {
                values.extend(tensor_f64_values(tensor));
            }
        }
    }

    let mut summary = histogram_summary(tag, &values)
        .with_context(|| format!("feature {feature:?} produced unusable values"))?;
    let counts = scalar_summary(
        &[format!("{tag}/sample_count")],
        &[samples as f64],
    )?;
    summary.value.extend(counts.value);

    if let Some(summary_value::Payload::Histo(record)) = &summary.value[0].payload {
        info!(
            shards = files.len(),
            samples,
            values = record.num,
            min = record.min,
            max = record.max,
            exported_buckets = record.bucket.len(),
            "summary built"
        );
    }

    if let Some(out) = out {
        let bytes = summary.encode_to_vec();
        std::fs::write(&out, &bytes)
            .with_context(|| format!("write failed: {}", out.display()))?;
        info!(out = %out.display(), bytes = bytes.len(), "summary written");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn stream(
    dir: PathBuf,
    extension: String,
    features: Vec<(String, String)>,
    preload_window: usize,
    worker_threads: usize,
    partition: ShardPartition,
    steps: usize,
    step_ms: u64,
) -> Result<()> {
    let layout = FeatureLayout::from_pairs(features)?;
    let mut loader = ShardLoader::new(LoaderConfig {
        dir,
        extension,
        layout,
        preload_window,
        partition,
        worker_threads,
    })?;
    let metrics = loader.metrics();

    loader.initial_preload();

    let mut delivered_samples: u64 = 0;
    let mut missing_steps: u64 = 0;
    for step in 0..steps {
        if step_ms != 0 {
            std::thread::sleep(Duration::from_millis(step_ms));
        }

        match loader.advance_to_next() {
            Some(data_set) => {
                delivered_samples = delivered_samples.saturating_add(data_set.len() as u64);
                info!(
                    target: "sluice_proof",
                    event = "step",
                    step,
                    shard_index = loader.active_index(),
                    samples = data_set.len(),
                    "step consumed shard"
                );
            }
            None => {
                missing_steps = missing_steps.saturating_add(1);
                warn!(
                    target: "sluice_proof",
                    event = "step_missed",
                    step,
                    shard_index = loader.active_index(),
                    "active shard not resident yet"
                );
            }
        }
    }

    emit_loader_metrics_snapshot(&metrics, delivered_samples, missing_steps);
    Ok(())
}

fn emit_loader_metrics_snapshot(
    metrics: &LoaderMetrics,
    delivered_samples: u64,
    missing_steps: u64,
) {
    let load_duration = metrics.load_duration.snapshot();
    info!(
        target: "sluice_metrics",
        shards_loaded_total = metrics.shards_loaded_total.get(),
        shard_load_failures_total = metrics.shard_load_failures_total.get(),
        shards_evicted_total = metrics.shards_evicted_total.get(),
        loads_inflight = metrics.loads_inflight.get(),
        resident_shards = metrics.resident_shards.get(),
        resident_shards_high_water = metrics.resident_shards_high_water.get(),
        load_avg_ns = load_duration.avg_ns(),
        load_max_ns = load_duration.max_ns,
        delivered_samples,
        missing_steps,
        "metrics"
    );
}

fn tensor_f64_values(tensor: &TensorRecord) -> Vec<f64> {
    if tensor.data_type == DATA_TYPE_FLOAT {
        if !tensor.float_data.is_empty() {
            return tensor.float_data.iter().map(|&v| f64::from(v)).collect();
        }
        return tensor
            .raw_data
            .chunks_exact(4)
            .map(|chunk| {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(chunk);
                f64::from(f32::from_le_bytes(bytes))
            })
            .collect();
    }
    if tensor.data_type == DATA_TYPE_INT64 && !tensor.int64_data.is_empty() {
        return tensor.int64_data.iter().map(|&v| v as f64).collect();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_pair_parses() {
        assert_eq!(
            parse_feature_pair("a=b").unwrap(),
            ("a".to_string(), "b".to_string())
        );
        assert!(parse_feature_pair("a").is_err());
        assert!(parse_feature_pair("=b").is_err());
    }

    #[test]
    fn raw_float_bytes_are_decoded() {
        let tensor = TensorRecord {
            dims: vec![2],
            data_type: DATA_TYPE_FLOAT,
            float_data: vec![],
            int64_data: vec![],
            name: "input_0".to_string(),
            raw_data: 1.5f32
                .to_le_bytes()
                .iter()
                .chain(2.5f32.to_le_bytes().iter())
                .copied()
                .collect(),
        };
        assert_eq!(tensor_f64_values(&tensor), vec![1.5, 2.5]);
    }
}
