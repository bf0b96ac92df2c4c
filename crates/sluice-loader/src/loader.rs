use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::Result;
use tracing::warn;

use sluice_core::types::{FeatureLayout, ShardPartition};
use sluice_observe::metrics::{Counter, DurationAgg, Gauge};

use crate::dataset::DataSet;
use crate::shard::{enumerate_shard_files, read_shard_file};

/// A map entry of `None` marks a shard whose load failed; the consumer sees
/// it as a missing shard, never as an error.
type ShardMap = Mutex<HashMap<usize, Option<Arc<DataSet>>>>;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub dir: PathBuf,
    pub extension: String,
    pub layout: FeatureLayout,
    pub preload_window: usize,
    pub partition: ShardPartition,
    /// Size of the dedicated load pool.
    pub worker_threads: usize,
}

#[derive(Debug, Default)]
pub struct LoaderMetrics {
    pub shards_loaded_total: Counter,
    pub shard_load_failures_total: Counter,
    pub shards_evicted_total: Counter,
    pub loads_inflight: Gauge,
    pub resident_shards: Gauge,
    pub resident_shards_high_water: Gauge,
    pub load_duration: DurationAgg,
}

/// Sliding-window shard prefetcher.
///
/// Keeps up to `preload_window` shards resident ahead of the consumption
/// cursor, loading and evicting on a small dedicated pool. The consumer-facing
/// API is synchronous and never blocks on I/O: `advance_to_next` enqueues one
/// load-then-evict unit of work and returns whatever is resident for the new
/// active index right now. The design assumes the window is large enough,
/// relative to load latency and consumption rate, that the active shard is
/// ready when asked for; that is not enforced by blocking.
///
/// Dropping the loader shuts the pool down; shard map entries are `Arc`-owned,
/// so in-flight handles stay valid through teardown.
pub struct ShardLoader {
    shard_paths: Vec<PathBuf>,
    layout: Arc<FeatureLayout>,
    preload_window: usize,
    active_index: usize,
    shards: Arc<ShardMap>,
    metrics: Arc<LoaderMetrics>,
    runtime: tokio::runtime::Runtime,
}

impl ShardLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        anyhow::ensure!(config.preload_window > 0, "preload_window must be > 0");
        anyhow::ensure!(config.worker_threads > 0, "worker_threads must be > 0");
        config.partition.validate()?;

        let all_files = enumerate_shard_files(&config.dir, &config.extension)?;
        anyhow::ensure!(
            !all_files.is_empty(),
            "no .{} shard files under {}",
            config.extension,
            config.dir.display()
        );

        let shard_paths = config.partition.apply(all_files)?;
        anyhow::ensure!(
            !shard_paths.is_empty(),
            "rank {} of {} selected zero shards",
            config.partition.world_rank,
            config.partition.world_size
        );

        let mut preload_window = config.preload_window;
        if preload_window > shard_paths.len() {
            warn!(
                target: "sluice_proof",
                event = "preload_window_clamped",
                preload_window,
                shard_count = shard_paths.len(),
                world_rank = config.partition.world_rank,
                world_size = config.partition.world_size,
                "preload window exceeds shard count; clamping"
            );
            preload_window = shard_paths.len();
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name("sluice-loader")
            .build()?;

        Ok(Self {
            shard_paths,
            layout: Arc::new(config.layout),
            preload_window,
            active_index: 0,
            shards: Arc::new(Mutex::new(HashMap::new())),
            metrics: Arc::new(LoaderMetrics::default()),
            runtime,
        })
    }

    pub fn metrics(&self) -> Arc<LoaderMetrics> {
        self.metrics.clone()
    }

    pub fn num_shards(&self) -> usize {
        self.shard_paths.len()
    }

    pub fn shard_paths(&self) -> &[PathBuf] {
        &self.shard_paths
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn preload_window(&self) -> usize {
        self.preload_window
    }

    /// Schedules loads for the first `preload_window` shards. Returns
    /// immediately; poll `metrics()` or just start consuming.
    pub fn initial_preload(&self) {
        for index in 0..self.preload_window.min(self.shard_paths.len()) {
            self.schedule_load(index, None);
        }
    }

    /// The shard at the current cursor, if its load has landed.
    pub fn current(&self) -> Option<Arc<DataSet>> {
        lock_shards(&self.shards)
            .get(&self.active_index)
            .cloned()
            .flatten()
    }

    /// Advances the cursor by one (the shard list repeats indefinitely),
    /// schedules one load-then-evict unit of work for the far edge of the
    /// window, and returns the new active shard if it is already resident.
    pub fn advance_to_next(&mut self) -> Option<Arc<DataSet>> {
        let index_to_evict = self.active_index;
        self.active_index = (self.active_index + 1) % self.shard_paths.len();
        let index_to_load =
            (self.active_index + self.preload_window - 1) % self.shard_paths.len();

        self.schedule_load(index_to_load, Some(index_to_evict));

        self.current()
    }

    /// Resident shard indices (including failed-load markers), ascending.
    pub fn resident_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = lock_shards(&self.shards).keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    fn schedule_load(&self, index_to_load: usize, index_to_evict: Option<usize>) {
        let path = self.shard_paths[index_to_load].clone();
        let layout = self.layout.clone();
        let shards = self.shards.clone();
        let metrics = self.metrics.clone();

        metrics.loads_inflight.add(1);
        self.runtime.spawn(async move {
            let start = Instant::now();
            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || read_shard_file(&path, &layout)
            })
            .await;
            metrics.load_duration.record(start.elapsed());

            let entry = match loaded {
                Ok(Ok(data_set)) => {
                    metrics.shards_loaded_total.inc();
                    tracing::debug!(
                        target: "sluice_proof",
                        event = "shard_loaded",
                        shard_index = index_to_load,
                        path = %path.display(),
                        samples = data_set.len(),
                        "shard loaded"
                    );
                    Some(Arc::new(data_set))
                }
                Ok(Err(err)) => {
                    metrics.shard_load_failures_total.inc();
                    warn!(
                        target: "sluice_proof",
                        event = "shard_load_failed",
                        shard_index = index_to_load,
                        path = %path.display(),
                        error = %format!("{err:#}"),
                        "shard load failed; marking unavailable"
                    );
                    None
                }
                Err(join_err) => {
                    metrics.shard_load_failures_total.inc();
                    warn!(
                        target: "sluice_proof",
                        event = "shard_load_failed",
                        shard_index = index_to_load,
                        path = %path.display(),
                        error = %join_err,
                        "shard load task died; marking unavailable"
                    );
                    None
                }
            };

            {
                let mut map = lock_shards(&shards);
                map.insert(index_to_load, entry);
                // Evict only after the replacement load has landed, so the
                // window never dips below target at the handoff point.
                if let Some(evict) = index_to_evict {
                    if map.remove(&evict).is_some() {
                        metrics.shards_evicted_total.inc();
                    }
                }
                let resident = map.len() as u64;
                metrics.resident_shards.set(resident);
                metrics.resident_shards_high_water.max(resident);
            }
            metrics.loads_inflight.sub(1);
        });
    }
}

fn lock_shards(shards: &ShardMap) -> std::sync::MutexGuard<'_, HashMap<usize, Option<Arc<DataSet>>>> {
    shards.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for ShardLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardLoader")
            .field("shards", &self.shard_paths.len())
            .field("active_index", &self.active_index)
            .field("preload_window", &self.preload_window)
            .finish()
    }
}
