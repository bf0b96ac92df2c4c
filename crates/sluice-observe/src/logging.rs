use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `SLUICE_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract for sluice tools and loaders:
/// - Always include `shard_index` and `path` on shard load/evict events.
/// - Include `world_rank`/`world_size` on any partitioning-related event.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("SLUICE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
