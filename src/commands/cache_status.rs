use anyhow::Result;
use tracing::{info, warn};

use crate::cache::LoadCache;
use crate::cli::CacheStatusArgs;

pub fn run(args: CacheStatusArgs) -> Result<()> {
    let cache = LoadCache::new(&args.cache_root);
    let entries = cache.entries()?;

    if entries.is_empty() {
        warn!(path = %cache.root().display(), "load cache is empty");
        return Ok(());
    }

    for entry in &entries {
        info!(
            fingerprint = %entry.fingerprint,
            source = %entry.source_path,
            cached_at = %entry.cached_at,
            rows = entry.row_count,
            "cached table"
        );
    }
    info!(path = %cache.root().display(), entries = entries.len(), "load cache status");

    Ok(())
}
