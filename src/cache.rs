use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::model::{CachedTableEntry, RawTable};
use crate::table::parse_csv_table;
use crate::util::{now_utc_string, sha256_bytes, write_json_pretty};

const CACHE_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub fingerprint: String,
    pub table: RawTable,
    pub cache_hit: bool,
}

#[derive(Debug, Clone)]
pub struct CacheListing {
    pub fingerprint: String,
    pub source_path: String,
    pub cached_at: String,
    pub row_count: usize,
}

/// Parsed tables keyed by the SHA-256 of the source bytes. An edited source
/// hashes differently, so stale entries are never served.
#[derive(Debug, Clone)]
pub struct LoadCache {
    root: PathBuf,
}

impl LoadCache {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            root: cache_root.join("tables"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join(format!("{fingerprint}.json"))
    }

    pub fn load(&self, source: &Path) -> Result<LoadedSource> {
        let data = fs::read(source).with_context(|| format!("failed to read {}", source.display()))?;
        let fingerprint = sha256_bytes(&data);
        let entry_path = self.entry_path(&fingerprint);

        if entry_path.exists() {
            match read_entry(&entry_path) {
                Ok(entry) if entry.manifest_version == CACHE_MANIFEST_VERSION => {
                    debug!(fingerprint = %fingerprint, "load cache hit");
                    return Ok(LoadedSource {
                        fingerprint,
                        table: entry.table,
                        cache_hit: true,
                    });
                }
                Ok(entry) => {
                    warn!(
                        path = %entry_path.display(),
                        manifest_version = entry.manifest_version,
                        "ignoring cache entry with unsupported version"
                    );
                }
                Err(err) => {
                    warn!(path = %entry_path.display(), error = %err, "ignoring unreadable cache entry");
                }
            }
        }

        let table = parse_csv_table(&data)
            .with_context(|| format!("failed to parse {}", source.display()))?;

        let entry = CachedTableEntry {
            manifest_version: CACHE_MANIFEST_VERSION,
            fingerprint: fingerprint.clone(),
            source_path: source.display().to_string(),
            cached_at: now_utc_string(),
            table,
        };
        write_json_pretty(&entry_path, &entry)?;
        info!(
            fingerprint = %fingerprint,
            rows = entry.table.row_count(),
            "cached parsed source table"
        );

        Ok(LoadedSource {
            fingerprint,
            table: entry.table,
            cache_hit: false,
        })
    }

    pub fn entries(&self) -> Result<Vec<CacheListing>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut listings = Vec::new();
        let dir_entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?;

        for dir_entry in dir_entries {
            let dir_entry = dir_entry
                .with_context(|| format!("failed to read entry in {}", self.root.display()))?;
            let path = dir_entry.path();

            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !is_json {
                continue;
            }

            match read_entry(&path) {
                Ok(entry) => listings.push(CacheListing {
                    fingerprint: entry.fingerprint,
                    source_path: entry.source_path,
                    cached_at: entry.cached_at,
                    row_count: entry.table.row_count(),
                }),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable cache entry");
                }
            }
        }

        listings.sort_by(|a, b| a.cached_at.cmp(&b.cached_at).then(a.fingerprint.cmp(&b.fingerprint)));
        Ok(listings)
    }
}

/// Reads a source without consulting or filling the cache.
pub fn load_uncached(source: &Path) -> Result<LoadedSource> {
    let data = fs::read(source).with_context(|| format!("failed to read {}", source.display()))?;
    let table =
        parse_csv_table(&data).with_context(|| format!("failed to parse {}", source.display()))?;

    Ok(LoadedSource {
        fingerprint: sha256_bytes(&data),
        table,
        cache_hit: false,
    })
}

fn read_entry(path: &Path) -> Result<CachedTableEntry> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{LoadCache, load_uncached};

    const SOURCE: &str = "TECNICO,PRODUTO,DATA INSPECAO\nAna,Luva,2024-01-02\n";

    #[test]
    fn second_load_of_unchanged_source_hits_cache() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("epi.csv");
        fs::write(&source, SOURCE).expect("source should write");
        let cache = LoadCache::new(&dir.path().join("cache"));

        let first = cache.load(&source).expect("first load");
        assert!(!first.cache_hit);

        let second = cache.load(&source).expect("second load");
        assert!(second.cache_hit);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(second.table, first.table);

        let listings = cache.entries().expect("listing should succeed");
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].row_count, 1);
    }

    #[test]
    fn edited_source_gets_a_new_fingerprint() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("epi.csv");
        fs::write(&source, SOURCE).expect("source should write");
        let cache = LoadCache::new(&dir.path().join("cache"));

        let first = cache.load(&source).expect("first load");
        fs::write(&source, format!("{SOURCE}Bruno,Bota,\n")).expect("source should rewrite");
        let second = cache.load(&source).expect("second load");

        assert!(!second.cache_hit);
        assert_ne!(second.fingerprint, first.fingerprint);
        assert_eq!(second.table.row_count(), 2);
    }

    #[test]
    fn corrupt_entry_is_reparsed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("epi.csv");
        fs::write(&source, SOURCE).expect("source should write");
        let cache = LoadCache::new(&dir.path().join("cache"));

        let first = cache.load(&source).expect("first load");
        fs::write(cache.root().join(format!("{}.json", first.fingerprint)), "{")
            .expect("entry should be overwritten");

        let second = cache.load(&source).expect("reload");
        assert!(!second.cache_hit);
        assert_eq!(second.table, first.table);
    }

    #[test]
    fn uncached_load_matches_cached_fingerprint() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("epi.csv");
        fs::write(&source, SOURCE).expect("source should write");

        let cached = LoadCache::new(&dir.path().join("cache"))
            .load(&source)
            .expect("cached load");
        let uncached = load_uncached(&source).expect("uncached load");
        assert_eq!(cached.fingerprint, uncached.fingerprint);
        assert_eq!(cached.table, uncached.table);
    }
}
