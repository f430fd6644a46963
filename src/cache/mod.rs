//! Build cache
//!
//! Decides whether a previous artifact can be reused. The module-level gate
//! compares the stored fingerprint and checks the artifact is newer than
//! every declared source. The per-file gate compares one object against one
//! source and is only consulted once a rebuild is under way.

pub mod fingerprint;
pub mod stats;

pub use fingerprint::Fingerprint;
pub use stats::{Stats, collect_stats, human_bytes};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted result of the last successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    /// Source path to modification time, in nanoseconds since the epoch
    pub sources: BTreeMap<String, u64>,
}

impl CacheEntry {
    /// Record `fingerprint` together with the current mtime of each source.
    ///
    /// # Errors
    ///
    /// Returns an error if a source's metadata cannot be read.
    pub fn capture(fingerprint: &Fingerprint, sources: &[PathBuf]) -> io::Result<Self> {
        let mut recorded = BTreeMap::new();
        for source in sources {
            let modified = fs::metadata(source)?.modified()?;
            recorded.insert(source.display().to_string(), epoch_nanos(modified));
        }

        Ok(Self {
            fingerprint: fingerprint.as_str().to_string(),
            sources: recorded,
        })
    }

    /// Read an entry, classifying every failure as a cache miss reason
    pub fn load(path: &Path) -> Result<Self, CacheStatus> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheStatus::Missing),
            Err(e) => {
                crate::debug!("Unreadable cache entry {}: {e}", path.display());
                return Err(CacheStatus::Corrupt);
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            crate::debug!("Corrupt cache entry {}: {e}", path.display());
            CacheStatus::Corrupt
        })
    }

    /// Write the entry through a temporary file and an atomic rename, so a
    /// reader never sees half an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be written.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp_file, self).map_err(io::Error::other)?;
        temp_file.flush()?;
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Outcome of the module-level gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Artifact can be reused as is
    Hit,
    Disabled,
    /// No entry stored yet, or the last build failed
    Missing,
    /// Entry exists but could not be read or parsed
    Corrupt,
    FingerprintChanged,
    OutputMissing,
    /// A source is newer than the artifact
    Stale,
}

impl CacheStatus {
    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }

    /// Whether objects from the previous build may survive the rebuild.
    ///
    /// Only true when the arguments are known to be unchanged; the per-file
    /// gate then decides object by object.
    #[must_use]
    pub const fn allows_object_reuse(self) -> bool {
        matches!(self, Self::Stale | Self::OutputMissing)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Hit => "up to date",
            Self::Disabled => "cache disabled",
            Self::Missing => "no cache entry",
            Self::Corrupt => "cache entry unreadable",
            Self::FingerprintChanged => "build arguments changed",
            Self::OutputMissing => "artifact missing",
            Self::Stale => "sources changed",
        };
        f.write_str(text)
    }
}

/// Module-level gate
#[must_use]
pub fn check(
    enabled: bool,
    entry_path: &Path,
    fingerprint: &Fingerprint,
    output: &Path,
    sources: &[PathBuf],
) -> CacheStatus {
    if !enabled {
        return CacheStatus::Disabled;
    }

    let entry = match CacheEntry::load(entry_path) {
        Ok(entry) => entry,
        Err(status) => return status,
    };

    if entry.fingerprint != fingerprint.as_str() {
        return CacheStatus::FingerprintChanged;
    }

    let Some(built) = modified(output) else {
        return CacheStatus::OutputMissing;
    };

    let mut newest = UNIX_EPOCH;
    for source in sources {
        match modified(source) {
            Some(time) => newest = newest.max(time),
            None => return CacheStatus::Stale,
        }
    }

    if built > newest {
        CacheStatus::Hit
    } else {
        CacheStatus::Stale
    }
}

/// Per-file gate: `target` exists and is strictly newer than `source`
#[must_use]
pub fn is_up_to_date(target: &Path, source: &Path) -> bool {
    match (modified(target), modified(source)) {
        (Some(target), Some(source)) => target > source,
        _ => false,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}

fn epoch_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::touch;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        fingerprint: Fingerprint,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("a.cpp"), 1_000);
            touch(&dir.path().join("b.cpp"), 1_000);
            touch(&dir.path().join("core.so"), 2_000);
            Self {
                dir,
                fingerprint: Fingerprint::of(&"args").unwrap(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn sources(&self) -> Vec<PathBuf> {
            vec![self.path("a.cpp"), self.path("b.cpp")]
        }

        fn save_entry(&self) {
            CacheEntry::capture(&self.fingerprint, &self.sources())
                .unwrap()
                .save(&self.path("cache.json"))
                .unwrap();
        }

        fn check(&self, enabled: bool) -> CacheStatus {
            check(
                enabled,
                &self.path("cache.json"),
                &self.fingerprint,
                &self.path("core.so"),
                &self.sources(),
            )
        }
    }

    #[test]
    fn hit_when_everything_matches() {
        let fixture = Fixture::new();
        fixture.save_entry();
        assert_eq!(fixture.check(true), CacheStatus::Hit);
    }

    #[test]
    fn disabled_always_misses() {
        let fixture = Fixture::new();
        fixture.save_entry();
        assert_eq!(fixture.check(false), CacheStatus::Disabled);
    }

    #[test]
    fn missing_entry() {
        let fixture = Fixture::new();
        assert_eq!(fixture.check(true), CacheStatus::Missing);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let fixture = Fixture::new();
        fs::write(fixture.path("cache.json"), b"{ not json").unwrap();
        assert_eq!(fixture.check(true), CacheStatus::Corrupt);

        fs::write(fixture.path("cache.json"), [0xff, 0xfe, 0x00]).unwrap();
        assert_eq!(fixture.check(true), CacheStatus::Corrupt);
    }

    #[test]
    fn changed_fingerprint() {
        let mut fixture = Fixture::new();
        fixture.save_entry();
        fixture.fingerprint = Fingerprint::of(&"other args").unwrap();
        assert_eq!(fixture.check(true), CacheStatus::FingerprintChanged);
    }

    #[test]
    fn source_newer_than_output_is_stale() {
        let fixture = Fixture::new();
        fixture.save_entry();
        touch(&fixture.path("b.cpp"), 3_000);
        assert_eq!(fixture.check(true), CacheStatus::Stale);
    }

    #[test]
    fn equal_mtimes_are_stale() {
        let fixture = Fixture::new();
        fixture.save_entry();
        touch(&fixture.path("a.cpp"), 2_000);
        assert_eq!(fixture.check(true), CacheStatus::Stale);
    }

    #[test]
    fn deleted_output() {
        let fixture = Fixture::new();
        fixture.save_entry();
        fs::remove_file(fixture.path("core.so")).unwrap();
        assert_eq!(fixture.check(true), CacheStatus::OutputMissing);
        assert!(CacheStatus::OutputMissing.allows_object_reuse());
        assert!(!CacheStatus::FingerprintChanged.allows_object_reuse());
    }

    #[test]
    fn per_file_gate() {
        let fixture = Fixture::new();
        let object = fixture.path("a.cpp.o");
        assert!(!is_up_to_date(&object, &fixture.path("a.cpp")));

        touch(&object, 1_500);
        assert!(is_up_to_date(&object, &fixture.path("a.cpp")));

        touch(&fixture.path("a.cpp"), 1_500);
        assert!(!is_up_to_date(&object, &fixture.path("a.cpp")));
    }

    #[test]
    fn entry_records_source_mtimes() {
        let fixture = Fixture::new();
        let entry = CacheEntry::capture(&fixture.fingerprint, &fixture.sources()).unwrap();
        let key = fixture.path("a.cpp").display().to_string();
        assert_eq!(entry.sources.get(&key), Some(&1_000_000_000_000));
        assert_eq!(entry.fingerprint, fixture.fingerprint.as_str());
    }
}
