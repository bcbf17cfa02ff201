//! Content-addressed filesystem cache for downloaded GRIB2 files.
//!
//! Keys are `(model_id, run_time, forecast_hour, product, filter_sig)`.
//! Entries are immutable once written: writers always produce a
//! `<path>.partial` file and atomically rename it into place. Concurrent
//! downloads for the same key are serialized by an `O_CREAT|O_EXCL` sidecar
//! lock file, so this cooperates across processes sharing the same
//! filesystem, not just threads in one process.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pnw_common::{ForecastHour, RunTime};
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{CacheError, CacheResult};

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_LOCK_ATTEMPTS: u32 = 25;
const DEFAULT_STALE_PARTIAL_AGE: Duration = Duration::from_secs(3600);

/// Canonical identity of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model_id: String,
    pub run_time: RunTime,
    pub forecast_hour: ForecastHour,
    pub product: String,
    pub filter_sig: String,
}

impl CacheKey {
    pub fn new(
        model_id: impl Into<String>,
        run_time: RunTime,
        forecast_hour: ForecastHour,
        product: impl Into<String>,
        filter_sig: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            run_time,
            forecast_hour,
            product: product.into(),
            filter_sig: filter_sig.into(),
        }
    }

    /// Relative filename this key maps to, without the cache root.
    ///
    /// `{model_id}/{YYYYMMDD}_{HH}/{fff}_{product}_{filter_sig}.grib2`
    fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.model_id)
            .join(self.run_time.path_component())
            .join(format!(
                "{}_{}_{}.grib2",
                self.forecast_hour.tag(),
                self.product,
                self.filter_sig
            ))
    }
}

/// Stable signature for server-side field/region subsetting.
///
/// Distinguishes a filtered download from the unfiltered full-file download
/// of the same product, so they occupy separate cache entries. Returns
/// `"full"` when no subsetting was requested.
pub fn filter_signature(fields: &[String], bbox: Option<&pnw_common::BoundingBox>) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    if fields.is_empty() && bbox.is_none() {
        return "full".to_string();
    }

    let mut sorted_fields = fields.to_vec();
    sorted_fields.sort();

    let mut hasher = DefaultHasher::new();
    sorted_fields.hash(&mut hasher);
    if let Some(b) = bbox {
        b.cache_key().hash(&mut hasher);
    }
    format!("{:08x}", (hasher.finish() & 0xFFFF_FFFF) as u32)
}

/// Retention policy applied by [`GribCache::retain`].
#[derive(Debug, Clone)]
pub enum RetentionPolicy {
    /// Keep only the N most recent run times per model.
    KeepLastRuns(usize),
    /// Keep only run times within this duration of now.
    MaxAge(chrono::Duration),
}

/// Content-addressed filesystem store for GRIB2 downloads.
pub struct GribCache {
    root: PathBuf,
    stale_partial_age: Duration,
    lock_attempts: u32,
}

impl GribCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stale_partial_age: DEFAULT_STALE_PARTIAL_AGE,
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
        }
    }

    pub fn with_stale_partial_age(mut self, age: Duration) -> Self {
        self.stale_partial_age = age;
        self
    }

    /// Pure path computation; no I/O.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn partial_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.path_for(key).into_os_string();
        path.push(".partial");
        PathBuf::from(path)
    }

    fn lock_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.path_for(key).into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Return the cached file's path, downloading it first if absent.
    ///
    /// `download_fn` is called with the `.partial` path and must leave a
    /// complete file there; it is renamed into place atomically on success.
    /// At most one caller across cooperating processes performs the
    /// download for a given key; others block on the sidecar lock and then
    /// observe the completed file.
    #[instrument(skip(self, download_fn), fields(model = %key.model_id, fhr = %key.forecast_hour.tag()))]
    pub async fn acquire_or_download<F, Fut>(
        &self,
        key: &CacheKey,
        download_fn: F,
    ) -> CacheResult<PathBuf>
    where
        F: FnOnce(&Path) -> Fut,
        Fut: Future<Output = CacheResult<()>>,
    {
        let final_path = self.path_for(key);
        if fs::metadata(&final_path).await.is_ok() {
            debug!(path = %final_path.display(), "cache hit");
            return Ok(final_path);
        }

        let key_label = format!(
            "{}/{}/{}_{}_{}",
            key.model_id,
            key.run_time.path_component(),
            key.forecast_hour.tag(),
            key.product,
            key.filter_sig
        );

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        let lock_path = self.lock_path(key);
        let _lock = FileLock::acquire(&lock_path, self.lock_attempts, &key_label).await?;

        if fs::metadata(&final_path).await.is_ok() {
            debug!(path = %final_path.display(), "cache filled while waiting for lock");
            return Ok(final_path);
        }

        let partial_path = self.partial_path(key);
        info!(path = %partial_path.display(), "downloading");
        download_fn(&partial_path)
            .await
            .map_err(|e| CacheError::DownloadFailed {
                key: key_label.clone(),
                message: e.to_string(),
            })?;

        if fs::metadata(&partial_path).await.is_err() {
            return Err(CacheError::DownloadIncomplete { key: key_label });
        }

        fs::rename(&partial_path, &final_path)
            .await
            .map_err(|e| io_err(&final_path, e))?;

        info!(path = %final_path.display(), "cache entry written");
        Ok(final_path)
    }

    /// Removes a finalized cache entry, presumed corrupt by its caller
    /// (e.g. a GRIB parse failure). The next `acquire_or_download` for this
    /// key re-downloads it. A no-op, not an error, if the entry is already
    /// absent.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        let final_path = self.path_for(key);
        match fs::remove_file(&final_path).await {
            Ok(()) => {
                warn!(path = %final_path.display(), "cache entry invalidated");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&final_path, e)),
        }
    }

    /// Delete stale `.partial` files left behind by crashed writers.
    ///
    /// Call once at startup before any downloads begin.
    #[instrument(skip(self))]
    pub async fn sweep_stale_partials(&self) -> CacheResult<usize> {
        let mut removed = 0;
        if fs::metadata(&self.root).await.is_err() {
            return Ok(0);
        }
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| io_err(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("partial") {
                    continue;
                }
                let metadata = entry.metadata().await.map_err(|e| io_err(&path, e))?;
                let age = metadata
                    .modified()
                    .ok()
                    .and_then(|m| m.elapsed().ok())
                    .unwrap_or(Duration::ZERO);
                if age >= self.stale_partial_age {
                    warn!(path = %path.display(), age_secs = age.as_secs(), "removing stale partial");
                    fs::remove_file(&path).await.map_err(|e| io_err(&path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Delete whole cache files outside the retention policy.
    ///
    /// Never deletes a run directory that currently holds a `.lock` file.
    #[instrument(skip(self, policy))]
    pub async fn retain(&self, model_id: &str, policy: &RetentionPolicy) -> CacheResult<usize> {
        let model_dir = self.root.join(model_id);
        if fs::metadata(&model_dir).await.is_err() {
            return Ok(0);
        }

        let mut run_dirs = Vec::new();
        let mut entries = fs::read_dir(&model_dir)
            .await
            .map_err(|e| io_err(&model_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(&model_dir, e))?
        {
            if entry
                .file_type()
                .await
                .map_err(|e| io_err(&model_dir, e))?
                .is_dir()
            {
                if let Some(name) = entry.file_name().to_str() {
                    run_dirs.push(name.to_string());
                }
            }
        }
        run_dirs.sort();

        let to_delete: Vec<String> = match policy {
            RetentionPolicy::KeepLastRuns(n) => {
                if run_dirs.len() > *n {
                    run_dirs[..run_dirs.len() - n].to_vec()
                } else {
                    Vec::new()
                }
            }
            RetentionPolicy::MaxAge(max_age) => {
                let cutoff = chrono::Utc::now() - *max_age;
                run_dirs
                    .iter()
                    .filter(|name| run_dir_older_than(name, cutoff))
                    .cloned()
                    .collect()
            }
        };

        let mut removed = 0;
        for name in to_delete {
            let dir = model_dir.join(&name);
            if has_active_lock(&dir).await? {
                debug!(dir = %dir.display(), "skipping retention delete, lock held");
                continue;
            }
            info!(dir = %dir.display(), "retention delete");
            fs::remove_dir_all(&dir).await.map_err(|e| io_err(&dir, e))?;
            removed += 1;
        }
        Ok(removed)
    }
}

async fn has_active_lock(dir: &Path) -> CacheResult<bool> {
    if fs::metadata(dir).await.is_err() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(dir).await.map_err(|e| io_err(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(dir, e))? {
        if entry.path().extension().and_then(|e| e.to_str()) == Some("lock") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn run_dir_older_than(name: &str, cutoff: chrono::DateTime<chrono::Utc>) -> bool {
    let Some((date, hour)) = name.split_once('_') else {
        return false;
    };
    let Ok(parsed) = chrono::NaiveDate::parse_from_str(date, "%Y%m%d") else {
        return false;
    };
    let Ok(hour) = hour.parse::<u32>() else {
        return false;
    };
    let Some(datetime) = parsed.and_hms_opt(hour, 0, 0) else {
        return false;
    };
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(datetime, chrono::Utc) < cutoff
}

fn io_err(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// RAII guard around an `O_CREAT|O_EXCL` sidecar lock file.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    async fn acquire(path: &Path, max_attempts: u32, key_label: &str) -> CacheResult<Self> {
        for attempt in 0..max_attempts {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(_) => return Ok(Self { path: path.to_path_buf() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(attempt, path = %path.display(), "lock held, retrying");
                    sleep(LOCK_RETRY_DELAY).await;
                }
                Err(e) => return Err(io_err(path, e)),
            }
        }
        Err(CacheError::LockContention {
            key: key_label.to_string(),
            attempts: max_attempts,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnw_common::BoundingBox;

    fn sample_key() -> CacheKey {
        CacheKey::new(
            "global025",
            RunTime::from_ymd_hour(2026, 2, 1, 6).unwrap(),
            ForecastHour::new(12),
            "sfc",
            "full",
        )
    }

    #[test]
    fn path_for_matches_naming_convention() {
        let cache = GribCache::new("/cache");
        let path = cache.path_for(&sample_key());
        assert_eq!(
            path,
            PathBuf::from("/cache/global025/20260201_06/012_sfc_full.grib2")
        );
    }

    #[test]
    fn filter_signature_is_full_when_unfiltered() {
        assert_eq!(filter_signature(&[], None), "full");
    }

    #[test]
    fn filter_signature_is_stable_and_order_independent() {
        let fields_a = vec!["tmp2m".to_string(), "prmsl".to_string()];
        let fields_b = vec!["prmsl".to_string(), "tmp2m".to_string()];
        let bbox = BoundingBox::new(-130.0, 40.0, -110.0, 55.0);
        assert_eq!(
            filter_signature(&fields_a, Some(&bbox)),
            filter_signature(&fields_b, Some(&bbox))
        );
    }

    #[tokio::test]
    async fn acquire_or_download_downloads_once_and_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GribCache::new(dir.path());
        let key = sample_key();

        let path = cache
            .acquire_or_download(&key, |partial| {
                let partial = partial.to_path_buf();
                async move {
                    tokio::fs::write(&partial, b"grib bytes")
                        .await
                        .map_err(|e| CacheError::Io {
                            path: partial.display().to_string(),
                            source: e,
                        })
                }
            })
            .await
            .unwrap();
        assert!(path.exists());

        let second = cache
            .acquire_or_download(&key, |_| async {
                panic!("should not re-download a cached entry");
                #[allow(unreachable_code)]
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(path, second);
    }

    #[tokio::test]
    async fn invalidate_removes_finalized_entry_and_allows_redownload() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GribCache::new(dir.path());
        let key = sample_key();

        let path = cache
            .acquire_or_download(&key, |partial| {
                let partial = partial.to_path_buf();
                async move {
                    tokio::fs::write(&partial, b"corrupt bytes")
                        .await
                        .map_err(|e| CacheError::Io {
                            path: partial.display().to_string(),
                            source: e,
                        })
                }
            })
            .await
            .unwrap();
        assert!(path.exists());

        cache.invalidate(&key).await.unwrap();
        assert!(!path.exists());

        let redownloaded = cache
            .acquire_or_download(&key, |partial| {
                let partial = partial.to_path_buf();
                async move {
                    tokio::fs::write(&partial, b"good bytes")
                        .await
                        .map_err(|e| CacheError::Io {
                            path: partial.display().to_string(),
                            source: e,
                        })
                }
            })
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&redownloaded).await.unwrap(), b"good bytes");
    }

    #[tokio::test]
    async fn invalidate_is_a_no_op_when_entry_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GribCache::new(dir.path());
        cache.invalidate(&sample_key()).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_stale_partials_removes_old_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GribCache::new(dir.path()).with_stale_partial_age(Duration::from_secs(0));
        let stale = dir.path().join("global025/20260201_06");
        tokio::fs::create_dir_all(&stale).await.unwrap();
        let partial = stale.join("012_sfc_full.grib2.partial");
        tokio::fs::write(&partial, b"").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let removed = cache.sweep_stale_partials().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn retain_keeps_only_last_n_runs() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GribCache::new(dir.path());
        for hour in [0u32, 6, 12, 18] {
            let run = chrono::NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap();
            let name = format!("{}_{:02}", run.format("%Y%m%d"), hour);
            tokio::fs::create_dir_all(dir.path().join("global025").join(name))
                .await
                .unwrap();
        }

        let removed = cache
            .retain("global025", &RetentionPolicy::KeepLastRuns(2))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let mut remaining: Vec<String> = tokio::fs::read_dir(dir.path().join("global025"))
            .await
            .unwrap()
            .next_entry()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert!(!remaining.is_empty());
    }
}
