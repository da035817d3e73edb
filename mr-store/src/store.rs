//! File-based persistence for MR records (JSON) and analysis results (text).
//!
//! Layout:
//! - records:  `<records_dir>/<id>.json`
//! - analyses: `<results_dir>/mr_<id>_analysis.txt`
//!
//! Every write goes to a hidden temp file in the destination directory and is
//! then renamed over the target, so readers never observe a partial file.
//! Existing files for the same id are overwritten; nothing is ever pruned.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::record::MrRecord;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory of persisted MR records keyed by MR id.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for the record with the given id.
    pub fn path_for(&self, id: u64) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Writes the record as pretty JSON, replacing any previous file for its id.
    pub async fn save(&self, record: &MrRecord) -> StoreResult<PathBuf> {
        let path = self.path_for(record.id);
        let mut json =
            serde_json::to_vec_pretty(record).map_err(|e| StoreError::serde(&path, e))?;
        json.push(b'\n');
        write_atomic(&path, &json).await?;
        debug!(id = record.id, iid = record.iid, path = %path.display(), "record saved");
        Ok(path)
    }

    /// Loads the record stored for `id`.
    pub async fn load(&self, id: u64) -> StoreResult<MrRecord> {
        load_record(self.path_for(id)).await
    }
}

/// Reads and deserializes one record file from an arbitrary path.
pub async fn load_record(path: impl AsRef<Path>) -> StoreResult<MrRecord> {
    let path = path.as_ref();
    let data = fs::read(path).await.map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| StoreError::serde(path, e))
}

/// Directory of analysis results keyed by MR id.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, mr_id: u64) -> PathBuf {
        self.root.join(format!("mr_{mr_id}_analysis.txt"))
    }

    /// Writes the analysis text verbatim, replacing any earlier result.
    pub async fn save(&self, mr_id: u64, text: &str) -> StoreResult<PathBuf> {
        let path = self.path_for(mr_id);
        write_atomic(&path, text.as_bytes()).await?;
        debug!(mr_id, path = %path.display(), bytes = text.len(), "analysis saved");
        Ok(path)
    }
}

/// Writes `bytes` to `path` via temp file + rename, creating parent dirs.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| StoreError::io(&dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = dir.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn save_creates_directory_and_keys_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path().join("mrs"));
        let rec = sample_record();

        let path = store.save(&rec).await.unwrap();
        assert_eq!(path, tmp.path().join("mrs").join("42.json"));
        assert_eq!(store.load(42).await.unwrap(), rec);
        assert_eq!(dir_entries(store.root()), vec!["42.json".to_string()]);
    }

    #[tokio::test]
    async fn saving_twice_is_byte_identical_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path());
        let mut rec = sample_record();

        let path = store.save(&rec).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.save(&rec).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);

        rec.title = "Fix loop again".into();
        store.save(&rec).await.unwrap();
        assert_eq!(store.load(42).await.unwrap().title, "Fix loop again");
        assert_eq!(dir_entries(tmp.path()), vec!["42.json".to_string()]);
    }

    #[tokio::test]
    async fn saved_json_is_pretty_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::new(tmp.path());
        let mut rec = sample_record();
        rec.title = "修复循环".into();

        let path = store.save(&rec).await.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("{\n  \"id\": 42,\n  \"iid\": 7,"));
        assert!(text.contains("修复循环"));
    }

    #[tokio::test]
    async fn load_reports_missing_and_malformed_files() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = load_record(tmp.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(missing, StoreError::Io { .. }));

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = load_record(&bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Serde { .. }));
        assert_eq!(err.path(), bad.as_path());
    }

    #[tokio::test]
    async fn result_store_writes_exact_text() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(tmp.path().join("analysis_results"));

        store.save(42, "first").await.unwrap();
        let path = store.save(42, "Looks fine.").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "mr_42_analysis.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Looks fine.");
        assert_eq!(dir_entries(store.root()), vec!["mr_42_analysis.txt".to_string()]);
    }
}
