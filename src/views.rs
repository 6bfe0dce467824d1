//! Saved views: named column/query/range snapshots in a single JSON file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::app::{TimeRange, TimeSpec};

#[derive(Debug, Error)]
pub enum ViewStoreError {
    #[error("view not found: {0}")]
    NotFound(String),

    #[error("invalid view name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a saved view remembers. The range is stored as the flat TimeSpec
/// token lists so the file format stays independent of the in-memory type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Vec<String>>,
}

impl ViewSnapshot {
    /// The stored time range, if both endpoints are present and parse.
    /// A malformed endpoint drops the range with a warning instead of
    /// failing the whole view.
    pub fn range(&self) -> Option<TimeRange> {
        let start = self.start.as_ref()?;
        let end = self.end.as_ref()?;
        match (TimeSpec::deserialize(start), TimeSpec::deserialize(end)) {
            (Ok(start), Ok(end)) => Some(TimeRange::new(start, end)),
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "ignoring malformed time range in saved view");
                None
            }
        }
    }

    pub fn set_range(&mut self, range: &TimeRange) {
        self.start = Some(range.start.serialize());
        self.end = Some(range.end.serialize());
    }
}

/// Persists view snapshots under names. One JSON object per file,
/// name -> snapshot, written atomically.
pub struct ViewStore {
    path: PathBuf,
}

impl ViewStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All readable snapshots. A missing file is an empty store; a
    /// malformed entry is skipped with a warning so one bad view never
    /// blocks the rest.
    pub fn load_all(&self) -> Result<BTreeMap<String, ViewSnapshot>, ViewStoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let raw: BTreeMap<String, Value> = serde_json::from_str(&content)?;

        let mut views = BTreeMap::new();
        for (name, value) in raw {
            match serde_json::from_value::<ViewSnapshot>(value) {
                Ok(snapshot) => {
                    views.insert(name, snapshot);
                }
                Err(err) => warn!(view = %name, error = %err, "skipping malformed view"),
            }
        }
        Ok(views)
    }

    pub fn names(&self) -> Result<Vec<String>, ViewStoreError> {
        Ok(self.load_all()?.into_keys().collect())
    }

    pub fn load(&self, name: &str) -> Result<ViewSnapshot, ViewStoreError> {
        self.load_all()?
            .remove(name)
            .ok_or_else(|| ViewStoreError::NotFound(name.to_string()))
    }

    pub fn save(&self, name: &str, snapshot: &ViewSnapshot) -> Result<(), ViewStoreError> {
        Self::validate_name(name)?;

        let mut views = self.load_all()?;
        views.insert(name.to_string(), snapshot.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&views)?;
        atomic_write(&self.path, json.as_bytes())?;
        Ok(())
    }

    fn validate_name(name: &str) -> Result<(), ViewStoreError> {
        if name.trim().is_empty() {
            return Err(ViewStoreError::InvalidName(
                "name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ViewStoreError::InvalidName(format!(
                "name cannot contain path components: {name:?}"
            )));
        }
        Ok(())
    }
}

/// Write content atomically using temp file + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let pid = std::process::id();

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("views");
    let tmp_path = path.with_file_name(format!("{file_name}.{timestamp}.{pid}.tmp"));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Unit;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ViewStore) {
        let temp = TempDir::new().unwrap();
        let store = ViewStore::new(temp.path().join("views.json"));
        (temp, store)
    }

    fn sample_snapshot() -> ViewSnapshot {
        let mut snapshot = ViewSnapshot {
            columns: vec!["hostname".into(), "msg".into()],
            query: Some("hostname = \"web01\"".into()),
            ..ViewSnapshot::default()
        };
        snapshot.set_range(&TimeRange::new(
            TimeSpec::Relative {
                value: 4,
                unit: Unit::Hours,
            },
            TimeSpec::default(),
        ));
        snapshot
    }

    #[test]
    fn empty_store_has_no_views() {
        let (_temp, store) = setup();
        assert!(store.load_all().unwrap().is_empty());
        assert!(store.names().unwrap().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_temp, store) = setup();
        let snapshot = sample_snapshot();

        store.save("errors", &snapshot).unwrap();
        let loaded = store.load("errors").unwrap();

        assert_eq!(loaded, snapshot);
        let range = loaded.range().unwrap();
        assert_eq!(
            range.start,
            TimeSpec::Relative {
                value: 4,
                unit: Unit::Hours
            }
        );
        assert_eq!(range.end, TimeSpec::default());
    }

    #[test]
    fn load_missing_view_is_not_found() {
        let (_temp, store) = setup();
        assert!(matches!(
            store.load("nope"),
            Err(ViewStoreError::NotFound(_))
        ));
    }

    #[test]
    fn save_keeps_other_views() {
        let (_temp, store) = setup();
        store.save("one", &sample_snapshot()).unwrap();
        store
            .save(
                "two",
                &ViewSnapshot {
                    columns: vec!["msg".into()],
                    ..ViewSnapshot::default()
                },
            )
            .unwrap();

        assert_eq!(store.names().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn malformed_entry_is_skipped() {
        let (temp, store) = setup();
        store.save("good", &sample_snapshot()).unwrap();

        let path = temp.path().join("views.json");
        let mut raw: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw.insert("bad".to_string(), serde_json::json!({"columns": 42}));
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let views = store.load_all().unwrap();
        assert_eq!(views.len(), 1);
        assert!(views.contains_key("good"));
    }

    #[test]
    fn malformed_range_loads_without_a_range() {
        let snapshot = ViewSnapshot {
            start: Some(vec!["sometime".into(), "soon".into()]),
            end: Some(vec!["relative".into(), "0".into(), "3600".into()]),
            ..ViewSnapshot::default()
        };
        assert!(snapshot.range().is_none());
    }

    #[test]
    fn rejects_bad_names() {
        let (_temp, store) = setup();
        for name in ["", "  ", "a/b", "a\\b", ".."] {
            assert!(matches!(
                store.save(name, &ViewSnapshot::default()),
                Err(ViewStoreError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (temp, store) = setup();
        store.save("one", &sample_snapshot()).unwrap();

        for entry in fs::read_dir(temp.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "found temp file: {name}");
        }
    }

    #[test]
    fn snapshot_without_range_stays_rangeless() {
        let snapshot = ViewSnapshot {
            columns: vec!["msg".into()],
            ..ViewSnapshot::default()
        };
        assert!(snapshot.range().is_none());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("start"));
    }
}
