use amrview_core::MapDocument;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const MAP_FILE: &str = "last_map.json";
const SECURITY_FILE: &str = "last_security.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImport<T> {
    pub filename: String,
    pub document: T,
}

#[derive(Debug, Clone)]
pub struct ImportStore {
    dir: PathBuf,
}

impl ImportStore {
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::at(crate::util::config::project_dirs()?.data_dir()))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save_map(&self, filename: &str, document: &MapDocument) -> anyhow::Result<()> {
        self.write(MAP_FILE, filename, document)
    }

    pub fn load_map(&self) -> anyhow::Result<Option<StoredImport<MapDocument>>> {
        self.read(MAP_FILE)
    }

    pub fn save_security(&self, filename: &str, document: &Value) -> anyhow::Result<()> {
        self.write(SECURITY_FILE, filename, document)
    }

    pub fn load_security(&self) -> anyhow::Result<Option<StoredImport<Value>>> {
        self.read(SECURITY_FILE)
    }

    fn write<T: Serialize>(&self, file: &str, filename: &str, document: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create data directory {}", self.dir.display()))?;
        let record = StoredImport {
            filename: filename.to_string(),
            document,
        };
        let data = serde_json::to_vec(&record).context("failed to serialize import")?;
        let path = self.dir.join(file);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to replace {}", path.display()))?;
        tracing::debug!(path = %path.display(), filename, "stored import");
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> anyhow::Result<Option<StoredImport<T>>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> anyhow::Result<StoredImport<T>> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("corrupt import record {}", path.display()))
}
