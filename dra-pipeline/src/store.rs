//! Artifact store
//!
//! Every stage reads and writes through [`ArtifactStore`], a key → blob store
//! keyed by `(Namespace, name)`. [`FsArtifactStore`] maps namespaces onto the
//! configured directories; [`MemoryArtifactStore`] backs tests.
//!
//! `put` replaces a blob atomically (write to a temporary sibling, then rename),
//! so a crash mid-write leaves either the old or the new content, never a torn
//! file. `append` is the only non-replacing write and is used for the ledger.

use dra_common::{Error, ResolvedPaths, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use walkdir::WalkDir;

/// Canonical merged dataset
pub const DATASET_FILE: &str = "finaldata.csv";
/// Ingestion ledger
pub const LEDGER_FILE: &str = "ingestedfiles.txt";
/// Serialized model
pub const MODEL_FILE: &str = "trainedmodel.json";
/// Latest score record of a slot
pub const SCORE_FILE: &str = "latestscore.txt";
/// Confusion matrix report
pub const REPORT_FILE: &str = "confusionmatrix.txt";
/// Confusion matrix report, machine-readable
pub const REPORT_JSON_FILE: &str = "confusionmatrix.json";
/// Held-out evaluation data
pub const TEST_DATA_FILE: &str = "testdata.csv";
/// Combined serving API responses written by the probe
pub const API_RETURNS_FILE: &str = "apireturns.json";

/// Logical artifact namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Incoming source files
    Input,
    /// Canonical dataset and ledger
    Dataset,
    /// Newly trained, not yet promoted
    Staging,
    /// Currently serving
    Deployed,
    /// Held-out evaluation data
    TestData,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Input => "input",
            Namespace::Dataset => "dataset",
            Namespace::Staging => "staging",
            Namespace::Deployed => "deployed",
            Namespace::TestData => "testdata",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical key of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArtifactKey {
    pub namespace: Namespace,
    pub name: String,
}

impl ArtifactKey {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn dataset() -> Self {
        Self::new(Namespace::Dataset, DATASET_FILE)
    }

    pub fn ledger() -> Self {
        Self::new(Namespace::Dataset, LEDGER_FILE)
    }

    pub fn test_data() -> Self {
        Self::new(Namespace::TestData, TEST_DATA_FILE)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Key → blob storage capability injected into every component
pub trait ArtifactStore: Send + Sync {
    /// Read a blob; `Error::NotFound` when absent
    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>>;

    /// Replace a blob atomically
    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()>;

    /// Append to a blob, creating it when absent
    fn append(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()>;

    fn exists(&self, key: &ArtifactKey) -> Result<bool>;

    /// Names of the blobs in a namespace, sorted; `Error::NotFound` when the
    /// namespace itself does not exist
    fn list(&self, namespace: Namespace) -> Result<Vec<String>>;

    /// Human-readable location of a namespace (recorded in the ledger)
    fn location(&self, namespace: Namespace) -> String;

    /// Read a blob, mapping absence to `None`
    fn get_optional(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>> {
        match self.get(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Copy a blob; the source stays valid
    fn copy(&self, from: &ArtifactKey, to: &ArtifactKey) -> Result<()> {
        let bytes = self.get(from)?;
        self.put(to, &bytes)
    }
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Filesystem store rooted at the resolved configuration paths
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    roots: BTreeMap<Namespace, PathBuf>,
}

impl FsArtifactStore {
    pub fn new(paths: &ResolvedPaths) -> Self {
        let mut roots = BTreeMap::new();
        roots.insert(Namespace::Input, paths.input_folder.clone());
        roots.insert(Namespace::Dataset, paths.output_folder.clone());
        roots.insert(Namespace::Staging, paths.output_model.clone());
        roots.insert(Namespace::Deployed, paths.deployment.clone());
        roots.insert(Namespace::TestData, paths.test_data.clone());
        Self { roots }
    }

    /// Directory backing a namespace
    pub fn root(&self, namespace: Namespace) -> &Path {
        // Every variant is inserted in `new`
        self.roots
            .get(&namespace)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."))
    }

    /// Filesystem path of a key
    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.root(key.namespace).join(&key.name)
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        let path = self.path_of(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "{} ({})",
                key,
                path.display()
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(key);
        Self::ensure_parent(&path)?;

        let tmp_path = path.with_file_name(format!(".{}.tmp", key.name));
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(key = %key, bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    fn append(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(key);
        Self::ensure_parent(&path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(bytes)?;
        file.sync_data()?;

        tracing::debug!(key = %key, bytes = bytes.len(), "Appended to artifact");
        Ok(())
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.path_of(key).is_file())
    }

    fn list(&self, namespace: Namespace) -> Result<Vec<String>> {
        let root = self.root(namespace);
        if !root.is_dir() {
            return Err(Error::NotFound(format!(
                "{} location {}",
                namespace,
                root.display()
            )));
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).max_depth(1).follow_links(true) {
            let entry = entry.map_err(|e| {
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn location(&self, namespace: Namespace) -> String {
        self.root(namespace).display().to_string()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob (test helper)
    pub fn insert(&self, key: ArtifactKey, bytes: impl Into<Vec<u8>>) {
        self.write_guard().insert(key, bytes.into());
    }

    /// Remove a blob, returning whether it existed
    pub fn remove(&self, key: &ArtifactKey) -> bool {
        self.write_guard().remove(key).is_some()
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ArtifactKey, Vec<u8>>> {
        // A poisoned lock only means another test thread panicked mid-write
        self.blobs.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ArtifactKey, Vec<u8>>> {
        self.blobs.read().unwrap_or_else(|p| p.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        self.read_guard()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        self.write_guard().insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn append(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        self.write_guard()
            .entry(key.clone())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.read_guard().contains_key(key))
    }

    fn list(&self, namespace: Namespace) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .read_guard()
            .keys()
            .filter(|k| k.namespace == namespace)
            .map(|k| k.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn location(&self, namespace: Namespace) -> String {
        format!("memory://{}", namespace)
    }
}
