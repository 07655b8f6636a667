use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::encoding::BitString;
use crate::error::{AppError, AppResult};

pub const ARTIFACT_SUFFIX: &str = "_encoded.txt";
pub const MANIFEST_SUFFIX: &str = "_manifest.json";

/// Final path component of `identifier` without its extension.
///
/// Accepts both `/` and `\` separators since upload names come from arbitrary clients.
pub fn document_stem(identifier: &str) -> AppResult<String> {
    let base = identifier.rsplit(['/', '\\']).next().unwrap_or(identifier);
    Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("Cannot derive an artifact name from '{}'", identifier)))
}

/// `report.pdf` becomes `report_encoded.txt`.
pub fn artifact_name_for(identifier: &str) -> AppResult<String> {
    Ok(format!("{}{}", document_stem(identifier)?, ARTIFACT_SUFFIX))
}

/// `report.pdf` becomes `report_manifest.json`.
pub fn manifest_name_for(identifier: &str) -> AppResult<String> {
    Ok(format!("{}{}", document_stem(identifier)?, MANIFEST_SUFFIX))
}

/// Artifact names are single plain path components; anything else can never
/// have been saved and is reported as not found.
fn check_name(name: &str) -> AppResult<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if plain {
        Ok(())
    } else {
        Err(AppError::not_found(name))
    }
}

/// Persists artifacts by name. Saving an existing name replaces it.
pub trait ArtifactStore: Send + Sync {
    fn save_named(&self, name: &str, contents: &[u8]) -> AppResult<()>;

    fn load(&self, name: &str) -> AppResult<Bytes>;

    /// Deletes `name`. Removing a name that was never saved is not an error.
    fn remove(&self, name: &str) -> AppResult<()>;

    fn is_available(&self) -> bool;

    /// Stores `bits` as plain text under the name derived from `document_identifier`.
    fn save(&self, document_identifier: &str, bits: &BitString) -> AppResult<String> {
        let name = artifact_name_for(document_identifier)?;
        self.save_named(&name, bits.as_ref())?;
        Ok(name)
    }
}

/// Stores artifacts as files in one output directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so readers see either the previous artifact or the complete new one.
/// Concurrent saves of one name are last-writer-wins in unspecified order.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AppError::storage(format!("Failed to create output directory {}: {}", root.display(), e))
        })?;
        info!("Artifact store ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save_named(&self, name: &str, contents: &[u8]) -> AppResult<()> {
        check_name(name).map_err(|_| AppError::validation(format!("Invalid artifact name '{}'", name)))?;

        let mut temp = NamedTempFile::new_in(&self.root)?;
        temp.write_all(contents)?;
        temp.flush()?;
        let path = self.root.join(name);
        temp.persist(&path)
            .map_err(|e| AppError::storage(format!("Failed to persist {}: {}", path.display(), e.error)))?;

        debug!(artifact = name, bytes = contents.len(), "Artifact written");
        Ok(())
    }

    fn load(&self, name: &str) -> AppResult<Bytes> {
        check_name(name)?;
        match fs::read(self.root.join(name)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::not_found(name)),
            Err(e) => Err(AppError::storage(format!("Failed to read {}: {}", name, e))),
        }
    }

    fn remove(&self, name: &str) -> AppResult<()> {
        check_name(name)?;
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => {
                debug!(artifact = name, "Artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(format!("Failed to remove {}: {}", name, e))),
        }
    }

    fn is_available(&self) -> bool {
        fs::metadata(&self.root)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }
}

/// Keeps artifacts in process memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Bytes>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save_named(&self, name: &str, contents: &[u8]) -> AppResult<()> {
        check_name(name).map_err(|_| AppError::validation(format!("Invalid artifact name '{}'", name)))?;
        self.artifacts
            .write()
            .map_err(|_| AppError::storage("Artifact map lock poisoned"))?
            .insert(name.to_string(), Bytes::copy_from_slice(contents));
        Ok(())
    }

    fn load(&self, name: &str) -> AppResult<Bytes> {
        check_name(name)?;
        self.artifacts
            .read()
            .map_err(|_| AppError::storage("Artifact map lock poisoned"))?
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::not_found(name))
    }

    fn remove(&self, name: &str) -> AppResult<()> {
        check_name(name)?;
        self.artifacts
            .write()
            .map_err(|_| AppError::storage("Artifact map lock poisoned"))?
            .remove(name);
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.artifacts.is_poisoned()
    }
}
