//! Local resource repository seam
//!
//! The repository holds the desired state: one body per logical path.
//! Remote synchronization of the repository itself (push/pull/reset) is
//! optional; the engine probes [`ResourceRepository::capabilities`] once
//! and reports missing support as [`SyncOutcome::Unsupported`].

use std::fs;
use std::path::{Path, PathBuf};

use restsync_fs::ConfigStore;
use restsync_resource::{LogicalPath, Resource};
use serde_json::Value;

use crate::{Error, Result};

/// Optional operations a repository supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryCapabilities {
    pub push: bool,
    pub pull: bool,
    pub reset: bool,
}

impl RepositoryCapabilities {
    pub fn all() -> Self {
        Self {
            push: true,
            pull: true,
            reset: true,
        }
    }
}

/// Result of a repository synchronization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    /// The repository does not offer this operation
    Unsupported,
}

/// Storage of desired resource bodies.
pub trait ResourceRepository: Send + Sync {
    /// Body stored at `path`, `None` when there is none.
    fn get_resource(&self, path: &LogicalPath) -> Result<Option<Resource>>;

    fn apply_resource(&self, path: &LogicalPath, resource: &Resource) -> Result<()>;

    /// Remove the body at `path`; removing an absent body is not an error.
    fn delete_resource(&self, path: &LogicalPath) -> Result<()>;

    /// Every stored resource path, sorted.
    fn list_resource_paths(&self) -> Result<Vec<LogicalPath>>;

    fn capabilities(&self) -> RepositoryCapabilities {
        RepositoryCapabilities::default()
    }

    /// Only called when [`capabilities`](Self::capabilities) advertises `push`.
    fn push(&self) -> Result<()> {
        Ok(())
    }

    /// Only called when [`capabilities`](Self::capabilities) advertises `pull`.
    fn pull(&self) -> Result<()> {
        Ok(())
    }

    /// Only called when [`capabilities`](Self::capabilities) advertises `reset`.
    fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// File name holding a resource body inside its path directory.
pub const RESOURCE_FILE: &str = "resource.json";

/// Repository keeping each body at `<root>/<segments...>/resource.json`.
///
/// Reading a collection path returns the bodies of its direct children
/// as an array.
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: PathBuf,
    store: ConfigStore,
}

impl FsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            store: ConfigStore::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, path: &LogicalPath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    fn file_for(&self, path: &LogicalPath) -> PathBuf {
        self.dir_for(path).join(RESOURCE_FILE)
    }

    fn load(&self, file: &Path) -> Result<Option<Resource>> {
        if !file.is_file() {
            return Ok(None);
        }
        Ok(Some(self.store.load(file)?))
    }

    fn children(&self, path: &LogicalPath) -> Result<Option<Resource>> {
        let dir = self.dir_for(path);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut names = read_dir_names(&dir)?;
        names.sort();

        let mut items = Vec::new();
        for name in names {
            if let Some(item) = self.load(&dir.join(&name).join(RESOURCE_FILE))? {
                items.push(item.into_value());
            }
        }
        Ok(Some(Resource::new(Value::Array(items))))
    }

    fn collect_paths(&self, dir: &Path, segments: &mut Vec<String>, out: &mut Vec<LogicalPath>) -> Result<()> {
        if dir.join(RESOURCE_FILE).is_file() && !segments.is_empty() {
            out.push(LogicalPath::from_segments(segments.clone(), false));
        }
        for name in read_dir_names(dir)? {
            let child = dir.join(&name);
            if child.is_dir() {
                segments.push(name);
                self.collect_paths(&child, segments, out)?;
                segments.pop();
            }
        }
        Ok(())
    }
}

fn read_dir_names(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| restsync_fs::Error::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| restsync_fs::Error::io(dir, e))?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

impl ResourceRepository for FsRepository {
    fn get_resource(&self, path: &LogicalPath) -> Result<Option<Resource>> {
        if path.is_collection() {
            return self.children(path);
        }
        self.load(&self.file_for(path))
    }

    fn apply_resource(&self, path: &LogicalPath, resource: &Resource) -> Result<()> {
        if path.is_collection() {
            return Err(Error::Validation(format!(
                "cannot store a body at collection path {path}"
            )));
        }
        self.store.save(&self.file_for(path), resource)?;
        tracing::debug!(path = %path, "Stored local resource");
        Ok(())
    }

    fn delete_resource(&self, path: &LogicalPath) -> Result<()> {
        let file = self.file_for(path);
        match fs::remove_file(&file) {
            Ok(()) => {
                tracing::debug!(path = %path, "Deleted local resource");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(restsync_fs::Error::io(file, e).into()),
        }
    }

    fn list_resource_paths(&self) -> Result<Vec<LogicalPath>> {
        let mut paths = Vec::new();
        if self.root.is_dir() {
            self.collect_paths(&self.root, &mut Vec::new(), &mut paths)?;
        }
        paths.sort();
        Ok(paths)
    }
}
