//! Storage collaborators that enumerate and read run files.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use av_core::InstanceId;

use crate::naming::matches_instance;
use crate::table::{Table, parse_table};
use crate::{ResultsError, ResultsResult};

/// Opaque reference to one run file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle {
    /// File name including extension; the run id is parsed from it.
    pub name: String,
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Where run files come from.
///
/// Implementations must return handles sorted by file name so that loading is
/// deterministic.
pub trait RunSource: Sync {
    fn enumerate_files(&self, instance: &InstanceId) -> ResultsResult<Vec<FileHandle>>;

    fn read_table(&self, handle: &FileHandle) -> ResultsResult<Table>;
}

/// Run files stored flat in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root_dir: PathBuf,
    prefix: String,
    extensions: Vec<String>,
}

impl DirectorySource {
    pub fn new(root_dir: PathBuf, prefix: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            root_dir,
            prefix: prefix.into(),
            extensions,
        }
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }
}

impl RunSource for DirectorySource {
    fn enumerate_files(&self, instance: &InstanceId) -> ResultsResult<Vec<FileHandle>> {
        let mut files = Vec::new();

        if !self.root_dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if matches_instance(&name, &self.prefix, instance, &self.extensions) {
                files.push(FileHandle::new(name, entry.path()));
            }
        }

        files.sort();
        Ok(files)
    }

    fn read_table(&self, handle: &FileHandle) -> ResultsResult<Table> {
        let content = fs::read_to_string(&handle.path)?;
        parse_table(&handle.name, &content)
    }
}

/// In-memory run files, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    prefix: String,
    extensions: Vec<String>,
    files: BTreeMap<String, Table>,
}

impl MemorySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extensions: vec!["jsonl".to_string(), "json".to_string()],
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.files.insert(name.into(), table);
    }

    pub fn with_file(mut self, name: impl Into<String>, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.files.remove(name)
    }
}

impl RunSource for MemorySource {
    fn enumerate_files(&self, instance: &InstanceId) -> ResultsResult<Vec<FileHandle>> {
        // BTreeMap keys are already in name order.
        Ok(self
            .files
            .keys()
            .filter(|name| matches_instance(name, &self.prefix, instance, &self.extensions))
            .map(|name| FileHandle::new(name.clone(), name.clone()))
            .collect())
    }

    fn read_table(&self, handle: &FileHandle) -> ResultsResult<Table> {
        self.files
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| {
                ResultsError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    handle.name.clone(),
                ))
            })
    }
}
