//! Where source files come from and how processed ones are disposed of.
//!
//! The import driver only sees the `FileSource` and `Deleter` traits, so a
//! synced cloud folder, a single file given on the command line, or an
//! in-memory fake in tests all look the same to it.

use bankfeed_core::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Opaque reference a `FileSource` hands out and a `Deleter` accepts back
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Handle for a filesystem path. `None` when the path is not valid
    /// UTF-8, since a lossy handle would point `FsDeleter` at another file.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.to_str().map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One source artifact: its handle, display name and raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub handle: FileHandle,
    pub name: String,
    pub content: String,
}

pub trait FileSource {
    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError>;
}

pub trait Deleter {
    fn delete(&self, handle: &FileHandle) -> Result<(), SourceError>;
}

/// Every file with the configured extension in one directory, by name order
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    extension: Option<String>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: Some("csv".to_string()),
        }
    }

    /// `None` accepts every regular file
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.map(|e| e.trim_start_matches('.').to_string());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn wants(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(want) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(want)),
        }
    }
}

impl FileSource for DirectorySource {
    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError> {
        let list_err = |source| SourceError::List {
            path: self.dir.clone(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(list_err)? {
            let path = entry.map_err(list_err)?.path();
            if path.is_file() && self.wants(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(handle) = FileHandle::from_path(&path) else {
                tracing::warn!(path = %path.display(), "skipping file with a non-UTF-8 path");
                continue;
            };
            // One unreadable file must not hide the others
            match fs::read_to_string(&path) {
                Ok(content) => files.push(SourceFile {
                    handle,
                    name: file_name(&path),
                    content,
                }),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file"),
            }
        }

        tracing::debug!(dir = %self.dir.display(), count = files.len(), "listed source files");
        Ok(files)
    }
}

/// A single filename + content pair supplied by the caller
#[derive(Debug, Clone)]
pub struct InlineSource {
    file: SourceFile,
}

impl InlineSource {
    pub fn new(handle: FileHandle, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file: SourceFile {
                handle,
                name: name.into(),
                content: content.into(),
            },
        }
    }

    /// Read `path` now; its path becomes the handle
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let read_err = |source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        };
        let handle = FileHandle::from_path(path).ok_or_else(|| {
            read_err(io::Error::new(io::ErrorKind::InvalidInput, "path is not valid UTF-8"))
        })?;
        let content = fs::read_to_string(path).map_err(read_err)?;
        Ok(Self::new(handle, file_name(path), content))
    }

    pub fn file(&self) -> &SourceFile {
        &self.file
    }
}

impl FileSource for InlineSource {
    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError> {
        Ok(vec![self.file.clone()])
    }
}

/// What happens to a file after its batch was accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposal {
    /// Remove the file
    #[default]
    Delete,
    /// Move it into a `.trash/` directory next to it
    Trash,
}

/// Disposes of files whose handles are filesystem paths
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDeleter {
    disposal: Disposal,
}

impl FsDeleter {
    pub const TRASH_DIR: &'static str = ".trash";

    pub fn new(disposal: Disposal) -> Self {
        Self { disposal }
    }

    fn trash(path: &Path) -> io::Result<PathBuf> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let trash_dir = parent.join(Self::TRASH_DIR);
        fs::create_dir_all(&trash_dir)?;

        let target = Self::free_trash_name(&trash_dir, &file_name(path));
        fs::rename(path, &target)?;
        Ok(target)
    }

    /// `name`, else `<stamp>-name`, else `<stamp>-<n>-name`. `rename`
    /// replaces an existing target, so the name must not be taken yet.
    fn free_trash_name(trash_dir: &Path, name: &str) -> PathBuf {
        let plain = trash_dir.join(name);
        if !plain.exists() {
            return plain;
        }

        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let stamped = trash_dir.join(format!("{stamp}-{name}"));
        if !stamped.exists() {
            return stamped;
        }

        (1u32..)
            .map(|n| trash_dir.join(format!("{stamp}-{n}-{name}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(stamped)
    }
}

impl Deleter for FsDeleter {
    fn delete(&self, handle: &FileHandle) -> Result<(), SourceError> {
        let path = PathBuf::from(handle.as_str());
        let dispose_err = |source| SourceError::Dispose {
            path: path.clone(),
            source,
        };

        match self.disposal {
            Disposal::Delete => {
                fs::remove_file(&path).map_err(dispose_err)?;
                tracing::info!(path = %path.display(), "deleted processed file");
            }
            Disposal::Trash => {
                let target = Self::trash(&path).map_err(dispose_err)?;
                tracing::info!(path = %path.display(), to = %target.display(), "trashed processed file");
            }
        }
        Ok(())
    }
}

/// Leaves every file where it is
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFiles;

impl Deleter for KeepFiles {
    fn delete(&self, handle: &FileHandle) -> Result<(), SourceError> {
        tracing::debug!(%handle, "keeping processed file");
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
