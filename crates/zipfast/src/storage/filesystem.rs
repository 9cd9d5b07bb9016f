use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StorageError;

/// The two working directories of the service: raw uploads and compressed
/// results. Every file the service writes lives directly inside one of them.
#[derive(Debug, Clone)]
pub struct FileStorage {
    upload_directory: PathBuf,
    compressed_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        upload_directory: P,
        compressed_directory: Q,
    ) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
            compressed_directory: compressed_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    pub fn compressed_directory(&self) -> &Path {
        &self.compressed_directory
    }

    /// Creates both directories if they are missing.
    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        ensure_directory(&self.upload_directory)?;
        ensure_directory(&self.compressed_directory)
    }

    /// Destination for an upload: `<external_id><.ext>` keeping the client's
    /// extension so the media kind stays visible on disk.
    pub fn upload_path(&self, external_id: &str, original_name: &str) -> PathBuf {
        let extension = Path::new(original_name).extension().and_then(|e| e.to_str());
        let filename = match extension {
            Some(ext) => format!("{}.{}", external_id, ext),
            None => external_id.to_string(),
        };
        self.upload_directory.join(filename)
    }

    /// A fresh, unique path in the compressed directory with `extension`.
    pub fn result_path(&self, extension: &str) -> PathBuf {
        self.compressed_directory
            .join(format!("{}.{}", Uuid::new_v4(), extension))
    }

    /// Removes a file. A file that is already gone is not an error.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
