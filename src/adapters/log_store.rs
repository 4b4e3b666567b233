//! Flash filesystem log store.
//!
//! Implements [`LogStorePort`] on top of `std::fs`.  On ESP-IDF the data
//! partition is mounted through the VFS (SPIFFS at [`DATA_MOUNT_POINT`]),
//! so the same code runs on the device and on the host, where tests point
//! it at a temporary directory.
//!
//! Each append opens, writes, and closes the file.  A power cut can at
//! worst truncate the last line, which [`logbook::records`] skips.
//!
//! [`logbook::records`]: crate::logbook::records

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use log::{debug, info};

use crate::app::ports::LogStorePort;
use crate::error::StorageError;
use crate::logbook::{LogRecord, LOG_FILE_NAME};

/// VFS mount point of the data partition.
pub const DATA_MOUNT_POINT: &str = "/spiffs";

fn map_io(e: &io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => StorageError::Unavailable,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::Io,
    }
}

pub struct FileLogStore {
    root: PathBuf,
    path: PathBuf,
}

impl FileLogStore {
    /// Log file `log.csv` inside `dir`; `dir` is also the root the web UI
    /// files are served from.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let root = dir.as_ref().to_path_buf();
        Self {
            path: root.join(LOG_FILE_NAME),
            root,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStorePort for FileLogStore {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| map_io(&e))?;
        write!(file, "{record}").map_err(|e| map_io(&e))?;
        debug!("LogStore: appended {}", record.to_string().trim_end());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("LogStore: {} removed", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(&e)),
        }
    }

    fn read_all(&self) -> Result<String, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(map_io(&e)),
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let rel = Path::new(path);
        if rel.is_absolute() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StorageError::Unavailable);
        }
        fs::read(self.root.join(rel)).map_err(|e| map_io(&e))
    }
}

/// Register the SPIFFS data partition with the VFS at [`DATA_MOUNT_POINT`].
#[cfg(target_os = "espidf")]
pub fn mount_data_partition() -> crate::error::Result<()> {
    use esp_idf_svc::sys::*;

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: `conf` and the static path string outlive the call.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK as i32 {
        return Err(crate::error::Error::Storage(StorageError::Unavailable));
    }
    info!("LogStore: data partition mounted at {}", DATA_MOUNT_POINT);
    Ok(())
}
