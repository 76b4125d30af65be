use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::range_reader::check_range;
use super::RangeReader;
use crate::error::IoError;

type SharedFile = Arc<Mutex<File>>;

/// Local-file implementation of RangeReader.
///
/// The file size is read once on open. Reads run on tokio's blocking pool.
/// After [`FileRangeReader::close`] the handle is released and every read fails
/// with [`IoError::Closed`]; reads already in flight finish on their own clone
/// of the handle.
#[derive(Debug)]
pub struct FileRangeReader {
    file: RwLock<Option<SharedFile>>,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open a file for range reads.
    ///
    /// Returns `IoError::NotFound` if the path does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let opened = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<(File, u64)> {
                let file = File::open(&path)?;
                let size = file.metadata()?.len();
                Ok((file, size))
            })
            .await
            .map_err(|e| IoError::Io(e.to_string()))?
        };

        let (file, size) = opened.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(identifier.clone()),
            _ => IoError::from(e),
        })?;

        Ok(Self {
            file: RwLock::new(Some(Arc::new(Mutex::new(file)))),
            path,
            size,
            identifier,
        })
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file handle. Safe to call more than once.
    pub fn close(&self) {
        let mut guard = match self.file.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    /// Whether [`FileRangeReader::close`] has been called.
    pub fn is_closed(&self) -> bool {
        match self.file.read() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    fn handle(&self) -> Result<SharedFile, IoError> {
        let guard = match self.file.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| IoError::Closed(self.identifier.clone()))
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let file = self.handle()?;
        check_range(offset, len, self.size)?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        tokio::task::spawn_blocking(move || -> Result<Bytes, IoError> {
            let mut file = file
                .lock()
                .map_err(|_| IoError::Io("file lock poisoned".to_string()))?;
            file.seek(SeekFrom::Start(offset))?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| IoError::Io(e.to_string()))?
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
