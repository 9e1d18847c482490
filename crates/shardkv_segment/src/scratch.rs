//! Scratch space for staging serialized indexes.
//!
//! The writer buffers every serialized tree to a staged file instead of
//! holding the whole index in memory. The scratch space directory is owned
//! by a single writer invocation:
//!
//! ```text
//! <scratch_space>/
//! ├─ primary      # serialized primary index
//! └─ secondary    # all serialized secondary indexes, back to back
//! ```
//!
//! A directory left behind by a crash mid-build holds nothing worth keeping,
//! so [`ScratchSpace::acquire`] wipes it and starts over.

use crate::error::{SegmentError, SegmentResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// An exclusively owned, initially empty staging directory.
///
/// Dropping the scratch space removes the directory on a best-effort basis.
/// Call [`ScratchSpace::release`] on the success path to get cleanup errors
/// reported.
#[derive(Debug)]
pub struct ScratchSpace {
    path: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl ScratchSpace {
    /// Creates an empty scratch space at `path`, removing whatever a
    /// previous, unterminated run left there.
    ///
    /// # Errors
    ///
    /// Returns an error if the stale directory cannot be removed or the new
    /// one cannot be created.
    pub fn acquire(path: &Path) -> SegmentResult<Self> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => {
                warn!(
                    scratch_space = %path.display(),
                    "discarding scratch space left by an unterminated index build"
                );
                let removed = if metadata.is_dir() {
                    fs::remove_dir_all(path)
                } else {
                    fs::remove_file(path)
                };
                removed.map_err(|e| {
                    error!(scratch_space = %path.display(), error = %e, "removing stale scratch space failed");
                    SegmentError::scratch(path, "clean up previous", e)
                })?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(scratch_space = %path.display(), error = %e, "checking scratch space failed");
                return Err(SegmentError::scratch(path, "check", e));
            }
        }

        fs::create_dir_all(path).map_err(|e| {
            error!(scratch_space = %path.display(), error = %e, "creating scratch space failed");
            SegmentError::scratch(path, "create", e)
        })?;

        debug!(scratch_space = %path.display(), "acquired scratch space");

        Ok(Self {
            path: path.to_path_buf(),
            files: Vec::new(),
            released: false,
        })
    }

    /// Returns the scratch space directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates a buffered staged file inside the scratch space.
    pub fn create_file(&mut self, name: &str) -> SegmentResult<StagedFile> {
        let path = self.path.join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| SegmentError::scratch(&path, "create staged file", e))?;

        self.files.push(path.clone());

        Ok(StagedFile {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Removes every staged file and then the directory itself.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure. The drop handler still makes a
    /// best-effort attempt afterwards.
    pub fn release(mut self) -> SegmentResult<()> {
        for file in std::mem::take(&mut self.files) {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(SegmentError::scratch(file, "remove staged file", e)),
            }
        }

        fs::remove_dir_all(&self.path)
            .map_err(|e| SegmentError::scratch(&self.path, "remove", e))?;

        self.released = true;
        debug!(scratch_space = %self.path.display(), "released scratch space");
        Ok(())
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(scratch_space = %self.path.display(), error = %e, "abandoned scratch space could not be removed");
            }
        }
    }
}

/// A file in the scratch space being written through a buffer.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl StagedFile {
    /// Path of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the buffer and rewinds the file for reading.
    pub fn finish(self) -> SegmentResult<File> {
        let path = self.path;
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| SegmentError::scratch(&path, "flush staged file", e.into_error()))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| SegmentError::scratch(&path, "rewind staged file", e))?;
        Ok(file)
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_empty_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("scratch");

        let scratch = ScratchSpace::acquire(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(fs::read_dir(&path).unwrap().count(), 0);
        scratch.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn acquire_discards_stale_contents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("scratch");
        fs::create_dir_all(path.join("nested")).unwrap();
        fs::write(path.join("primary"), b"half written").unwrap();
        fs::write(path.join("nested").join("junk"), b"junk").unwrap();

        let scratch = ScratchSpace::acquire(&path).unwrap();
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn acquire_replaces_stray_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("scratch");
        fs::write(&path, b"not a directory").unwrap();

        let scratch = ScratchSpace::acquire(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
        scratch.release().unwrap();
    }

    #[test]
    fn staged_file_round_trip() {
        let temp = tempdir().unwrap();
        let mut scratch = ScratchSpace::acquire(&temp.path().join("scratch")).unwrap();

        let mut staged = scratch.create_file("primary").unwrap();
        staged.write_all(b"hello index").unwrap();
        let mut file = staged.finish().unwrap();

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello index");

        drop(file);
        scratch.release().unwrap();
    }

    #[test]
    fn drop_removes_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("scratch");
        {
            let mut scratch = ScratchSpace::acquire(&path).unwrap();
            let _staged = scratch.create_file("secondary").unwrap();
        }
        assert!(!path.exists());
    }
}
