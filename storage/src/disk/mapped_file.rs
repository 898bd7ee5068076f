use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A read-only mapping of one on-disk file.
///
/// The file handle stays open alongside the mapping. Empty files are kept
/// without a mapping; their view is the empty slice.
pub struct MappedFile {
    file_number: i32,
    path: PathBuf,
    file: File,
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn map(file: File, path: &Path, file_number: i32) -> std::io::Result<Self> {
        let len = file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only and the storage directory is
            // assumed quiescent while the set is alive.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self {
            file_number,
            path: path.to_path_buf(),
            file,
            map,
        })
    }

    pub fn file_number(&self) -> i32 {
        self.file_number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.map {
            Some(map) => map,
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("file_number", &self.file_number)
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}
