use crate::disk::file_header::DataFileHeader;
use crate::disk::location::Location;
use crate::disk::mapped_file::MappedFile;
use crate::error::{Result, StoreError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The namespace file and the numbered data files of one database, all mapped
/// read-only for the lifetime of the set.
#[derive(Debug)]
pub struct MappedFileSet {
    dbpath: PathBuf,
    name: String,
    namespace: MappedFile,
    data: Vec<MappedFile>,
}

impl MappedFileSet {
    /// Maps `<dbpath>/<name>.ns`, then `<name>.0`, `<name>.1`, ... up to the
    /// first file that is missing or cannot be opened.
    pub fn open<P: AsRef<Path>>(dbpath: P, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(StoreError::InvalidArgument(format!(
                "database name {:?}",
                name
            )));
        }
        let dbpath = dbpath.as_ref().to_path_buf();

        let ns_path = dbpath.join(format!("{}.ns", name));
        let ns_file = File::open(&ns_path)
            .map_err(|_| StoreError::NotFound(format!("namespace file {:?}", ns_path)))?;
        let namespace = MappedFile::map(ns_file, &ns_path, Location::NULL_FILE).map_err(
            |source| StoreError::Io {
                path: ns_path.clone(),
                source,
            },
        )?;

        let mut data = Vec::new();
        for file_number in 0i32.. {
            let path = dbpath.join(format!("{}.{}", name, file_number));
            let Ok(file) = File::open(&path) else {
                break;
            };
            let mapped = MappedFile::map(file, &path, file_number)
                .map_err(|source| StoreError::Io { path, source })?;
            debug!(file_number, len = mapped.len(), "mapped data file");
            data.push(mapped);
        }

        Ok(Self {
            dbpath,
            name: name.to_string(),
            namespace,
            data,
        })
    }

    pub fn dbpath(&self) -> &Path {
        &self.dbpath
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace_file(&self) -> &MappedFile {
        &self.namespace
    }

    pub fn data_files(&self) -> &[MappedFile] {
        &self.data
    }

    pub fn file(&self, file_number: i32) -> Option<&MappedFile> {
        usize::try_from(file_number)
            .ok()
            .and_then(|idx| self.data.get(idx))
    }

    pub fn total_data_len(&self) -> usize {
        self.data.iter().map(MappedFile::len).sum()
    }

    /// Bytes from `location` to the end of its file.
    pub fn resolve(&self, location: Location) -> Result<&[u8]> {
        if location.is_null() {
            return Err(StoreError::NotFound(format!(
                "absent location {:?}",
                location
            )));
        }
        let file = self
            .file(location.file)
            .ok_or(StoreError::OutOfRange { location, len: 0 })?;
        let bytes = file.bytes();
        match usize::try_from(location.offset) {
            Ok(offset) if offset < bytes.len() => Ok(&bytes[offset..]),
            _ => Err(StoreError::OutOfRange {
                location,
                len: bytes.len(),
            }),
        }
    }

    /// Exactly `len` bytes starting at `location`, or `OutOfRange` if the file
    /// ends first.
    pub fn resolve_range(&self, location: Location, len: usize) -> Result<&[u8]> {
        let tail = self.resolve(location)?;
        if tail.len() < len {
            return Err(StoreError::OutOfRange {
                location,
                len: self.file(location.file).map_or(0, MappedFile::len),
            });
        }
        Ok(&tail[..len])
    }

    pub fn data_file_header(&self, file_number: i32) -> Result<DataFileHeader> {
        let file = self.file(file_number).ok_or_else(|| {
            StoreError::NotFound(format!("data file {}.{}", self.name, file_number))
        })?;
        DataFileHeader::decode(file.bytes())
    }
}
