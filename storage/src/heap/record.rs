use crate::disk::file_set::MappedFileSet;
use crate::disk::location::Location;
use crate::error::{Result, StoreError};
use crate::layout::{
    MIN_DOCUMENT_LEN, RECORD_EXTENT_OFFSET, RECORD_HEADER_LEN, RECORD_LENGTH, RECORD_NEXT_OFFSET,
    RECORD_PREV_OFFSET, read_i32,
};

/// Neighbour offsets of a record on its extent's live list, in the same file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveLinks {
    pub next_offset: i32,
    pub prev_offset: i32,
}

/// A record header and the bytes after it, up to the end of the file.
///
/// The last two header fields are ambiguous on disk: a record on an extent's
/// live list stores neighbour offsets there, while a deleted record sitting in
/// a free-list bucket stores the location of the next free record. The caller
/// knows which list it is walking and picks `live_links` or `free_link`.
#[derive(Clone, Copy)]
pub struct Record<'a> {
    location: Location,
    tail: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn location(&self) -> Location {
        self.location
    }

    /// Total allocation length, header included.
    pub fn length(&self) -> i32 {
        read_i32(self.tail, RECORD_LENGTH)
    }

    pub fn extent_offset(&self) -> i32 {
        read_i32(self.tail, RECORD_EXTENT_OFFSET)
    }

    pub fn live_links(&self) -> LiveLinks {
        LiveLinks {
            next_offset: read_i32(self.tail, RECORD_NEXT_OFFSET),
            prev_offset: read_i32(self.tail, RECORD_PREV_OFFSET),
        }
    }

    /// Next free record in the bucket chain: the `next` field holds its file
    /// number and the `prev` field its offset.
    pub fn free_link(&self) -> Location {
        Location::new(
            read_i32(self.tail, RECORD_NEXT_OFFSET),
            read_i32(self.tail, RECORD_PREV_OFFSET),
        )
    }

    pub fn payload_len(&self) -> Result<usize> {
        let length = self.length();
        length
            .checked_sub(RECORD_HEADER_LEN as i32)
            .and_then(|len| usize::try_from(len).ok())
            .ok_or_else(|| {
                StoreError::CorruptFormat(format!(
                    "record at {:?} has length {}, smaller than its header",
                    self.location, length
                ))
            })
    }

    /// The embedded document region, `length - 16` bytes after the header.
    pub fn payload(&self) -> Result<&'a [u8]> {
        let len = self.payload_len()?;
        RECORD_HEADER_LEN
            .checked_add(len)
            .and_then(|end| self.tail.get(RECORD_HEADER_LEN..end))
            .ok_or(StoreError::OutOfRange {
                location: self.location,
                len: self.file_len(),
            })
    }

    /// The document as bounded by its own length prefix, for intact records.
    pub fn document(&self) -> Result<&'a [u8]> {
        let payload = self.payload()?;
        if payload.len() < MIN_DOCUMENT_LEN {
            return Err(StoreError::CorruptFormat(format!(
                "record at {:?} is too short for a document",
                self.location
            )));
        }
        let declared = read_i32(payload, 0);
        match usize::try_from(declared) {
            Ok(len) if (MIN_DOCUMENT_LEN..=payload.len()).contains(&len) => Ok(&payload[..len]),
            _ => Err(StoreError::CorruptFormat(format!(
                "record at {:?} declares a {} byte document in {} bytes",
                self.location,
                declared,
                payload.len()
            ))),
        }
    }

    fn file_len(&self) -> usize {
        self.location.offset as usize + self.tail.len()
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("location", &self.location)
            .field("length", &self.length())
            .field("extent_offset", &self.extent_offset())
            .finish()
    }
}

/// Resolves locations to record headers through a file set.
#[derive(Clone, Copy, Debug)]
pub struct RecordLocator<'a> {
    files: &'a MappedFileSet,
}

impl<'a> RecordLocator<'a> {
    pub fn new(files: &'a MappedFileSet) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &'a MappedFileSet {
        self.files
    }

    /// Only checks that a whole header is mapped at `location`; the header's
    /// contents are the caller's to interpret.
    pub fn locate(&self, location: Location) -> Result<Record<'a>> {
        let tail = self.files.resolve(location)?;
        if tail.len() < RECORD_HEADER_LEN {
            return Err(StoreError::OutOfRange {
                location,
                len: location.offset as usize + tail.len(),
            });
        }
        Ok(Record { location, tail })
    }
}
