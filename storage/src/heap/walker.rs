use crate::disk::file_set::MappedFileSet;
use crate::disk::location::Location;
use crate::error::{Result, StoreError};
use crate::heap::extent::Extent;
use crate::heap::record::{Record, RecordLocator};
use std::collections::HashSet;

/// Follows the live record list of an extent through the `next_offset`
/// fields. Never reads the free-list interpretation of a header.
#[derive(Clone, Copy, Debug)]
pub struct RecordWalker<'a> {
    locator: RecordLocator<'a>,
}

impl<'a> RecordWalker<'a> {
    pub fn new(files: &'a MappedFileSet) -> Self {
        Self {
            locator: RecordLocator::new(files),
        }
    }

    pub fn first_record(&self, extent: &Extent<'_>) -> Result<Record<'a>> {
        let first = extent.first_record();
        if first.is_null() {
            return Err(StoreError::NotFound(format!(
                "extent at {:?} has no records",
                extent.location()
            )));
        }
        if first.offset < 0 {
            return Err(StoreError::CorruptFormat(format!(
                "extent at {:?} has first record offset {}",
                extent.location(),
                first.offset
            )));
        }
        self.locator
            .locate(Location::new(extent.location().file, first.offset))
    }

    pub fn next_record(&self, record: &Record<'_>) -> Result<Record<'a>> {
        let next_offset = record.live_links().next_offset;
        if next_offset < 0 {
            return Err(StoreError::NotFound(format!(
                "end of record list after {:?}",
                record.location()
            )));
        }
        self.locator
            .locate(Location::new(record.location().file, next_offset))
    }

    pub fn records(&self, extent: &Extent<'_>) -> Records<'a> {
        let next = match self.first_record(extent) {
            Ok(record) => Some(Ok(record)),
            Err(err) if err.is_not_found() => None,
            Err(err) => Some(Err(err)),
        };
        Records {
            walker: *self,
            next,
            visited: HashSet::new(),
        }
    }
}

/// Iterator over an extent's live records. Yields at most one error, then stops.
pub struct Records<'a> {
    walker: RecordWalker<'a>,
    next: Option<Result<Record<'a>>>,
    visited: HashSet<Location>,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.next.take()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err)),
        };
        if !self.visited.insert(record.location()) {
            return Some(Err(StoreError::CorruptFormat(format!(
                "record list revisits {:?}",
                record.location()
            ))));
        }
        self.next = match self.walker.next_record(&record) {
            Ok(next) => Some(Ok(next)),
            Err(err) if err.is_not_found() => None,
            Err(err) => Some(Err(err)),
        };
        Some(Ok(record))
    }
}
