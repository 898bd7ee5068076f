use crate::catalog::details::NamespaceDetails;
use crate::disk::file_set::MappedFileSet;
use crate::disk::location::Location;
use crate::error::{Result, StoreError};
use crate::layout::{
    EXTENT_FIRST_RECORD, EXTENT_HEADER_LEN, EXTENT_LAST_RECORD, EXTENT_LENGTH, EXTENT_MAGIC,
    EXTENT_MAGIC_OFFSET, EXTENT_MY_LOC, EXTENT_NAMESPACE, EXTENT_NEXT, EXTENT_PREV, read_i32,
    read_u32, trim_name,
};
use std::collections::HashSet;

/// A validated extent header.
#[derive(Clone, Copy)]
pub struct Extent<'a> {
    location: Location,
    header: &'a [u8],
}

impl<'a> Extent<'a> {
    pub fn location(&self) -> Location {
        self.location
    }

    pub fn magic(&self) -> u32 {
        read_u32(self.header, EXTENT_MAGIC_OFFSET)
    }

    /// The extent's own location as recorded in its header.
    pub fn my_loc(&self) -> Location {
        Location::decode(self.header, EXTENT_MY_LOC)
    }

    pub fn next(&self) -> Location {
        Location::decode(self.header, EXTENT_NEXT)
    }

    pub fn prev(&self) -> Location {
        Location::decode(self.header, EXTENT_PREV)
    }

    pub fn namespace(&self) -> &'a [u8] {
        trim_name(&self.header[EXTENT_NAMESPACE..EXTENT_LENGTH])
    }

    pub fn length(&self) -> i32 {
        read_i32(self.header, EXTENT_LENGTH)
    }

    pub fn first_record(&self) -> Location {
        Location::decode(self.header, EXTENT_FIRST_RECORD)
    }

    pub fn last_record(&self) -> Location {
        Location::decode(self.header, EXTENT_LAST_RECORD)
    }
}

impl std::fmt::Debug for Extent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extent")
            .field("location", &self.location)
            .field("namespace", &String::from_utf8_lossy(self.namespace()))
            .field("length", &self.length())
            .field("next", &self.next())
            .finish()
    }
}

/// Follows a namespace's live extent list. Any structural problem is a hard
/// error; this path is for intact data.
#[derive(Clone, Copy, Debug)]
pub struct ExtentWalker<'a> {
    files: &'a MappedFileSet,
}

impl<'a> ExtentWalker<'a> {
    pub fn new(files: &'a MappedFileSet) -> Self {
        Self { files }
    }

    pub fn load(&self, location: Location) -> Result<Extent<'a>> {
        let header = self.files.resolve_range(location, EXTENT_HEADER_LEN)?;
        let extent = Extent { location, header };
        if extent.magic() != EXTENT_MAGIC {
            return Err(StoreError::CorruptFormat(format!(
                "no extent magic at {:?} (found {:#010x})",
                location,
                extent.magic()
            )));
        }
        Ok(extent)
    }

    pub fn first_extent(&self, details: &NamespaceDetails) -> Result<Extent<'a>> {
        if details.first_extent.is_null() {
            return Err(StoreError::NotFound("namespace has no extents".into()));
        }
        self.load(details.first_extent)
    }

    pub fn next_extent(&self, extent: &Extent<'_>) -> Result<Extent<'a>> {
        let next = extent.next();
        if next.is_null() {
            return Err(StoreError::NotFound(format!(
                "end of extent list after {:?}",
                extent.location()
            )));
        }
        self.load(next)
    }

    pub fn extents(&self, details: &NamespaceDetails) -> Extents<'a> {
        Extents {
            walker: *self,
            next: (!details.first_extent.is_null()).then_some(details.first_extent),
            visited: HashSet::new(),
        }
    }
}

/// Iterator over an extent list. Yields at most one error, then stops.
pub struct Extents<'a> {
    walker: ExtentWalker<'a>,
    next: Option<Location>,
    visited: HashSet<Location>,
}

impl<'a> Iterator for Extents<'a> {
    type Item = Result<Extent<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let location = self.next.take()?;
        if !self.visited.insert(location) {
            return Some(Err(StoreError::CorruptFormat(format!(
                "extent list revisits {:?}",
                location
            ))));
        }
        match self.walker.load(location) {
            Ok(extent) => {
                let next = extent.next();
                self.next = (!next.is_null()).then_some(next);
                Some(Ok(extent))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
