use crate::disk::location::Location;
use crate::error::{Result, StoreError};
use crate::layout::{
    BUCKET_COUNT, DETAILS_BUCKETS, DETAILS_DATA_SIZE, DETAILS_FIRST_EXTENT, DETAILS_INDEX_COUNT,
    DETAILS_LAST_EXTENT, DETAILS_LAST_EXTENT_SIZE, DETAILS_PREFIX_LEN, DETAILS_RECORD_COUNT,
    read_i32, read_i64,
};

/// The traversal-relevant prefix of a namespace's details region.
///
/// Only the first 192 bytes of the 496-byte region are decoded. The index
/// descriptors and bookkeeping that follow are not modeled, so nothing here
/// may be extended to read past `DETAILS_PREFIX_LEN` without first defining
/// that layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NamespaceDetails {
    pub first_extent: Location,
    pub last_extent: Location,
    /// Free-list heads, one per allocation size class.
    pub buckets: [Location; BUCKET_COUNT],
    pub data_size: i64,
    pub record_count: i64,
    pub last_extent_size: i32,
    pub index_count: i32,
}

impl NamespaceDetails {
    pub fn decode(blob: &[u8]) -> Result<Self> {
        if blob.len() < DETAILS_PREFIX_LEN {
            return Err(StoreError::CorruptFormat(format!(
                "namespace details region is {} bytes, need {}",
                blob.len(),
                DETAILS_PREFIX_LEN
            )));
        }

        let mut buckets = [Location::NULL; BUCKET_COUNT];
        for (i, bucket) in buckets.iter_mut().enumerate() {
            *bucket = Location::decode(blob, DETAILS_BUCKETS + i * Location::SIZE);
        }

        Ok(Self {
            first_extent: Location::decode(blob, DETAILS_FIRST_EXTENT),
            last_extent: Location::decode(blob, DETAILS_LAST_EXTENT),
            buckets,
            data_size: read_i64(blob, DETAILS_DATA_SIZE),
            record_count: read_i64(blob, DETAILS_RECORD_COUNT),
            last_extent_size: read_i32(blob, DETAILS_LAST_EXTENT_SIZE),
            index_count: read_i32(blob, DETAILS_INDEX_COUNT),
        })
    }

    /// Buckets whose head is not the absent sentinel.
    pub fn occupied_buckets(&self) -> impl Iterator<Item = (usize, Location)> + '_ {
        self.buckets
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, head)| !head.is_null())
    }
}
