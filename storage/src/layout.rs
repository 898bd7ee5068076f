//! Bit-exact offsets of the on-disk structures.
//!
//! All multi-byte fields are read little-endian, which matches the hosts the
//! data files were produced on. No byte-order detection is attempted.

use crate::disk::location::Location;

/// Size of one namespace hash-table slot: hash + name + details region.
pub const NS_SLOT_SIZE: usize = NS_HASH_LEN + NS_NAME_LEN + NS_DETAILS_SIZE;
pub const NS_HASH_LEN: usize = 4;
pub const NS_NAME_LEN: usize = 128;
pub const NS_DETAILS_SIZE: usize = 496;
pub const NS_NAME_OFFSET: usize = NS_HASH_LEN;
pub const NS_DETAILS_OFFSET: usize = NS_HASH_LEN + NS_NAME_LEN;

pub const BUCKET_COUNT: usize = 19;

// namespace details prefix
pub const DETAILS_FIRST_EXTENT: usize = 0;
pub const DETAILS_LAST_EXTENT: usize = 8;
pub const DETAILS_BUCKETS: usize = 16;
pub const DETAILS_DATA_SIZE: usize = DETAILS_BUCKETS + BUCKET_COUNT * Location::SIZE;
pub const DETAILS_RECORD_COUNT: usize = DETAILS_DATA_SIZE + 8;
pub const DETAILS_LAST_EXTENT_SIZE: usize = DETAILS_RECORD_COUNT + 8;
pub const DETAILS_INDEX_COUNT: usize = DETAILS_LAST_EXTENT_SIZE + 4;
pub const DETAILS_PREFIX_LEN: usize = DETAILS_INDEX_COUNT + 4;

/// Every numbered data file starts with this preamble before its first extent.
pub const DATA_FILE_HEADER_LEN: usize = 8192;
pub const FILE_HEADER_VERSION: usize = 0;
pub const FILE_HEADER_VERSION_MINOR: usize = 4;
pub const FILE_HEADER_FILE_LENGTH: usize = 8;
pub const FILE_HEADER_UNUSED: usize = 12;
pub const FILE_HEADER_UNUSED_LENGTH: usize = 20;

pub const EXTENT_MAGIC: u32 = 0x4142_4344;
pub const EXTENT_HEADER_LEN: usize = 176;
pub const EXTENT_MAGIC_OFFSET: usize = 0;
pub const EXTENT_MY_LOC: usize = 4;
pub const EXTENT_NEXT: usize = 12;
pub const EXTENT_PREV: usize = 20;
pub const EXTENT_NAMESPACE: usize = 28;
pub const EXTENT_LENGTH: usize = EXTENT_NAMESPACE + NS_NAME_LEN;
pub const EXTENT_FIRST_RECORD: usize = 160;
pub const EXTENT_LAST_RECORD: usize = 168;

pub const RECORD_HEADER_LEN: usize = 16;
pub const RECORD_LENGTH: usize = 0;
pub const RECORD_EXTENT_OFFSET: usize = 4;
pub const RECORD_NEXT_OFFSET: usize = 8;
pub const RECORD_PREV_OFFSET: usize = 12;

/// Smallest well-formed document: length prefix plus terminator.
pub const MIN_DOCUMENT_LEN: usize = 5;

pub fn read_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub fn read_i64(buf: &[u8], off: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    i64::from_le_bytes(raw)
}

/// Bytes of a fixed-width name field up to its first NUL.
pub fn trim_name(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}
