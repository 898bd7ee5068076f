use crate::disk::location::Location;
use crate::error::{Result, StoreError};
use crate::layout::{
    DATA_FILE_HEADER_LEN, FILE_HEADER_FILE_LENGTH, FILE_HEADER_UNUSED, FILE_HEADER_UNUSED_LENGTH,
    FILE_HEADER_VERSION, FILE_HEADER_VERSION_MINOR, read_i32,
};

/// Leading fields of the fixed preamble of a numbered data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DataFileHeader {
    pub version: i32,
    pub version_minor: i32,
    pub file_length: i32,
    pub unused: Location,
    pub unused_length: i32,
}

impl DataFileHeader {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_FILE_HEADER_LEN {
            return Err(StoreError::CorruptFormat(format!(
                "data file is {} bytes, shorter than its {} byte preamble",
                buf.len(),
                DATA_FILE_HEADER_LEN
            )));
        }
        Ok(Self {
            version: read_i32(buf, FILE_HEADER_VERSION),
            version_minor: read_i32(buf, FILE_HEADER_VERSION_MINOR),
            file_length: read_i32(buf, FILE_HEADER_FILE_LENGTH),
            unused: Location::decode(buf, FILE_HEADER_UNUSED),
            unused_length: read_i32(buf, FILE_HEADER_UNUSED_LENGTH),
        })
    }
}
