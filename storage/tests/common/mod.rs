#![allow(dead_code)]

use std::fs;
use std::path::Path;
use storage::Location;
use storage::layout::{
    BUCKET_COUNT, DATA_FILE_HEADER_LEN, EXTENT_HEADER_LEN, EXTENT_MAGIC, NS_DETAILS_OFFSET,
    NS_SLOT_SIZE, RECORD_HEADER_LEN,
};

pub const DATA_FILE_LEN: usize = 64 * 1024;

/// Prefix fields written into a namespace slot's details region.
#[derive(Clone, Copy, Debug)]
pub struct Details {
    pub first_extent: Location,
    pub last_extent: Location,
    pub buckets: [Location; BUCKET_COUNT],
    pub data_size: i64,
    pub record_count: i64,
    pub index_count: i32,
}

impl Default for Details {
    fn default() -> Self {
        Self {
            first_extent: Location::NULL,
            last_extent: Location::NULL,
            buckets: [Location::NULL; BUCKET_COUNT],
            data_size: 0,
            record_count: 0,
            index_count: 0,
        }
    }
}

impl Details {
    pub fn with_bucket(mut self, bucket: usize, head: Location) -> Self {
        self.buckets[bucket] = head;
        self
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ExtentFields<'n> {
    pub namespace: &'n str,
    pub next: Location,
    pub prev: Location,
    pub length: i32,
    pub first_record: Location,
    pub last_record: Location,
}

/// Builds a storage directory image in memory, byte by byte.
pub struct DbBuilder {
    ns: Vec<u8>,
    files: Vec<Vec<u8>>,
}

impl DbBuilder {
    pub fn new(slot_count: usize) -> Self {
        Self {
            ns: vec![0u8; slot_count * NS_SLOT_SIZE],
            files: Vec::new(),
        }
    }

    pub fn data_file(&mut self, len: usize) -> i32 {
        let mut file = vec![0u8; len.max(DATA_FILE_HEADER_LEN)];
        file[0..4].copy_from_slice(&4i32.to_le_bytes());
        file[4..8].copy_from_slice(&5i32.to_le_bytes());
        let file_len = file.len() as i32;
        file[8..12].copy_from_slice(&file_len.to_le_bytes());
        file[12..20].copy_from_slice(&Location::NULL.encode());
        self.files.push(file);
        (self.files.len() - 1) as i32
    }

    pub fn namespace(&mut self, slot: usize, name: &str, details: &Details) -> &mut Self {
        let base = slot * NS_SLOT_SIZE;
        self.ns[base..base + 4].copy_from_slice(&(name.len() as i32 * 7919).to_le_bytes());
        self.ns[base + 4..base + 4 + name.len()].copy_from_slice(name.as_bytes());

        let d = base + NS_DETAILS_OFFSET;
        self.ns[d..d + 8].copy_from_slice(&details.first_extent.encode());
        self.ns[d + 8..d + 16].copy_from_slice(&details.last_extent.encode());
        for (i, head) in details.buckets.iter().enumerate() {
            let off = d + 16 + i * 8;
            self.ns[off..off + 8].copy_from_slice(&head.encode());
        }
        self.ns[d + 168..d + 176].copy_from_slice(&details.data_size.to_le_bytes());
        self.ns[d + 176..d + 184].copy_from_slice(&details.record_count.to_le_bytes());
        self.ns[d + 188..d + 192].copy_from_slice(&details.index_count.to_le_bytes());
        self
    }

    pub fn poke(&mut self, at: Location, bytes: &[u8]) -> &mut Self {
        let file = &mut self.files[at.file as usize];
        let off = at.offset as usize;
        file[off..off + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn record(&mut self, at: Location, length: i32, next: i32, prev: i32, payload: &[u8]) -> &mut Self {
        let mut bytes = Vec::with_capacity(RECORD_HEADER_LEN + payload.len());
        bytes.extend_from_slice(&length.to_le_bytes());
        bytes.extend_from_slice(&(DATA_FILE_HEADER_LEN as i32).to_le_bytes());
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(&prev.to_le_bytes());
        bytes.extend_from_slice(payload);
        self.poke(at, &bytes)
    }

    /// A deleted record whose trailing header fields link to `next_free`.
    pub fn free_record(&mut self, at: Location, payload: &[u8], next_free: Location) -> &mut Self {
        let length = (RECORD_HEADER_LEN + payload.len()) as i32;
        self.record(at, length, next_free.file, next_free.offset, payload)
    }

    pub fn extent(&mut self, at: Location, fields: ExtentFields<'_>) -> &mut Self {
        let mut bytes = vec![0u8; EXTENT_HEADER_LEN];
        bytes[0..4].copy_from_slice(&EXTENT_MAGIC.to_le_bytes());
        bytes[4..12].copy_from_slice(&at.encode());
        bytes[12..20].copy_from_slice(&fields.next.encode());
        bytes[20..28].copy_from_slice(&fields.prev.encode());
        bytes[28..28 + fields.namespace.len()].copy_from_slice(fields.namespace.as_bytes());
        bytes[156..160].copy_from_slice(&fields.length.to_le_bytes());
        bytes[160..168].copy_from_slice(&fields.first_record.encode());
        bytes[168..176].copy_from_slice(&fields.last_record.encode());
        self.poke(at, &bytes)
    }

    pub fn write(&self, dir: &Path, name: &str) -> std::io::Result<()> {
        fs::write(dir.join(format!("{}.ns", name)), &self.ns)?;
        for (i, file) in self.files.iter().enumerate() {
            fs::write(dir.join(format!("{}.{}", name, i)), file)?;
        }
        Ok(())
    }
}

pub fn bson_bytes(doc: &bson::Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.to_writer(&mut out).unwrap();
    out
}
