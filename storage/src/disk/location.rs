use std::fmt;

/// A (file number, byte offset) pair addressing a byte anywhere in a file set.
///
/// A file number of `-1` is the absent sentinel and is never dereferenced.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Location {
    pub file: i32,
    pub offset: i32,
}

impl Location {
    pub const SIZE: usize = 8;
    pub const NULL_FILE: i32 = -1;
    pub const NULL: Location = Location {
        file: Self::NULL_FILE,
        offset: 0,
    };

    pub fn new(file: i32, offset: i32) -> Self {
        Self { file, offset }
    }

    pub fn decode(buf: &[u8], off: usize) -> Self {
        Self {
            file: crate::layout::read_i32(buf, off),
            offset: crate::layout::read_i32(buf, off + 4),
        }
    }

    pub fn encode(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.file.to_le_bytes());
        out[4..].copy_from_slice(&self.offset.to_le_bytes());
        out
    }

    pub fn is_null(self) -> bool {
        self.file == Self::NULL_FILE
    }

    /// Terminator test for free-list chains, which also treat offset 0 as the end.
    pub fn ends_free_chain(self) -> bool {
        self.is_null() || self.offset == 0
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Location(null)")
        } else {
            write!(f, "Location({}:{})", self.file, self.offset)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}
