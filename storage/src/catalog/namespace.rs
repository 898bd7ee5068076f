use crate::catalog::details::NamespaceDetails;
use crate::disk::file_set::MappedFileSet;
use crate::error::{Result, StoreError};
use crate::layout::{NS_DETAILS_OFFSET, NS_NAME_LEN, NS_NAME_OFFSET, NS_SLOT_SIZE, read_i32, trim_name};
use std::borrow::Cow;

/// The closed hash table stored in a `.ns` file.
///
/// Occupancy is not recorded anywhere except in the slots themselves: a slot
/// whose name starts with NUL is empty. Iteration is in physical slot order.
#[derive(Clone, Copy, Debug)]
pub struct NamespaceCatalog<'a> {
    bytes: &'a [u8],
}

impl<'a> NamespaceCatalog<'a> {
    pub fn new(files: &'a MappedFileSet) -> Self {
        Self::from_bytes(files.namespace_file().bytes())
    }

    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of whole slots in the file, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.bytes.len() / NS_SLOT_SIZE
    }

    /// A fresh cursor starting at slot 0.
    pub fn iter(&self) -> Namespaces<'a> {
        Namespaces {
            bytes: self.bytes,
            next_index: 0,
        }
    }

    /// Every entry whose name is exactly `name`. Duplicates are all returned.
    pub fn find(&self, name: &str) -> Result<impl Iterator<Item = NamespaceEntry<'a>> + use<'a>> {
        validate_namespace_name(name)?;
        let target = name.as_bytes().to_vec();
        Ok(self.iter().filter(move |entry| entry.name() == target.as_slice()))
    }
}

impl<'a> IntoIterator for &NamespaceCatalog<'a> {
    type Item = NamespaceEntry<'a>;
    type IntoIter = Namespaces<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Rejects names that can never be stored in a NUL-terminated name field.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("empty namespace name".into()));
    }
    if name.len() >= NS_NAME_LEN {
        return Err(StoreError::InvalidArgument(format!(
            "namespace name is {} bytes, at most {} fit",
            name.len(),
            NS_NAME_LEN - 1
        )));
    }
    if name.contains('\0') {
        return Err(StoreError::InvalidArgument(format!(
            "namespace name {:?} contains NUL",
            name
        )));
    }
    Ok(())
}

pub struct Namespaces<'a> {
    bytes: &'a [u8],
    next_index: usize,
}

impl<'a> Iterator for Namespaces<'a> {
    type Item = NamespaceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.next_index.checked_mul(NS_SLOT_SIZE)?;
            let end = start.checked_add(NS_SLOT_SIZE)?;
            if end > self.bytes.len() {
                return None;
            }
            let index = self.next_index;
            self.next_index += 1;

            let slot = &self.bytes[start..end];
            if slot[NS_NAME_OFFSET] == 0 {
                continue;
            }
            return Some(NamespaceEntry { index, slot });
        }
    }
}

/// One occupied slot of the catalog.
#[derive(Clone, Copy)]
pub struct NamespaceEntry<'a> {
    index: usize,
    slot: &'a [u8],
}

impl<'a> NamespaceEntry<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn hash(&self) -> i32 {
        read_i32(self.slot, 0)
    }

    pub fn name(&self) -> &'a [u8] {
        trim_name(&self.slot[NS_NAME_OFFSET..NS_DETAILS_OFFSET])
    }

    pub fn name_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.name())
    }

    /// Byte offset of the details region inside the namespace file.
    pub fn details_offset(&self) -> usize {
        self.index * NS_SLOT_SIZE + NS_DETAILS_OFFSET
    }

    pub fn details_blob(&self) -> &'a [u8] {
        &self.slot[NS_DETAILS_OFFSET..]
    }

    pub fn details(&self) -> Result<NamespaceDetails> {
        NamespaceDetails::decode(self.details_blob())
    }
}

impl std::fmt::Debug for NamespaceEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceEntry")
            .field("index", &self.index)
            .field("name", &self.name_lossy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::location::Location;

    fn table(slots: usize, names: &[(usize, &str)]) -> Vec<u8> {
        let mut bytes = vec![0u8; slots * NS_SLOT_SIZE];
        for (slot, name) in names {
            let base = slot * NS_SLOT_SIZE;
            bytes[base..base + 4].copy_from_slice(&(*slot as i32 * 31).to_le_bytes());
            bytes[base + 4..base + 4 + name.len()].copy_from_slice(name.as_bytes());
            let details = base + NS_DETAILS_OFFSET;
            bytes[details..details + 8].copy_from_slice(&Location::new(0, 8192).encode());
        }
        bytes
    }

    #[test]
    fn yields_occupied_slots_in_slot_order() {
        let bytes = table(8, &[(5, "test.b"), (1, "test.a"), (7, "test.$freelist")]);
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        assert_eq!(catalog.slot_count(), 8);

        let entries: Vec<_> = catalog.iter().collect();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![&b"test.a"[..], b"test.b", b"test.$freelist"]);
        assert_eq!(entries[0].index(), 1);
        assert_eq!(entries[0].hash(), 31);
        assert_eq!(entries[1].details_offset(), 5 * NS_SLOT_SIZE + NS_DETAILS_OFFSET);

        for entry in &entries {
            assert_eq!(entry.details().unwrap().first_extent, Location::new(0, 8192));
        }
    }

    #[test]
    fn empty_slots_are_skipped_not_terminal() {
        let bytes = table(4, &[(3, "db.last")]);
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        let names: Vec<_> = catalog.iter().map(|e| e.name_lossy().into_owned()).collect();
        assert_eq!(names, vec!["db.last"]);
    }

    #[test]
    fn trailing_partial_slot_ends_iteration() {
        let mut bytes = table(2, &[(0, "db.a"), (1, "db.b")]);
        bytes.extend_from_slice(&[b'x'; NS_SLOT_SIZE - 1]);
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        assert_eq!(catalog.slot_count(), 2);
        assert_eq!(catalog.iter().count(), 2);
        assert_eq!(NamespaceCatalog::from_bytes(&[]).iter().count(), 0);
    }

    #[test]
    fn cursors_are_independent_and_restartable() {
        let bytes = table(3, &[(0, "db.a"), (2, "db.c")]);
        let catalog = NamespaceCatalog::from_bytes(&bytes);

        let mut first = catalog.iter();
        let mut second = catalog.iter();
        assert_eq!(first.next().unwrap().name(), b"db.a");
        assert_eq!(first.next().unwrap().name(), b"db.c");
        assert_eq!(second.next().unwrap().name(), b"db.a");
        assert!(first.next().is_none());
        assert_eq!((&catalog).into_iter().count(), 2);
    }

    #[test]
    fn find_matches_exact_name_only() {
        let bytes = table(
            5,
            &[(0, "test.foo"), (1, "test.foobar"), (2, "test.fo"), (4, "test.foo")],
        );
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        let found: Vec<_> = catalog.find("test.foo").unwrap().map(|e| e.index()).collect();
        assert_eq!(found, vec![0, 4]);
        assert_eq!(catalog.find("test.bar").unwrap().count(), 0);
    }

    #[test]
    fn find_rejects_unstorable_names() {
        let bytes = table(1, &[(0, "db.a")]);
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        for name in ["", "a\0b"] {
            assert!(matches!(
                catalog.find(name).err(),
                Some(StoreError::InvalidArgument(_))
            ));
        }
        let long = "x".repeat(NS_NAME_LEN);
        assert!(catalog.find(&long).is_err());
        assert!(catalog.find(&long[..NS_NAME_LEN - 1]).is_ok());
    }

    #[test]
    fn unterminated_name_uses_whole_field() {
        let mut bytes = table(1, &[]);
        bytes[NS_NAME_OFFSET..NS_DETAILS_OFFSET].fill(b'n');
        let catalog = NamespaceCatalog::from_bytes(&bytes);
        let entry = catalog.iter().next().unwrap();
        assert_eq!(entry.name().len(), NS_NAME_LEN);
    }
}
