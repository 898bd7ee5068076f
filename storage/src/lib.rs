//! Read-only access to the namespace catalog, extents and records of a
//! legacy memory-mapped document store, plus forensic recovery of deleted
//! documents from its free lists.
//!
//! Nothing in this crate writes to the storage directory.

pub mod catalog;
pub mod disk;
pub mod document;
pub mod error;
pub mod heap;
pub mod layout;
pub mod recovery;

pub use catalog::details::NamespaceDetails;
pub use catalog::namespace::{NamespaceCatalog, NamespaceEntry};
pub use disk::file_set::MappedFileSet;
pub use disk::location::Location;
pub use document::codec::{BsonCodec, CodecError, DocumentCodec};
pub use document::repair::{DocumentRepair, RepairedDocument, Unrecoverable};
pub use error::{Result, StoreError};
pub use heap::extent::{Extent, ExtentWalker};
pub use heap::record::{LiveLinks, Record, RecordLocator};
pub use heap::walker::RecordWalker;
pub use recovery::event::{FailureKind, ScanEvent, Truncation};
pub use recovery::scanner::{RecoveryScanner, ScanOptions};
pub use recovery::summary::RecoverySummary;
