//! Forensic recovery of deleted documents.
//!
//! Deleted records are not erased; they are threaded onto one of the
//! namespace's free-list buckets, and their payload usually survives until the
//! space is reused. The scanner walks every bucket chain of the target
//! namespace, repairs each payload it reaches and reports what it found.
//!
//! A damaged chain must never stop the scan or make it spin: per-node read
//! and repair errors become `ScanEvent::Failed`, and each bucket walk keeps a
//! visited set plus a hop cap so a cyclic chain ends with `ScanEvent::Truncated`.

use crate::catalog::details::NamespaceDetails;
use crate::catalog::namespace::{NamespaceCatalog, Namespaces, validate_namespace_name};
use crate::disk::file_set::MappedFileSet;
use crate::disk::location::Location;
use crate::document::codec::{BsonCodec, DocumentCodec};
use crate::document::repair::DocumentRepair;
use crate::error::Result;
use crate::heap::record::RecordLocator;
use crate::layout::{BUCKET_COUNT, RECORD_HEADER_LEN};
use crate::recovery::event::{FailureKind, ScanEvent, Truncation};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScanOptions {
    /// Upper bound on records visited per bucket. `None` derives it from the
    /// mapped data size.
    pub max_chain_hops: Option<usize>,
}

pub struct RecoveryScanner<'a, C = BsonCodec> {
    files: &'a MappedFileSet,
    repair: DocumentRepair<C>,
    options: ScanOptions,
}

impl<'a> RecoveryScanner<'a> {
    pub fn new(files: &'a MappedFileSet) -> Self {
        Self::with_codec(files, BsonCodec)
    }
}

impl<'a, C: DocumentCodec> RecoveryScanner<'a, C> {
    pub fn with_codec(files: &'a MappedFileSet, codec: C) -> Self {
        Self {
            files,
            repair: DocumentRepair::with_codec(codec),
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Every record header is at least 16 bytes, so a chain longer than the
    /// mapped data divided by that must revisit something.
    pub fn max_chain_hops(&self) -> usize {
        self.options
            .max_chain_hops
            .unwrap_or(self.files.total_data_len() / RECORD_HEADER_LEN + 1)
    }

    /// Scans every catalog entry named exactly `target`, in slot order.
    pub fn recover<'s>(&'s self, target: &str) -> Result<Recovery<'s, 'a, C>> {
        validate_namespace_name(target)?;
        Ok(Recovery {
            scanner: self,
            namespaces: NamespaceCatalog::new(self.files).iter(),
            target: target.as_bytes().to_vec(),
            matched: 0,
            current: None,
        })
    }

    /// Walks the free-list buckets of one namespace, bucket 0 first.
    pub fn scan_details<'s>(&'s self, details: &NamespaceDetails) -> BucketScan<'s, 'a, C> {
        BucketScan {
            scanner: self,
            locator: RecordLocator::new(self.files),
            heads: details.buckets,
            max_hops: self.max_chain_hops(),
            next_bucket: 0,
            bucket: 0,
            cursor: None,
            visited: HashSet::new(),
            hops: 0,
        }
    }
}

/// Events for all catalog entries matching the target name.
pub struct Recovery<'s, 'a, C> {
    scanner: &'s RecoveryScanner<'a, C>,
    namespaces: Namespaces<'a>,
    target: Vec<u8>,
    matched: usize,
    current: Option<BucketScan<'s, 'a, C>>,
}

impl<C> Recovery<'_, '_, C> {
    /// Catalog entries matched so far.
    pub fn namespaces_matched(&self) -> usize {
        self.matched
    }
}

impl<C: DocumentCodec> Iterator for Recovery<'_, '_, C> {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(scan) = self.current.as_mut() {
                if let Some(event) = scan.next() {
                    return Some(event);
                }
                self.current = None;
            }

            let target = self.target.as_slice();
            let entry = self.namespaces.find(|entry| entry.name() == target)?;
            self.matched += 1;
            match entry.details() {
                Ok(details) => {
                    info!(
                        namespace = %entry.name_lossy(),
                        slot = entry.index(),
                        buckets = details.occupied_buckets().count(),
                        "scanning free lists"
                    );
                    self.current = Some(self.scanner.scan_details(&details));
                }
                Err(err) => {
                    debug!(slot = entry.index(), %err, "skipping unreadable namespace details");
                }
            }
        }
    }
}

/// Cursor over the free-list chains of one namespace.
pub struct BucketScan<'s, 'a, C> {
    scanner: &'s RecoveryScanner<'a, C>,
    locator: RecordLocator<'a>,
    heads: [Location; BUCKET_COUNT],
    max_hops: usize,
    next_bucket: usize,
    bucket: usize,
    cursor: Option<Location>,
    visited: HashSet<Location>,
    hops: usize,
}

impl<C: DocumentCodec> BucketScan<'_, '_, C> {
    fn visit(&mut self, location: Location) -> ScanEvent {
        let bucket = self.bucket;
        if !self.visited.insert(location) {
            debug!(bucket, %location, "free-list chain revisits a node");
            return ScanEvent::Truncated {
                bucket,
                location,
                cause: Truncation::Cycle,
            };
        }
        if self.hops >= self.max_hops {
            debug!(bucket, %location, hops = self.hops, "free-list chain hit hop cap");
            return ScanEvent::Truncated {
                bucket,
                location,
                cause: Truncation::HopLimit,
            };
        }
        self.hops += 1;

        let record = match self.locator.locate(location) {
            Ok(record) => record,
            Err(err) => {
                return ScanEvent::Failed {
                    bucket,
                    location,
                    kind: FailureKind::Unreadable,
                    reason: err.to_string(),
                };
            }
        };

        let link = record.free_link();
        debug!(bucket, %location, length = record.length(), next = ?link, "free record");
        if !link.ends_free_chain() {
            self.cursor = Some(link);
        }

        let payload = match record.payload() {
            Ok(payload) => payload,
            Err(err) => {
                return ScanEvent::Failed {
                    bucket,
                    location,
                    kind: FailureKind::Unreadable,
                    reason: err.to_string(),
                };
            }
        };
        match self.scanner.repair.repair(payload, payload.len() as i32) {
            Ok(document) => ScanEvent::Recovered {
                bucket,
                location,
                document,
            },
            Err(err) => ScanEvent::Failed {
                bucket,
                location,
                kind: FailureKind::Unrecoverable,
                reason: err.reason,
            },
        }
    }
}

impl<C: DocumentCodec> Iterator for BucketScan<'_, '_, C> {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(location) = self.cursor.take() {
                return Some(self.visit(location));
            }
            if self.next_bucket >= BUCKET_COUNT {
                return None;
            }
            self.bucket = self.next_bucket;
            self.next_bucket += 1;
            self.visited.clear();
            self.hops = 0;

            let head = self.heads[self.bucket];
            if head.is_null() {
                continue;
            }
            debug!(bucket = self.bucket, %head, "walking free-list bucket");
            self.cursor = Some(head);
        }
    }
}
