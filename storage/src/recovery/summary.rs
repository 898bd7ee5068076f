use crate::layout::BUCKET_COUNT;
use crate::recovery::event::ScanEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BucketSummary {
    pub bucket: usize,
    pub documents: usize,
    pub failures: usize,
    pub truncations: usize,
}

/// Running totals of a recovery scan.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RecoverySummary {
    pub namespace: String,
    pub namespaces_matched: usize,
    pub documents: usize,
    pub document_bytes: usize,
    pub failures: usize,
    pub truncations: usize,
    pub buckets: Vec<BucketSummary>,
}

impl RecoverySummary {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            namespaces_matched: 0,
            documents: 0,
            document_bytes: 0,
            failures: 0,
            truncations: 0,
            buckets: (0..BUCKET_COUNT)
                .map(|bucket| BucketSummary {
                    bucket,
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub fn record(&mut self, event: &ScanEvent) {
        let Some(bucket) = self.buckets.get_mut(event.bucket()) else {
            return;
        };
        match event {
            ScanEvent::Recovered { document, .. } => {
                bucket.documents += 1;
                self.documents += 1;
                self.document_bytes += document.len();
            }
            ScanEvent::Failed { .. } => {
                bucket.failures += 1;
                self.failures += 1;
            }
            ScanEvent::Truncated { .. } => {
                bucket.truncations += 1;
                self.truncations += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::location::Location;
    use crate::document::repair::DocumentRepair;
    use crate::recovery::event::{FailureKind, Truncation};

    #[test]
    fn tallies_events_per_bucket() {
        let document = DocumentRepair::new().repair(&[5, 0, 0, 0, 0], 5).unwrap();
        let mut summary = RecoverySummary::new("test.foo");
        let events = [
            ScanEvent::Recovered {
                bucket: 0,
                location: Location::new(0, 9000),
                document: document.clone(),
            },
            ScanEvent::Recovered {
                bucket: 0,
                location: Location::new(0, 9100),
                document,
            },
            ScanEvent::Failed {
                bucket: 4,
                location: Location::new(1, 100),
                kind: FailureKind::Unrecoverable,
                reason: "bad".into(),
            },
            ScanEvent::Truncated {
                bucket: 4,
                location: Location::new(1, 100),
                cause: Truncation::Cycle,
            },
        ];
        for event in &events {
            summary.record(event);
        }

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.document_bytes, 10);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.truncations, 1);
        assert_eq!(summary.buckets.len(), BUCKET_COUNT);
        assert_eq!(summary.buckets[0].documents, 2);
        assert_eq!(
            summary.buckets[4],
            BucketSummary {
                bucket: 4,
                documents: 0,
                failures: 1,
                truncations: 1
            }
        );
    }
}
