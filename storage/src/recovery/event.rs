use crate::disk::location::Location;
use crate::document::repair::RepairedDocument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node's header or payload could not be read from the mapped files.
    Unreadable,
    /// The payload was read but repair did not yield a valid document.
    Unrecoverable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// The chain led back to a node already visited in this bucket.
    Cycle,
    /// The chain exceeded the configured hop cap.
    HopLimit,
}

/// One step of a recovery scan. Only `Recovered` carries output; the other
/// variants are diagnostics and never stop the scan.
#[derive(Clone, Debug)]
pub enum ScanEvent {
    Recovered {
        bucket: usize,
        location: Location,
        document: RepairedDocument,
    },
    Failed {
        bucket: usize,
        location: Location,
        kind: FailureKind,
        reason: String,
    },
    Truncated {
        bucket: usize,
        location: Location,
        cause: Truncation,
    },
}

impl ScanEvent {
    pub fn bucket(&self) -> usize {
        match self {
            ScanEvent::Recovered { bucket, .. }
            | ScanEvent::Failed { bucket, .. }
            | ScanEvent::Truncated { bucket, .. } => *bucket,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            ScanEvent::Recovered { location, .. }
            | ScanEvent::Failed { location, .. }
            | ScanEvent::Truncated { location, .. } => *location,
        }
    }

    pub fn document(&self) -> Option<&RepairedDocument> {
        match self {
            ScanEvent::Recovered { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<RepairedDocument> {
        match self {
            ScanEvent::Recovered { document, .. } => Some(document),
            _ => None,
        }
    }
}
