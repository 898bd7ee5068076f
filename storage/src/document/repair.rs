use crate::document::codec::{BsonCodec, DocumentCodec};
use crate::layout::MIN_DOCUMENT_LEN;
use bytes::{Bytes, BytesMut};
use tracing::debug;

/// A repair attempt that did not produce a valid document. This is a
/// per-document skip signal, not a failure of the surrounding scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecoverable document: {reason}")]
pub struct Unrecoverable {
    pub reason: String,
}

impl Unrecoverable {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A document that passed full validation after repair.
#[derive(Clone, PartialEq, Eq)]
pub struct RepairedDocument {
    bytes: Bytes,
}

impl RepairedDocument {
    /// The complete document, length prefix and terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Decodes the document, replacing invalid UTF-8 in strings.
    pub fn to_document(&self) -> bson::de::Result<bson::Document> {
        bson::Document::from_reader_utf8_lossy(self.as_bytes())
    }
}

impl std::fmt::Debug for RepairedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairedDocument")
            .field("len", &self.len())
            .finish()
    }
}

/// Best-effort repair of truncated or partially overwritten documents.
///
/// The candidate's length prefix and terminator are forced first, then the
/// document is cut back to the last top-level element that still parses.
#[derive(Clone, Debug, Default)]
pub struct DocumentRepair<C = BsonCodec> {
    codec: C,
}

impl DocumentRepair<BsonCodec> {
    pub fn new() -> Self {
        Self::with_codec(BsonCodec)
    }
}

impl<C: DocumentCodec> DocumentRepair<C> {
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Repairs a copy of the first `claimed_length` bytes of `payload`.
    /// The source bytes are never modified.
    pub fn repair(
        &self,
        payload: &[u8],
        claimed_length: i32,
    ) -> Result<RepairedDocument, Unrecoverable> {
        let len = usize::try_from(claimed_length)
            .map_err(|_| Unrecoverable::new(format!("negative length {}", claimed_length)))?;
        let source = payload.get(..len).ok_or_else(|| {
            Unrecoverable::new(format!(
                "claimed length {} exceeds the {} available bytes",
                len,
                payload.len()
            ))
        })?;

        let mut candidate = BytesMut::from(source);
        let declared = self.repair_in_place(&mut candidate)?;
        candidate.truncate(declared);
        Ok(RepairedDocument {
            bytes: candidate.freeze(),
        })
    }

    /// Repairs `candidate` in place, treating its whole length as the claimed
    /// length, and returns the document's final declared length.
    pub fn repair_in_place(&self, candidate: &mut [u8]) -> Result<usize, Unrecoverable> {
        let len = candidate.len();
        if len < MIN_DOCUMENT_LEN {
            return Err(Unrecoverable::new(format!(
                "{} bytes cannot hold a document",
                len
            )));
        }
        let claimed = i32::try_from(len)
            .map_err(|_| Unrecoverable::new(format!("{} bytes exceeds i32 length", len)))?;

        candidate[..4].copy_from_slice(&claimed.to_le_bytes());
        candidate[len - 1] = 0;

        let last_offset = self.codec.last_element_end(candidate);
        let declared = if last_offset > 0 {
            candidate[last_offset..].fill(0);
            let declared = last_offset + 1;
            candidate[..4].copy_from_slice(&(declared as i32).to_le_bytes());
            declared
        } else {
            len
        };
        debug!(claimed = len, last_offset, declared, "repaired candidate");

        self.codec
            .validate(&candidate[..declared])
            .map_err(|e| Unrecoverable::new(e.0))?;
        Ok(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::codec::CodecError;
    use bson::doc;

    fn encode(doc: &bson::Document) -> Vec<u8> {
        let mut out = Vec::new();
        doc.to_writer(&mut out).unwrap();
        out
    }

    #[test]
    fn valid_document_is_unchanged() {
        let bytes = encode(&doc! { "_id": 7i32, "name": "widget", "tags": ["a", "b"] });
        let repaired = DocumentRepair::new()
            .repair(&bytes, bytes.len() as i32)
            .unwrap();
        assert_eq!(repaired.as_bytes(), bytes.as_slice());
        assert_eq!(
            repaired.to_document().unwrap(),
            doc! { "_id": 7i32, "name": "widget", "tags": ["a", "b"] }
        );
    }

    #[test]
    fn garbage_after_document_is_cut_off() {
        let bytes = encode(&doc! { "a": 1i32, "b": "keep" });
        let mut payload = bytes.clone();
        payload.extend_from_slice(&[0x02, b'z', 0, 0xFF, 0xFF, 0xFF, 0x7F, b'q', 0x13]);

        let repaired = DocumentRepair::new()
            .repair(&payload, payload.len() as i32)
            .unwrap();
        assert_eq!(repaired.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn truncated_tail_keeps_leading_elements() {
        let full = encode(&doc! { "a": 1i32, "b": "a long string value", "c": 3i32 });
        let keep = encode(&doc! { "a": 1i32 });
        let cut = keep.len() + 6;
        let payload = &full[..cut];

        let repaired = DocumentRepair::new().repair(payload, cut as i32).unwrap();
        assert_eq!(repaired.as_bytes(), keep.as_slice());
        assert_eq!(repaired.to_document().unwrap(), doc! { "a": 1i32 });
    }

    #[test]
    fn invalid_utf8_string_keeps_every_element() {
        let mut bytes = encode(&doc! { "a": 1i32, "s": "AB", "c": 3i32 });
        let at = bytes.windows(3).position(|w| w == b"AB\0").unwrap();
        bytes[at..at + 2].copy_from_slice(&[0xFF, 0xFE]);
        let mut payload = bytes.clone();
        payload.extend_from_slice(&[0xEE; 7]);

        let repaired = DocumentRepair::new()
            .repair(&payload, payload.len() as i32)
            .unwrap();
        assert_eq!(repaired.as_bytes(), bytes.as_slice());
        assert_eq!(
            repaired.to_document().unwrap(),
            doc! { "a": 1i32, "s": "\u{FFFD}\u{FFFD}", "c": 3i32 }
        );
    }

    #[test]
    fn repair_is_idempotent() {
        let full = encode(&doc! { "x": "first", "y": "second element here" });
        let mut candidate = full[..full.len() - 7].to_vec();
        let repair = DocumentRepair::new();

        let first = repair.repair_in_place(&mut candidate).unwrap();
        let once = candidate.clone();
        let second = repair.repair_in_place(&mut candidate).unwrap();
        assert_eq!(first, second);
        assert_eq!(candidate, once);
        assert!(candidate[first..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unparseable_body_is_unrecoverable() {
        let mut bytes = encode(&doc! { "abc": 5i32 });
        assert_eq!(bytes.len(), 14);
        bytes[4] = 0x42;
        let err = DocumentRepair::new()
            .repair(&bytes, bytes.len() as i32)
            .unwrap_err();
        assert!(err.to_string().contains("unrecoverable"));
    }

    #[test]
    fn source_bytes_are_not_modified() {
        let bytes = encode(&doc! { "a": 1i32 });
        let mut payload = bytes.clone();
        payload.extend_from_slice(&[0xAB; 6]);
        let before = payload.clone();
        DocumentRepair::new()
            .repair(&payload, payload.len() as i32)
            .unwrap();
        assert_eq!(payload, before);
    }

    #[test]
    fn bad_claimed_lengths() {
        let bytes = encode(&doc! { "a": 1i32 });
        let repair = DocumentRepair::new();
        assert!(repair.repair(&bytes, -3).is_err());
        assert!(repair.repair(&bytes, 4).is_err());
        assert!(repair.repair(&bytes, bytes.len() as i32 + 1).is_err());
    }

    #[test]
    fn empty_body_repairs_to_empty_document() {
        let repaired = DocumentRepair::new()
            .repair(&[0x99, 0x99, 0x99, 0x99, 0x77], 5)
            .unwrap();
        assert_eq!(repaired.as_bytes(), &[5, 0, 0, 0, 0]);
    }

    struct RejectAll;

    impl DocumentCodec for RejectAll {
        fn last_element_end(&self, _doc: &[u8]) -> usize {
            0
        }

        fn validate(&self, _doc: &[u8]) -> Result<(), CodecError> {
            Err(CodecError("rejected".into()))
        }
    }

    #[test]
    fn codec_rejection_surfaces_as_unrecoverable() {
        let repair = DocumentRepair::with_codec(RejectAll);
        let err = repair.repair(&[5, 0, 0, 0, 0], 5).unwrap_err();
        assert_eq!(err.reason, "rejected");
    }
}
