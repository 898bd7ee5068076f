use bson::RawDocument;
use bson::spec::ElementType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed document: {0}")]
pub struct CodecError(pub String);

/// The document-encoding operations the repair pass relies on.
pub trait DocumentCodec {
    /// Walks top-level elements of `doc` in order and returns the offset just
    /// past the last one that parsed, or 0 if none did.
    fn last_element_end(&self, doc: &[u8]) -> usize;

    /// Full structural validation of a candidate document.
    fn validate(&self, doc: &[u8]) -> Result<(), CodecError>;
}

/// BSON, checked structurally: element types, lengths and terminators.
///
/// String and key bytes are never decoded, so text that is not valid UTF-8
/// does not make an otherwise well-formed document malformed.
#[derive(Clone, Copy, Debug, Default)]
pub struct BsonCodec;

const MAX_NESTING: usize = 100;

impl DocumentCodec for BsonCodec {
    fn last_element_end(&self, doc: &[u8]) -> usize {
        if RawDocument::from_bytes(doc).is_err() {
            return 0;
        }
        walk(doc, None).0
    }

    fn validate(&self, doc: &[u8]) -> Result<(), CodecError> {
        RawDocument::from_bytes(doc).map_err(|e| CodecError(e.to_string()))?;
        walk(doc, Some(MAX_NESTING)).1
    }
}

/// Steps over the top-level elements of a document whose length prefix and
/// terminator were already checked. With `nested` set, embedded documents are
/// walked too, at most that many levels deep.
///
/// Returns the end offset of the last clean element (0 if none) and whether
/// the walk reached the terminator.
fn walk(doc: &[u8], nested: Option<usize>) -> (usize, Result<(), CodecError>) {
    let body = &doc[..doc.len() - 1];
    let mut last_end = 0;
    let mut at = 4;
    while at < body.len() {
        match element_end(body, at, nested) {
            Ok(end) => {
                at = end;
                last_end = end;
            }
            Err(err) => return (last_end, Err(err)),
        }
    }
    (last_end, Ok(()))
}

fn element_end(body: &[u8], at: usize, nested: Option<usize>) -> Result<usize, CodecError> {
    let tag = body[at];
    let element_type = ElementType::from(tag)
        .ok_or_else(|| CodecError(format!("unknown element type {:#04x} at {}", tag, at)))?;
    let value_at = cstring_end(body, at + 1)?;
    let len = value_len(body, value_at, element_type, nested)?;
    value_at
        .checked_add(len)
        .filter(|&end| end <= body.len())
        .ok_or_else(|| CodecError(format!("element at {} runs past the document", at)))
}

fn value_len(
    body: &[u8],
    at: usize,
    element_type: ElementType,
    nested: Option<usize>,
) -> Result<usize, CodecError> {
    use ElementType::*;

    Ok(match element_type {
        Double | DateTime | Timestamp | Int64 => 8,
        Int32 => 4,
        Decimal128 => 16,
        ObjectId => 12,
        Boolean => 1,
        Null | Undefined | MinKey | MaxKey => 0,
        String | JavaScriptCode | Symbol => string_len(body, at)?,
        DbPointer => string_len(body, at)? + 12,
        RegularExpression => cstring_end(body, cstring_end(body, at)?)? - at,
        Binary => 5 + read_len(body, at)?,
        EmbeddedDocument | Array => {
            let len = read_len(body, at)?;
            embedded(body, at, len, nested)?;
            len
        }
        JavaScriptCodeWithScope => {
            let len = read_len(body, at)?;
            let end = at
                .checked_add(len)
                .filter(|&end| end <= body.len())
                .ok_or_else(|| CodecError(format!("code with scope at {} runs past", at)))?;
            let code = &body[..end];
            let scope_at = at + 4 + string_len(code, at + 4)?;
            let scope_len = read_len(code, scope_at)?;
            if scope_at + scope_len != end {
                return Err(CodecError(format!("code with scope at {} has bad length", at)));
            }
            embedded(code, scope_at, scope_len, nested)?;
            len
        }
        #[allow(unreachable_patterns)]
        other => return Err(CodecError(format!("unsupported element type {:?}", other))),
    })
}

fn embedded(
    body: &[u8],
    at: usize,
    len: usize,
    nested: Option<usize>,
) -> Result<(), CodecError> {
    let sub = at
        .checked_add(len)
        .and_then(|end| body.get(at..end))
        .ok_or_else(|| CodecError(format!("embedded document at {} runs past", at)))?;
    RawDocument::from_bytes(sub).map_err(|e| CodecError(format!("at {}: {}", at, e)))?;
    match nested {
        None => Ok(()),
        Some(0) => Err(CodecError(format!("documents nested too deeply at {}", at))),
        Some(depth) => walk(sub, Some(depth - 1)).1,
    }
}

/// Length of a length-prefixed, NUL-terminated string, prefix included.
fn string_len(body: &[u8], at: usize) -> Result<usize, CodecError> {
    let len = read_len(body, at)?;
    let last = (at + 4 + len)
        .checked_sub(1)
        .filter(|_| len > 0)
        .ok_or_else(|| CodecError(format!("empty string at {}", at)))?;
    match body.get(last) {
        Some(0) => Ok(4 + len),
        Some(_) => Err(CodecError(format!("unterminated string at {}", at))),
        None => Err(CodecError(format!("string at {} runs past", at))),
    }
}

fn read_len(body: &[u8], at: usize) -> Result<usize, CodecError> {
    let bytes = at
        .checked_add(4)
        .and_then(|end| body.get(at..end))
        .ok_or_else(|| CodecError(format!("length at {} runs past", at)))?;
    let len = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    usize::try_from(len).map_err(|_| CodecError(format!("negative length {} at {}", len, at)))
}

/// Offset just past the NUL that ends the C string at `at`.
fn cstring_end(body: &[u8], at: usize) -> Result<usize, CodecError> {
    body.get(at..)
        .and_then(|rest| rest.iter().position(|&b| b == 0))
        .map(|nul| at + nul + 1)
        .ok_or_else(|| CodecError(format!("unterminated name at {}", at)))
}
