use crate::error::MalformedInputError;

/// Default cap on input size. Generated articles are tens of kilobytes;
/// anything past this is a runaway generation, not a document.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 4 * 1024 * 1024;

/// An immutable owned text buffer plus a version counter.
///
/// Every transformation (placeholder resolution) produces a *new* buffer with
/// a bumped version; span offsets are only meaningful against the version
/// they were computed from and are never carried across versions.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    version: u32,
}

impl Document {
    /// Builds a document from already-valid text, enforcing the default
    /// size limit.
    pub fn new(text: impl Into<String>) -> Result<Self, MalformedInputError> {
        Self::with_limit(text, DEFAULT_MAX_DOCUMENT_BYTES)
    }

    /// Builds a document with an explicit size limit.
    pub fn with_limit(
        text: impl Into<String>,
        max_bytes: usize,
    ) -> Result<Self, MalformedInputError> {
        let text = text.into();
        if text.len() > max_bytes {
            return Err(MalformedInputError::TooLarge {
                len: text.len(),
                max: max_bytes,
            });
        }
        Ok(Self { text, version: 0 })
    }

    /// Builds a document from raw bytes, validating UTF-8.
    pub fn from_bytes(bytes: Vec<u8>, max_bytes: usize) -> Result<Self, MalformedInputError> {
        let text = String::from_utf8(bytes).map_err(|e| MalformedInputError::NotUtf8 {
            valid_up_to: e.utf8_error().valid_up_to(),
        })?;
        Self::with_limit(text, max_bytes)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// New buffer, next version. Only transformations inside the crate get
    /// to produce successor documents.
    pub(crate) fn replaced(&self, text: String) -> Document {
        Document {
            text,
            version: self.version + 1,
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_limit_rejected() {
        let err = Document::with_limit("abcdef", 3).unwrap_err();
        assert!(matches!(err, MalformedInputError::TooLarge { len: 6, max: 3 }));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let err = Document::from_bytes(vec![b'o', b'k', 0xFF, 0xFE], 1024).unwrap_err();
        assert!(matches!(err, MalformedInputError::NotUtf8 { valid_up_to: 2 }));
    }

    #[test]
    fn version_bumps_on_replacement() {
        let doc = Document::new("one").unwrap();
        assert_eq!(doc.version(), 0);
        let next = doc.replaced("two".to_string());
        assert_eq!(next.version(), 1);
        assert_eq!(next.text(), "two");
        // original untouched
        assert_eq!(doc.text(), "one");
    }
}
