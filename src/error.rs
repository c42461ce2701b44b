use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::providers::PlaceholderKind;

/// Fatal input error. Raised before any transformation runs; the pipeline
/// produces no partial output when one of these is returned.
#[derive(Debug, Error)]
pub enum MalformedInputError {
    #[error("document is not valid UTF-8 (valid up to byte {valid_up_to})")]
    NotUtf8 { valid_up_to: usize },
    #[error("document is {len} bytes, over the {max} byte limit")]
    TooLarge { len: usize, max: usize },
}

/// Non-fatal, per-token resolution problem. Collected and returned next to
/// the resolved document; never aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
    pub kind: PlaceholderKind,
    pub ordinal: u32,
    pub reason: WarningReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningReason {
    /// No provider was registered for this placeholder kind.
    NoProvider,
    /// The provider had no fragment for this ordinal.
    NotFound,
    /// The provider returned an error; the token was stripped.
    ProviderError(String),
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningReason::NoProvider => write!(f, "no provider registered"),
            WarningReason::NotFound => write!(f, "no fragment for ordinal"),
            WarningReason::ProviderError(e) => write!(f, "provider error: {}", e),
        }
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}: {}", self.kind.as_tag(), self.ordinal, self.reason)
    }
}
