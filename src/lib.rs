//! Core pipeline for turning LLM-generated marketing markup into typed
//! publishing blocks: placeholder resolution, block segmentation, and block
//! emission, in strict order.

pub mod document;
pub mod error;
pub mod pipeline;
pub mod providers;

pub use document::{Document, DEFAULT_MAX_DOCUMENT_BYTES};
pub use error::{MalformedInputError, ResolutionWarning, WarningReason};
pub use pipeline::emitter::{emit, Block};
pub use pipeline::resolver::{resolve, ResolvedDocument};
pub use pipeline::segmenter::{segment, Children, Segment, SegmentKind};
pub use pipeline::{process_document, segment_document, PipelineOptions, PipelineOutput};
pub use providers::{Fragment, FragmentProvider, PlaceholderKind, ProviderRegistry, StaticProvider};
