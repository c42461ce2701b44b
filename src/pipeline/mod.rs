pub mod emitter;
pub mod resolver;
pub mod segmenter;

use tracing::debug;

use crate::document::{Document, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::error::{MalformedInputError, ResolutionWarning};
use crate::providers::ProviderRegistry;

use emitter::Block;
use segmenter::Segment;

/// Per-request knobs. Everything else (providers, patterns) is passed in
/// per call; the pipeline holds no state across invocations.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Max concurrent fragment lookups during resolution.
    pub concurrency: usize,
    /// Documents over this size are rejected before any work happens.
    pub max_document_bytes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Everything the caller gets back: publishing blocks in document order,
/// plus the per-token warnings collected during resolution.
#[derive(Debug)]
pub struct PipelineOutput {
    pub blocks: Vec<Block>,
    pub warnings: Vec<ResolutionWarning>,
}

/// Three-pass pipeline: resolve placeholders → segment → emit blocks.
///
/// Fails only on malformed input (size/UTF-8), before any transformation
/// runs. Per-token resolution problems come back as warnings next to the
/// blocks, never as errors.
pub async fn process_document(
    input: &str,
    providers: &ProviderRegistry,
    options: &PipelineOptions,
) -> Result<PipelineOutput, MalformedInputError> {
    let document = Document::with_limit(input, options.max_document_bytes)?;
    let resolved = resolver::resolve(document, providers, options.concurrency).await;
    let segments = segmenter::segment(&resolved.document);
    let blocks = emitter::emit(&segments);
    debug!(
        blocks = blocks.len(),
        warnings = resolved.warnings.len(),
        version = resolved.document.version(),
        "pipeline complete"
    );
    Ok(PipelineOutput {
        blocks,
        warnings: resolved.warnings,
    })
}

/// Segmentation-only entry point for documents that carry no placeholders
/// (or have already been resolved). Pure and synchronous.
pub fn segment_document(
    input: &str,
    max_document_bytes: usize,
) -> Result<Vec<Segment>, MalformedInputError> {
    let document = Document::with_limit(input, max_document_bytes)?;
    Ok(segmenter::segment(&document))
}
