#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Fluent, value-semantics builders in front of an image pipeline.
//!
//! # Design
//! - Every option call clones the builder and changes exactly one field;
//!   the receiver is never mutated, so a partially configured builder can
//!   be forked into several terminal calls.
//! - Processor order is the order of `process` calls; the convenience
//!   shorthands are sugar over the same append primitive.
//! - Terminal calls hand a submission to the pipeline and step out of the
//!   way; the builders own no concurrency and no cancellation state.

use std::sync::Arc;

use pictor_core::{ImagePipeline, IntoImageRequest, SourceError};

pub mod display;
pub mod request;

pub use display::DisplayRequestBuilder;
pub use request::ImageRequestBuilder;

/// Entry-point sugar for spelling `pipeline.image(source)`.
pub trait PipelineImageExt {
    /// Builder for the given source, backed by this pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the locator cannot be converted into a
    /// request descriptor.
    fn image(&self, source: impl IntoImageRequest) -> Result<ImageRequestBuilder, SourceError>;
}

impl PipelineImageExt for Arc<dyn ImagePipeline> {
    fn image(&self, source: impl IntoImageRequest) -> Result<ImageRequestBuilder, SourceError> {
        ImageRequestBuilder::new(Arc::clone(self), source)
    }
}

impl<P> PipelineImageExt for Arc<P>
where
    P: ImagePipeline + 'static,
{
    fn image(&self, source: impl IntoImageRequest) -> Result<ImageRequestBuilder, SourceError> {
        ImageRequestBuilder::new(Arc::clone(self) as Arc<dyn ImagePipeline>, source)
    }
}
