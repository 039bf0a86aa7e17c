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

//! Pipeline-agnostic image request model and dispatch interfaces.
//!
//! # Design
//! - Request descriptors are plain values; every mutation is a copy made by
//!   the builder layer, never an in-place edit.
//! - Processor identity strings are the cache-equality contract shared with
//!   pipeline adapters; equal effective parameters must yield equal keys.
//! - The pipeline itself is an opaque asynchronous collaborator reached
//!   through [`ImagePipeline`]; nothing in this crate performs I/O.

pub mod display;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod processing;
pub mod stream;
pub mod task;

pub use display::{
    ContentMode, ContentModeOverrides, DisplayOptions, DisplayOutcome, DisplaySurface, Transition,
};
pub use error::{LoadError, LoadResult, SourceError};
pub use model::{
    CachePolicy, ImageFrame, ImageRequest, ImageSource, IntoImageRequest, NetworkRequest, Priority,
    RequestOptions,
};
pub use pipeline::{DispatchTarget, DisplaySubmission, ImagePipeline, LoadSubmission};
pub use processing::{
    Border, Processor, ProcessorKind, ResizeSpec, ScaleUnit, ScalingMode, Size, UNBOUNDED,
};
pub use stream::{LoadEvent, LoadStream};
pub use task::{
    CacheSource, Cancellation, CompletionHandler, ImageResponse, ProgressHandler, ProgressUpdate,
    TaskHandle,
};
