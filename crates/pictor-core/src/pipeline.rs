//! Narrow seam to the external image pipeline.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::display::{DisplayOptions, DisplaySurface};
use crate::model::ImageRequest;
use crate::task::{CompletionHandler, ProgressHandler, TaskHandle};

/// Execution context for progress/completion callbacks.
#[derive(Default, Debug, Clone)]
pub enum DispatchTarget {
    /// Deliver on the pipeline's own default context. Pipelines commonly
    /// default to a main/UI-affine context since results are usually
    /// applied to visible surfaces.
    #[default]
    PipelineDefault,
    /// Deliver on the given runtime.
    Runtime(Handle),
}

impl DispatchTarget {
    /// Whether delivery was pinned to a caller-chosen runtime.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }
}

/// One configured load handed to the pipeline.
pub struct LoadSubmission {
    /// Accumulated request descriptor.
    pub request: ImageRequest,
    /// Callback delivery context.
    pub dispatch: DispatchTarget,
    /// Optional progress callback.
    pub on_progress: Option<ProgressHandler>,
    /// Optional completion callback.
    pub on_completion: Option<CompletionHandler>,
}

impl LoadSubmission {
    /// Submission with no callbacks attached.
    #[must_use]
    pub fn fire_and_forget(request: ImageRequest) -> Self {
        Self {
            request,
            dispatch: DispatchTarget::default(),
            on_progress: None,
            on_completion: None,
        }
    }
}

impl fmt::Debug for LoadSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadSubmission")
            .field("request", &self.request)
            .field("dispatch", &self.dispatch)
            .field("has_progress", &self.on_progress.is_some())
            .field("has_completion", &self.on_completion.is_some())
            .finish()
    }
}

/// One configured display load handed to the view-loading entry point.
pub struct DisplaySubmission {
    /// Accumulated request descriptor.
    pub request: ImageRequest,
    /// Display options accumulated by the display builder.
    pub options: DisplayOptions,
    /// Surface the result is applied to.
    pub surface: Arc<dyn DisplaySurface>,
    /// Callback delivery context.
    pub dispatch: DispatchTarget,
    /// Optional progress callback.
    pub on_progress: Option<ProgressHandler>,
    /// Optional completion callback.
    pub on_completion: Option<CompletionHandler>,
}

impl fmt::Debug for DisplaySubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplaySubmission")
            .field("request", &self.request)
            .field("options", &self.options)
            .field("dispatch", &self.dispatch)
            .field("has_progress", &self.on_progress.is_some())
            .field("has_completion", &self.on_completion.is_some())
            .finish_non_exhaustive()
    }
}

/// Entry points every pipeline adapter implements.
///
/// The facade treats the pipeline as an opaque asynchronous collaborator:
/// submissions return immediately with a handle and results arrive later on
/// the submission's dispatch target. Retries, caching, and decoding are the
/// adapter's business.
pub trait ImagePipeline: Send + Sync {
    /// Start a load and return its task handle.
    fn submit(&self, submission: LoadSubmission) -> TaskHandle;

    /// Start a load into a display surface.
    ///
    /// Returns `None` when the fast-path memory cache satisfied the request
    /// synchronously and no task was started.
    fn submit_display(&self, submission: DisplaySubmission) -> Option<TaskHandle>;
}
