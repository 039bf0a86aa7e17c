//! Value-semantics accumulator for one image request.

use std::collections::BTreeMap;
use std::sync::Arc;

use pictor_core::{
    Border, CachePolicy, CompletionHandler, DispatchTarget, DisplaySurface, ImageFrame,
    ImagePipeline, ImageRequest, IntoImageRequest, LoadError, LoadEvent, LoadResult, LoadStream,
    LoadSubmission, Priority, Processor, ProgressHandler, RequestOptions, ResizeSpec, ScaleUnit,
    Size, SourceError, TaskHandle, UNBOUNDED,
};
use tracing::debug;

use crate::display::DisplayRequestBuilder;

/// Chainable accumulator for an [`ImageRequest`].
///
/// Every option call returns a new builder with one field changed, leaving
/// the receiver untouched. Builders are transient values consumed by a
/// terminal call, but nothing prevents reuse: building a base configuration
/// once and specializing it several times is a supported pattern.
#[derive(Clone)]
pub struct ImageRequestBuilder {
    request: ImageRequest,
    dispatch: DispatchTarget,
    pipeline: Arc<dyn ImagePipeline>,
}

impl ImageRequestBuilder {
    /// Builder for the given source, backed by `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the locator cannot be converted; this
    /// is the only failure the builder layer surfaces directly.
    pub fn new(
        pipeline: Arc<dyn ImagePipeline>,
        source: impl IntoImageRequest,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            request: source.into_image_request()?,
            dispatch: DispatchTarget::default(),
            pipeline,
        })
    }

    /// Current request snapshot.
    #[must_use]
    pub const fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// Callback delivery context, pipeline default unless scheduled.
    #[must_use]
    pub const fn dispatch(&self) -> &DispatchTarget {
        &self.dispatch
    }

    pub(crate) fn pipeline(&self) -> &Arc<dyn ImagePipeline> {
        &self.pipeline
    }

    fn map_request(&self, apply: impl FnOnce(&mut ImageRequest)) -> Self {
        let mut copy = self.clone();
        apply(&mut copy.request);
        copy
    }

    /// Replace the scheduling priority, [`Priority::Normal`] by default.
    #[must_use]
    pub fn priority(&self, priority: Priority) -> Self {
        self.map_request(|request| request.priority = priority)
    }

    /// Replace the cache policy.
    #[must_use]
    pub fn cache_policy(&self, cache_policy: CachePolicy) -> Self {
        self.map_request(|request| request.cache_policy = cache_policy)
    }

    /// Replace the advanced options record wholesale.
    #[must_use]
    pub fn options(&self, options: RequestOptions) -> Self {
        self.map_request(|request| request.options = options)
    }

    /// Replace the user-info mapping wholesale.
    #[must_use]
    pub fn user_info(&self, user_info: BTreeMap<String, serde_json::Value>) -> Self {
        self.map_request(|request| request.user_info = user_info)
    }

    /// Append one processor; it runs after all previously appended ones.
    #[must_use]
    pub fn process(&self, processor: Processor) -> Self {
        self.map_request(|request| request.processors.push(processor))
    }

    /// Append a whole processor sequence after the existing entries.
    ///
    /// Appends rather than replaces, keeping a single `processors` call
    /// consistent with the same sequence of [`process`](Self::process)
    /// calls.
    #[must_use]
    pub fn processors<I>(&self, processors: I) -> Self
    where
        I: IntoIterator<Item = Processor>,
    {
        self.map_request(|request| request.processors.extend(processors))
    }

    /// Deliver progress and completion callbacks on the given target.
    #[must_use]
    pub fn schedule_on(&self, dispatch: DispatchTarget) -> Self {
        let mut copy = self.clone();
        copy.dispatch = dispatch;
        copy
    }

    /// Resize towards `size`: aspect-fill, points, no crop, no upscale.
    ///
    /// Use [`process`](Self::process) with a full [`ResizeSpec`] for crop,
    /// upscale, or pixel-unit control.
    #[must_use]
    pub fn resize(&self, size: Size) -> Self {
        self.process(Processor::resize(ResizeSpec::new(size)))
    }

    /// Resize to the given width, preserving aspect ratio without cropping.
    ///
    /// The height bound is left unconstrained and aspect-fit scaling is
    /// forced, regardless of the mode a full resize would carry.
    #[must_use]
    pub fn fill_width(&self, width: f32) -> Self {
        self.process(Processor::resize(ResizeSpec::fit(Size::new(
            width, UNBOUNDED,
        ))))
    }

    /// Resize to the given height, preserving aspect ratio without
    /// cropping. The width bound is left unconstrained and aspect-fit
    /// scaling is forced.
    #[must_use]
    pub fn fill_height(&self, height: f32) -> Self {
        self.process(Processor::resize(ResizeSpec::fit(Size::new(
            UNBOUNDED, height,
        ))))
    }

    /// Crop the image into a circle, optionally drawing a border.
    #[must_use]
    pub fn circle_crop(&self, border: Option<Border>) -> Self {
        self.process(Processor::circle(border))
    }

    /// Round the image corners to `radius` points.
    #[must_use]
    pub fn rounded_corners(&self, radius: f32, border: Option<Border>) -> Self {
        self.process(Processor::rounded_corners(
            radius,
            ScaleUnit::Points,
            border,
        ))
    }

    /// Apply a named platform colour filter.
    ///
    /// `identity` must be stable for equal parameter sets; it is what the
    /// result cache compares.
    #[must_use]
    pub fn color_filter(
        &self,
        name: impl Into<String>,
        parameters: BTreeMap<String, serde_json::Value>,
        identity: impl Into<String>,
    ) -> Self {
        self.process(Processor::color_filter(name, parameters, identity))
    }

    /// Blur the image with a gaussian kernel of the given radius.
    #[must_use]
    pub fn blur(&self, radius: u32) -> Self {
        self.process(Processor::gaussian_blur(radius))
    }

    /// Process the image with a closure under an explicit identity.
    #[must_use]
    pub fn process_with(
        &self,
        identity: impl Into<String>,
        apply: impl Fn(ImageFrame) -> Option<ImageFrame> + Send + Sync + 'static,
    ) -> Self {
        self.process(Processor::anonymous(identity, apply))
    }

    /// Start the load.
    ///
    /// Every load-level failure (network, decode, processor) is reported
    /// through `on_completion`; the returned handle only adds cancellation
    /// on top of the pipeline's contract.
    pub fn load(
        &self,
        on_progress: Option<ProgressHandler>,
        on_completion: Option<CompletionHandler>,
    ) -> TaskHandle {
        debug!(
            cache_key = %self.request.cache_key(),
            priority = ?self.request.priority,
            "submitting image load"
        );
        self.pipeline.submit(LoadSubmission {
            request: self.request.clone(),
            dispatch: self.dispatch.clone(),
            on_progress,
            on_completion,
        })
    }

    /// Cold event stream for this request.
    ///
    /// The load starts when the stream is first polled; dropping the
    /// stream before its terminal event cancels the task.
    #[must_use]
    pub fn stream(&self) -> LoadStream {
        LoadStream::cold(
            Arc::clone(&self.pipeline),
            self.request.clone(),
            self.dispatch.clone(),
        )
    }

    /// Await the terminal outcome of a load.
    ///
    /// # Errors
    ///
    /// Returns the pipeline-reported [`LoadError`]; a stream that ends
    /// without a terminal event is reported as cancelled.
    pub async fn fetch(&self) -> LoadResult {
        let mut stream = self.stream();
        loop {
            match stream.next().await {
                Some(LoadEvent::Progress(_)) => {}
                Some(LoadEvent::Completed(response)) => return Ok(response),
                Some(LoadEvent::Failed(error)) => return Err(error),
                None => return Err(LoadError::Cancelled),
            }
        }
    }

    /// Hand the current snapshot to a display-focused builder.
    ///
    /// Executes nothing by itself; the returned builder starts with
    /// default display options.
    #[must_use]
    pub fn display_in(&self, surface: Arc<dyn DisplaySurface>) -> DisplayRequestBuilder {
        DisplayRequestBuilder::new(self.clone(), surface)
    }
}

impl std::fmt::Debug for ImageRequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRequestBuilder")
            .field("request", &self.request)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}
