//! Scripted pipeline and surface doubles.
//!
//! [`MockPipeline`] plays the external executor: `submit` replays a
//! scripted [`LoadPlan`] on a spawned task, and `submit_display` emulates
//! the view entry point (synchronous memory-cache probe, reuse
//! preparation, placeholder application, final apply-with-transition).
//! [`MockSurface`] records every interaction in call order so suites can
//! assert on the exact sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pictor_core::{
    CachePolicy, CacheSource, Cancellation, CompletionHandler, ContentMode, DispatchTarget,
    DisplayOptions, DisplaySubmission, DisplaySurface, ImageFrame, ImagePipeline, ImageRequest,
    ImageResponse, LoadError, LoadResult, LoadSubmission, ProcessorKind, ProgressHandler,
    ProgressUpdate, TaskHandle, Transition,
};
use tokio::time::sleep;
use tracing::debug;

/// Scripted behaviour applied to submissions.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    /// Frame the load "decodes" before processors run.
    pub source_frame: ImageFrame,
    /// Progress updates emitted before the terminal event.
    pub progress: Vec<ProgressUpdate>,
    /// Terminal outcome; `Ok(())` delivers the processed source frame.
    pub outcome: Result<(), LoadError>,
    /// Artificial delay between emitted events.
    pub step_delay: Duration,
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            source_frame: ImageFrame::with_dimensions(400, 300),
            progress: vec![
                ProgressUpdate {
                    completed_bytes: 50_000,
                    total_bytes: 100_000,
                    preview: None,
                },
                ProgressUpdate {
                    completed_bytes: 100_000,
                    total_bytes: 100_000,
                    preview: None,
                },
            ],
            outcome: Ok(()),
            step_delay: Duration::ZERO,
        }
    }
}

impl LoadPlan {
    /// Plan failing with the given error after the default progress run.
    #[must_use]
    pub fn failing(error: LoadError) -> Self {
        Self {
            outcome: Err(error),
            ..Self::default()
        }
    }

    /// Plan succeeding with the given source frame and no progress events.
    #[must_use]
    pub fn immediate(frame: ImageFrame) -> Self {
        Self {
            source_frame: frame,
            progress: Vec::new(),
            ..Self::default()
        }
    }
}

/// Snapshot of one `submit` call.
#[derive(Debug, Clone)]
pub struct RecordedLoad {
    /// Request carried by the submission.
    pub request: ImageRequest,
    /// Whether delivery was pinned to a caller runtime.
    pub pinned_dispatch: bool,
    /// Whether a progress callback was attached.
    pub had_progress: bool,
    /// Whether a completion callback was attached.
    pub had_completion: bool,
    /// Handle returned to the caller.
    pub handle: TaskHandle,
}

/// Snapshot of one `submit_display` call.
#[derive(Debug, Clone)]
pub struct RecordedDisplayLoad {
    /// Request carried by the submission.
    pub request: ImageRequest,
    /// Options carried by the submission.
    pub options: DisplayOptions,
    /// Whether the fast-path cache satisfied the request synchronously.
    pub fast_path: bool,
    /// Handle returned to the caller; absent on the fast path.
    pub handle: Option<TaskHandle>,
}

/// Pipeline double driving callbacks from a scripted [`LoadPlan`].
#[derive(Clone, Default)]
pub struct MockPipeline {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    plan: Mutex<LoadPlan>,
    memory_cache: Mutex<HashMap<String, ImageFrame>>,
    loads: Mutex<Vec<RecordedLoad>>,
    display_loads: Mutex<Vec<RecordedDisplayLoad>>,
}

impl MockPipeline {
    /// Pipeline with the default succeed-after-two-progress-events plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the plan applied to subsequent submissions.
    ///
    /// # Panics
    ///
    /// Panics if the plan mutex has been poisoned.
    pub fn set_plan(&self, plan: LoadPlan) {
        *self.state.plan.lock().expect("plan mutex poisoned") = plan;
    }

    /// Prime the fast-path memory cache for a request's cache key.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex has been poisoned.
    pub fn prime_cache(&self, key: impl Into<String>, frame: ImageFrame) {
        self.state
            .memory_cache
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.into(), frame);
    }

    /// Recorded `submit` calls in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the load log mutex has been poisoned.
    #[must_use]
    pub fn loads(&self) -> Vec<RecordedLoad> {
        self.state
            .loads
            .lock()
            .expect("load log mutex poisoned")
            .clone()
    }

    /// Recorded `submit_display` calls in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if the display log mutex has been poisoned.
    #[must_use]
    pub fn display_loads(&self) -> Vec<RecordedDisplayLoad> {
        self.state
            .display_loads
            .lock()
            .expect("display log mutex poisoned")
            .clone()
    }

    fn plan(&self) -> LoadPlan {
        self.state.plan.lock().expect("plan mutex poisoned").clone()
    }

    fn memory_cached(&self, request: &ImageRequest) -> Option<ImageFrame> {
        if !request.options.memory_cache_read {
            return None;
        }
        if matches!(request.cache_policy, CachePolicy::ReloadIgnoringCachedData) {
            return None;
        }
        self.state
            .memory_cache
            .lock()
            .expect("cache mutex poisoned")
            .get(&request.cache_key())
            .cloned()
    }

    fn store(&self, request: &ImageRequest, frame: &ImageFrame) {
        if request.options.memory_cache_write {
            self.state
                .memory_cache
                .lock()
                .expect("cache mutex poisoned")
                .insert(request.cache_key(), frame.clone());
        }
    }
}

impl ImagePipeline for MockPipeline {
    fn submit(&self, submission: LoadSubmission) -> TaskHandle {
        let LoadSubmission {
            request,
            dispatch,
            on_progress,
            on_completion,
        } = submission;
        let handle = TaskHandle::new();
        debug!(
            cache_key = %request.cache_key(),
            task = %handle.id(),
            "mock pipeline accepted load"
        );
        self.state
            .loads
            .lock()
            .expect("load log mutex poisoned")
            .push(RecordedLoad {
                request: request.clone(),
                pinned_dispatch: dispatch.is_pinned(),
                had_progress: on_progress.is_some(),
                had_completion: on_completion.is_some(),
                handle: handle.clone(),
            });

        let pipeline = self.clone();
        let plan = self.plan();
        let cancellation = handle.cancellation();
        spawn_on(&dispatch, async move {
            run_plan(
                plan,
                &request,
                &cancellation,
                on_progress,
                on_completion,
                |frame| pipeline.store(&request, frame),
            )
            .await;
        });
        handle
    }

    fn submit_display(&self, submission: DisplaySubmission) -> Option<TaskHandle> {
        let DisplaySubmission {
            request,
            options,
            surface,
            dispatch,
            on_progress,
            on_completion,
        } = submission;

        if let Some(frame) = self.memory_cached(&request) {
            debug!(cache_key = %request.cache_key(), "display load satisfied from memory cache");
            if let Some(overrides) = options.content_modes {
                surface.set_content_mode(overrides.success);
            }
            if options.always_transition
                && let Some(transition) = options.success_transition
            {
                surface.run_transition(transition);
            }
            surface.set_image(Some(frame.clone()));
            self.state
                .display_loads
                .lock()
                .expect("display log mutex poisoned")
                .push(RecordedDisplayLoad {
                    request,
                    options,
                    fast_path: true,
                    handle: None,
                });
            deliver(on_completion, Ok(ImageResponse::cached(frame, CacheSource::Memory)));
            return None;
        }

        if options.prepare_for_reuse {
            surface.set_image(None);
            surface.cancel_transitions();
        }
        if let Some(placeholder) = options.placeholder.clone() {
            if let Some(overrides) = options.content_modes {
                surface.set_content_mode(overrides.placeholder);
            }
            surface.set_image(Some(placeholder));
        }

        let handle = TaskHandle::new();
        self.state
            .display_loads
            .lock()
            .expect("display log mutex poisoned")
            .push(RecordedDisplayLoad {
                request: request.clone(),
                options: options.clone(),
                fast_path: false,
                handle: Some(handle.clone()),
            });

        let pipeline = self.clone();
        let plan = self.plan();
        let cancellation = handle.cancellation();
        spawn_on(&dispatch, async move {
            let mut on_progress = on_progress;
            let LoadPlan {
                source_frame,
                progress,
                outcome,
                step_delay,
            } = plan;
            for update in progress {
                if cancellation.is_cancelled() {
                    deliver(on_completion, Err(LoadError::Cancelled));
                    return;
                }
                if let Some(handler) = on_progress.as_mut() {
                    handler(update);
                }
                pace(step_delay).await;
            }
            if cancellation.is_cancelled() {
                deliver(on_completion, Err(LoadError::Cancelled));
                return;
            }
            match outcome.and_then(|()| apply_processors(&request, source_frame)) {
                Ok(frame) => {
                    pipeline.store(&request, &frame);
                    if let Some(overrides) = options.content_modes {
                        surface.set_content_mode(overrides.success);
                    }
                    if let Some(transition) = options.success_transition {
                        surface.run_transition(transition);
                    }
                    surface.set_image(Some(frame.clone()));
                    deliver(on_completion, Ok(ImageResponse::fresh(frame)));
                }
                Err(error) => {
                    if let Some(failure_frame) = options.failure_image.clone() {
                        if let Some(overrides) = options.content_modes {
                            surface.set_content_mode(overrides.failure);
                        }
                        if let Some(transition) = options.failure_transition {
                            surface.run_transition(transition);
                        }
                        surface.set_image(Some(failure_frame));
                    }
                    deliver(on_completion, Err(error));
                }
            }
        });
        Some(handle)
    }
}

async fn run_plan(
    plan: LoadPlan,
    request: &ImageRequest,
    cancellation: &Cancellation,
    mut on_progress: Option<ProgressHandler>,
    on_completion: Option<CompletionHandler>,
    store: impl FnOnce(&ImageFrame),
) {
    let LoadPlan {
        source_frame,
        progress,
        outcome,
        step_delay,
    } = plan;
    for update in progress {
        if cancellation.is_cancelled() {
            deliver(on_completion, Err(LoadError::Cancelled));
            return;
        }
        if let Some(handler) = on_progress.as_mut() {
            handler(update);
        }
        pace(step_delay).await;
    }
    if cancellation.is_cancelled() {
        deliver(on_completion, Err(LoadError::Cancelled));
        return;
    }
    let result = outcome
        .and_then(|()| apply_processors(request, source_frame))
        .map(|frame| {
            store(&frame);
            ImageResponse::fresh(frame)
        });
    deliver(on_completion, result);
}

/// Fold the request's processors over a decoded frame.
///
/// Only dimension-affecting and closure kinds change the frame here;
/// colour filters and corner crops keep their input dimensions.
fn apply_processors(request: &ImageRequest, frame: ImageFrame) -> Result<ImageFrame, LoadError> {
    let mut frame = frame;
    for processor in &request.processors {
        frame = match processor.kind() {
            ProcessorKind::Resize(spec) => {
                let (width, height) = spec.scaled_dimensions(frame.width, frame.height);
                ImageFrame {
                    width,
                    height,
                    data: frame.data,
                }
            }
            ProcessorKind::Anonymous { apply } => {
                apply(frame).ok_or_else(|| LoadError::Processing {
                    processor: processor.identity().to_owned(),
                    message: "anonymous transform returned no frame".to_owned(),
                })?
            }
            ProcessorKind::Circle { .. }
            | ProcessorKind::RoundedCorners { .. }
            | ProcessorKind::ColorFilter { .. }
            | ProcessorKind::GaussianBlur { .. } => frame,
        };
    }
    Ok(frame)
}

fn deliver(on_completion: Option<CompletionHandler>, result: LoadResult) {
    if let Some(done) = on_completion {
        done(result);
    }
}

async fn pace(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        sleep(delay).await;
    }
}

fn spawn_on(dispatch: &DispatchTarget, future: impl Future<Output = ()> + Send + 'static) {
    match dispatch {
        DispatchTarget::Runtime(handle) => drop(handle.spawn(future)),
        DispatchTarget::PipelineDefault => drop(tokio::spawn(future)),
    }
}

/// One recorded surface interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// `set_content_mode` call.
    ContentMode(ContentMode),
    /// `set_image` call; `None` means the surface was cleared.
    Image(Option<ImageFrame>),
    /// `run_transition` call.
    Transition(Transition),
    /// `cancel_transitions` call.
    TransitionsCancelled,
}

/// Display-surface double recording every interaction in call order.
#[derive(Debug)]
pub struct MockSurface {
    mode: Mutex<ContentMode>,
    events: Mutex<Vec<SurfaceEvent>>,
}

impl MockSurface {
    /// Surface starting in the default content mode.
    #[must_use]
    pub fn new() -> Self {
        Self::with_content_mode(ContentMode::default())
    }

    /// Surface starting in the given content mode.
    #[must_use]
    pub fn with_content_mode(mode: ContentMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Every interaction recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the event log mutex has been poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .clone()
    }

    /// Most recently applied frame; `None` when the surface is cleared or
    /// untouched.
    ///
    /// # Panics
    ///
    /// Panics if the event log mutex has been poisoned.
    #[must_use]
    pub fn displayed_frame(&self) -> Option<ImageFrame> {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .iter()
            .rev()
            .find_map(|event| match event {
                SurfaceEvent::Image(frame) => Some(frame.clone()),
                SurfaceEvent::ContentMode(_)
                | SurfaceEvent::Transition(_)
                | SurfaceEvent::TransitionsCancelled => None,
            })
            .flatten()
    }

    fn record(&self, event: SurfaceEvent) {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .push(event);
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for MockSurface {
    fn content_mode(&self) -> ContentMode {
        *self.mode.lock().expect("mode mutex poisoned")
    }

    fn set_content_mode(&self, mode: ContentMode) {
        *self.mode.lock().expect("mode mutex poisoned") = mode;
        self.record(SurfaceEvent::ContentMode(mode));
    }

    fn set_image(&self, frame: Option<ImageFrame>) {
        self.record(SurfaceEvent::Image(frame));
    }

    fn run_transition(&self, transition: Transition) {
        self.record(SurfaceEvent::Transition(transition));
    }

    fn cancel_transitions(&self) {
        self.record(SurfaceEvent::TransitionsCancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictor_core::{IntoImageRequest, Processor};

    fn request() -> ImageRequest {
        crate::fixtures::SAMPLE_URL
            .into_image_request()
            .expect("sample url should parse")
    }

    #[tokio::test]
    async fn anonymous_processor_failures_surface_as_processing_errors() {
        let pipeline = MockPipeline::new();
        pipeline.set_plan(LoadPlan::immediate(crate::fixtures::frame(10, 10)));
        let mut request = request();
        request.processors.push(Processor::anonymous("reject", |_| None));

        let (tx, rx) = tokio::sync::oneshot::channel();
        let _handle = pipeline.submit(LoadSubmission {
            request,
            dispatch: DispatchTarget::default(),
            on_progress: None,
            on_completion: Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        });

        let result = rx.await.expect("completion delivered");
        assert!(matches!(result, Err(LoadError::Processing { .. })));
    }

    #[tokio::test]
    async fn reload_policy_bypasses_the_fast_path_cache() {
        let pipeline = MockPipeline::new();
        let request = request();
        pipeline.prime_cache(request.cache_key(), crate::fixtures::frame(1, 1));
        let surface = Arc::new(MockSurface::new());

        let hit = pipeline.submit_display(DisplaySubmission {
            request: request.clone(),
            options: DisplayOptions::default(),
            surface: Arc::clone(&surface) as Arc<dyn DisplaySurface>,
            dispatch: DispatchTarget::default(),
            on_progress: None,
            on_completion: None,
        });
        assert!(hit.is_none());

        let mut reload = request;
        reload.cache_policy = CachePolicy::ReloadIgnoringCachedData;
        let miss = pipeline.submit_display(DisplaySubmission {
            request: reload,
            options: DisplayOptions::default(),
            surface: Arc::clone(&surface) as Arc<dyn DisplaySurface>,
            dispatch: DispatchTarget::default(),
            on_progress: None,
            on_completion: None,
        });
        assert!(miss.is_some());
    }
}
