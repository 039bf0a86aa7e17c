//! Display-options accumulator bound to a fixed request snapshot.

use std::sync::Arc;

use pictor_core::{
    CompletionHandler, ContentMode, ContentModeOverrides, DisplayOptions, DisplayOutcome,
    DisplaySubmission, DisplaySurface, ImageFrame, ImageRequest, ProgressHandler, TaskHandle,
    Transition,
};
use tracing::debug;

use crate::request::ImageRequestBuilder;

/// Chainable accumulator for [`DisplayOptions`] against a fixed request
/// snapshot and a fixed display surface.
///
/// Shares the request builder's value semantics: every option call returns
/// a new value and leaves the receiver untouched.
#[derive(Clone)]
pub struct DisplayRequestBuilder {
    builder: ImageRequestBuilder,
    surface: Arc<dyn DisplaySurface>,
    options: DisplayOptions,
}

impl DisplayRequestBuilder {
    pub(crate) fn new(builder: ImageRequestBuilder, surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            builder,
            surface,
            options: DisplayOptions::default(),
        }
    }

    /// Request snapshot carried from the originating builder.
    #[must_use]
    pub const fn request(&self) -> &ImageRequest {
        self.builder.request()
    }

    /// Accumulated display options.
    #[must_use]
    pub const fn options(&self) -> &DisplayOptions {
        &self.options
    }

    fn map_options(&self, apply: impl FnOnce(&mut DisplayOptions)) -> Self {
        let mut copy = self.clone();
        apply(&mut copy.options);
        copy
    }

    /// Frame shown while the load is in flight and no cached image exists.
    #[must_use]
    pub fn placeholder(&self, frame: ImageFrame) -> Self {
        self.map_options(|options| options.placeholder = Some(frame))
    }

    /// Frame shown when the load fails.
    #[must_use]
    pub fn failure_image(&self, frame: ImageFrame) -> Self {
        self.map_options(|options| options.failure_image = Some(frame))
    }

    /// Transition for the given outcome.
    ///
    /// The placeholder outcome has no transition slot and the call is a
    /// deliberate no-op for it, kept so callers can treat the three
    /// outcomes uniformly.
    #[must_use]
    pub fn transition(&self, transition: Transition, outcome: DisplayOutcome) -> Self {
        self.map_options(|options| match outcome {
            DisplayOutcome::Success => options.success_transition = Some(transition),
            DisplayOutcome::Failure => options.failure_transition = Some(transition),
            DisplayOutcome::Placeholder => {}
        })
    }

    /// Run transitions even when the fast-path cache already had the
    /// image.
    #[must_use]
    pub fn always_transition(&self) -> Self {
        self.map_options(|options| options.always_transition = true)
    }

    /// Control clearing of stale content before this load starts; enabled
    /// by default.
    #[must_use]
    pub fn prepare_for_reuse(&self, enabled: bool) -> Self {
        self.map_options(|options| options.prepare_for_reuse = enabled)
    }

    /// Content mode applied with the given outcome's image.
    ///
    /// The first customization snapshots the surface's current mode into
    /// all three slots; afterwards only the requested slot is overwritten.
    #[must_use]
    pub fn content_mode(&self, mode: ContentMode, outcome: DisplayOutcome) -> Self {
        let current = self.surface.content_mode();
        self.map_options(|options| {
            let overrides = options
                .content_modes
                .get_or_insert_with(|| ContentModeOverrides::uniform(current));
            match outcome {
                DisplayOutcome::Success => overrides.success = mode,
                DisplayOutcome::Failure => overrides.failure = mode,
                DisplayOutcome::Placeholder => overrides.placeholder = mode,
            }
        })
    }

    /// Start the load into the surface.
    ///
    /// Returns `None` when the pipeline's fast-path cache satisfied the
    /// request synchronously; otherwise the handle of the started task.
    /// Cache probing, placeholder application, reuse preparation, and the
    /// final apply all belong to the pipeline's view entry point.
    pub fn load(
        &self,
        on_progress: Option<ProgressHandler>,
        on_completion: Option<CompletionHandler>,
    ) -> Option<TaskHandle> {
        debug!(
            cache_key = %self.builder.request().cache_key(),
            "submitting display load"
        );
        self.builder.pipeline().submit_display(DisplaySubmission {
            request: self.builder.request().clone(),
            options: self.options.clone(),
            surface: Arc::clone(&self.surface),
            dispatch: self.builder.dispatch().clone(),
            on_progress,
            on_completion,
        })
    }
}

impl std::fmt::Debug for DisplayRequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayRequestBuilder")
            .field("request", self.builder.request())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use pictor_core::{
        ImagePipeline, LoadSubmission, Priority, Processor, ResizeSpec, Size, SourceError,
    };

    struct StubPipeline;

    impl ImagePipeline for StubPipeline {
        fn submit(&self, submission: LoadSubmission) -> TaskHandle {
            let _ = submission;
            TaskHandle::new()
        }

        fn submit_display(&self, submission: DisplaySubmission) -> Option<TaskHandle> {
            let _ = submission;
            None
        }
    }

    struct StubSurface {
        mode: Mutex<ContentMode>,
    }

    impl StubSurface {
        fn with_content_mode(mode: ContentMode) -> Self {
            Self {
                mode: Mutex::new(mode),
            }
        }
    }

    impl DisplaySurface for StubSurface {
        fn content_mode(&self) -> ContentMode {
            *self.mode.lock().expect("mode mutex poisoned")
        }

        fn set_content_mode(&self, mode: ContentMode) {
            *self.mode.lock().expect("mode mutex poisoned") = mode;
        }

        fn set_image(&self, frame: Option<ImageFrame>) {
            let _ = frame;
        }

        fn run_transition(&self, transition: Transition) {
            let _ = transition;
        }

        fn cancel_transitions(&self) {}
    }

    fn display_builder(surface_mode: ContentMode) -> Result<DisplayRequestBuilder, SourceError> {
        let builder = ImageRequestBuilder::new(
            Arc::new(StubPipeline),
            "https://example.com/image.jpeg",
        )?;
        Ok(builder.display_in(Arc::new(StubSurface::with_content_mode(surface_mode))))
    }

    #[test]
    fn display_in_preserves_the_request_snapshot() {
        let resize = Processor::resize(ResizeSpec::fit(Size::new(100.0, 100.0)));
        let builder =
            ImageRequestBuilder::new(Arc::new(StubPipeline), "https://example.com/image.jpeg")
                .expect("sample url should parse")
                .priority(Priority::High)
                .process(resize.clone());

        let display = builder
            .display_in(Arc::new(StubSurface::with_content_mode(
                ContentMode::ScaleToFill,
            )))
            .placeholder(ImageFrame::with_dimensions(1, 1));

        assert_eq!(display.request().priority, Priority::High);
        assert_eq!(display.request().processors, vec![resize]);
    }

    #[test]
    fn placeholder_transition_is_a_noop() {
        let display = display_builder(ContentMode::ScaleToFill).expect("builder should construct");
        let transition = Transition::FadeIn(Duration::from_millis(330));

        let configured = display.transition(transition, DisplayOutcome::Placeholder);
        assert_eq!(configured.options(), display.options());
        assert!(configured.options().success_transition.is_none());
        assert!(configured.options().failure_transition.is_none());

        let success = configured.transition(transition, DisplayOutcome::Success);
        assert_eq!(success.options().success_transition, Some(transition));
        assert!(success.options().failure_transition.is_none());
    }

    #[test]
    fn option_calls_leave_the_receiver_untouched() {
        let base = display_builder(ContentMode::ScaleToFill).expect("builder should construct");
        let configured = base
            .placeholder(ImageFrame::with_dimensions(1, 1))
            .always_transition()
            .prepare_for_reuse(false);

        assert!(base.options().placeholder.is_none());
        assert!(!base.options().always_transition);
        assert!(base.options().prepare_for_reuse);

        assert!(configured.options().placeholder.is_some());
        assert!(configured.options().always_transition);
        assert!(!configured.options().prepare_for_reuse);
    }

    #[test]
    fn first_content_mode_write_snapshots_every_slot() {
        let display = display_builder(ContentMode::AspectFit).expect("builder should construct");
        assert!(display.options().content_modes.is_none());

        let customized = display.content_mode(ContentMode::Center, DisplayOutcome::Failure);
        let overrides = customized
            .options()
            .content_modes
            .expect("overrides materialized on first write");
        assert_eq!(overrides.failure, ContentMode::Center);
        assert_eq!(overrides.success, ContentMode::AspectFit);
        assert_eq!(overrides.placeholder, ContentMode::AspectFit);

        let repainted = customized.content_mode(ContentMode::AspectFill, DisplayOutcome::Success);
        let overrides = repainted
            .options()
            .content_modes
            .expect("overrides kept on later writes");
        assert_eq!(overrides.success, ContentMode::AspectFill);
        assert_eq!(overrides.failure, ContentMode::Center);
        assert_eq!(overrides.placeholder, ContentMode::AspectFit);
    }
}
