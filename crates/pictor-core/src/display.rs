//! Display-side configuration carried to the pipeline's view-loading entry
//! point.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ImageFrame;

/// Content placement within a display surface.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    /// Stretch the image to fill the surface.
    #[default]
    ScaleToFill,
    /// Scale preserving aspect ratio so the whole image is visible.
    AspectFit,
    /// Scale preserving aspect ratio so the surface is covered.
    AspectFill,
    /// Centre without scaling.
    Center,
}

/// Outcome slot a display option applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// The decoded image was applied.
    Success,
    /// The failure image was applied.
    Failure,
    /// The placeholder was applied while loading.
    Placeholder,
}

/// Transition animation applied when new content is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Cross-fade from the current content over the given duration.
    FadeIn(Duration),
}

/// Per-outcome content-mode overrides.
///
/// Materialized lazily from the surface's current mode the first time any
/// slot is customized; until then the options record carries no overrides
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentModeOverrides {
    /// Mode applied with the decoded image.
    pub success: ContentMode,
    /// Mode applied with the failure image.
    pub failure: ContentMode,
    /// Mode applied with the placeholder.
    pub placeholder: ContentMode,
}

impl ContentModeOverrides {
    /// Seed every slot from a single mode.
    #[must_use]
    pub const fn uniform(mode: ContentMode) -> Self {
        Self {
            success: mode,
            failure: mode,
            placeholder: mode,
        }
    }
}

/// Options record consumed by the view-loading entry point.
///
/// The facade only carries this configuration; the entry point owns cache
/// probing, placeholder application, reuse preparation, and the final
/// apply-with-transition.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    /// Shown while the load is in flight and no cached image exists.
    pub placeholder: Option<ImageFrame>,
    /// Shown when the load fails.
    pub failure_image: Option<ImageFrame>,
    /// Transition for successfully loaded images.
    pub success_transition: Option<Transition>,
    /// Transition for the failure image.
    pub failure_transition: Option<Transition>,
    /// Run the transition even when the image came from the fast-path
    /// cache.
    pub always_transition: bool,
    /// Clear stale content and cancel in-flight animations before a new
    /// load starts.
    pub prepare_for_reuse: bool,
    /// Per-outcome content-mode overrides; `None` until first customized.
    pub content_modes: Option<ContentModeOverrides>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            placeholder: None,
            failure_image: None,
            success_transition: None,
            failure_transition: None,
            always_transition: false,
            prepare_for_reuse: true,
            content_modes: None,
        }
    }
}

impl DisplayOptions {
    /// Transition slot for the outcome.
    ///
    /// The placeholder outcome has no transition slot; it is kept in
    /// [`DisplayOutcome`] for API symmetry and always yields `None`.
    #[must_use]
    pub const fn transition(&self, outcome: DisplayOutcome) -> Option<Transition> {
        match outcome {
            DisplayOutcome::Success => self.success_transition,
            DisplayOutcome::Failure => self.failure_transition,
            DisplayOutcome::Placeholder => None,
        }
    }
}

/// External view-like object an image is ultimately rendered into.
///
/// Implementations live outside this workspace. The facade reads the
/// current content mode for lazy overrides; the pipeline's view entry
/// point drives everything else.
pub trait DisplaySurface: Send + Sync {
    /// Current content placement mode.
    fn content_mode(&self) -> ContentMode;

    /// Update the content placement mode.
    fn set_content_mode(&self, mode: ContentMode);

    /// Replace the displayed frame; `None` clears the surface.
    fn set_image(&self, frame: Option<ImageFrame>);

    /// Run a transition animation over the next content change.
    fn run_transition(&self, transition: Transition);

    /// Cancel any in-flight transition animation.
    fn cancel_transitions(&self);
}
