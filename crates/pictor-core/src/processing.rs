//! Processor model and the stable identities used for cache equality.
//!
//! # Design
//! - A processor's identity string is canonical: it encodes every effective
//!   parameter, so equal parameters yield equal identities no matter which
//!   constructor produced them.
//! - Equality and hashing use only the identity; getting this wrong would
//!   silently defeat the pipeline's result cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::ImageFrame;

/// Axis bound meaning "no constraint in this dimension".
///
/// Formats as `inf` inside identity strings, keeping equality canonical.
pub const UNBOUNDED: f32 = f32::INFINITY;

/// Target size in [`ScaleUnit`] units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent; [`UNBOUNDED`] leaves the axis unconstrained.
    pub width: f32,
    /// Vertical extent; [`UNBOUNDED`] leaves the axis unconstrained.
    pub height: f32,
}

impl Size {
    /// Size with the given extents.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Unit for target sizes and radii.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleUnit {
    /// Logical points, resolved against the surface scale by the pipeline.
    #[default]
    Points,
    /// Raw pixels.
    Pixels,
}

impl ScaleUnit {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Pixels => "pixels",
        }
    }
}

/// How a resize maps the source image onto the target box.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// Scale so the whole image fits inside the target box.
    AspectFit,
    /// Scale so the image covers the whole target box.
    #[default]
    AspectFill,
}

impl ScalingMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::AspectFit => "aspect_fit",
            Self::AspectFill => "aspect_fill",
        }
    }
}

/// Optional border drawn around cropped output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Border {
    /// RGBA colour components.
    pub color: [u8; 4],
    /// Stroke width.
    pub width: f32,
    /// Unit of the stroke width.
    pub unit: ScaleUnit,
}

impl Border {
    /// Border with the given colour and width, measured in points.
    #[must_use]
    pub const fn new(color: [u8; 4], width: f32) -> Self {
        Self {
            color,
            width,
            unit: ScaleUnit::Points,
        }
    }
}

/// Full parameter set for a resize step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeSpec {
    /// Target box the source is mapped onto.
    pub target: Size,
    /// Unit of the target box.
    pub unit: ScaleUnit,
    /// Fit or fill behaviour.
    pub mode: ScalingMode,
    /// Whether output is trimmed to the target box after filling.
    pub crop: bool,
    /// Whether the image may grow beyond its source dimensions.
    pub upscale: bool,
}

impl ResizeSpec {
    /// Aspect-fill resize towards `target` in points, without crop or
    /// upscale.
    #[must_use]
    pub const fn new(target: Size) -> Self {
        Self {
            target,
            unit: ScaleUnit::Points,
            mode: ScalingMode::AspectFill,
            crop: false,
            upscale: false,
        }
    }

    /// Aspect-fit resize towards `target` in points, without crop or
    /// upscale. Used by the width/height convenience shorthands.
    #[must_use]
    pub const fn fit(target: Size) -> Self {
        Self {
            target,
            unit: ScaleUnit::Points,
            mode: ScalingMode::AspectFit,
            crop: false,
            upscale: false,
        }
    }

    /// Output dimensions for a source of `width` x `height` pixels.
    ///
    /// Pure geometry shared with pipeline adapters so every implementation
    /// agrees on the effective size. An unbounded axis defers to the
    /// constrained one; without `upscale` the scale is clamped to 1.
    #[must_use]
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        let scale_x = self.target.width / to_f32(width);
        let scale_y = self.target.height / to_f32(height);
        let mut scale = match self.mode {
            ScalingMode::AspectFit => scale_x.min(scale_y),
            ScalingMode::AspectFill => scale_x.max(scale_y),
        };
        if !scale.is_finite() {
            scale = if scale_x.is_finite() {
                scale_x
            } else if scale_y.is_finite() {
                scale_y
            } else {
                1.0
            };
        }
        if !self.upscale {
            scale = scale.min(1.0);
        }
        let scaled_width = to_f32(width) * scale;
        let scaled_height = to_f32(height) * scale;
        if self.crop {
            (
                to_pixels(scaled_width.min(self.target.width)),
                to_pixels(scaled_height.min(self.target.height)),
            )
        } else {
            (to_pixels(scaled_width), to_pixels(scaled_height))
        }
    }
}

/// Closure signature for anonymous processors.
pub type TransformFn = dyn Fn(ImageFrame) -> Option<ImageFrame> + Send + Sync;

/// One named, parameterized transformation step.
///
/// Equality and hashing consider only the stable identity.
#[derive(Clone)]
pub struct Processor {
    identity: String,
    kind: ProcessorKind,
}

/// Parameter payload of a processor.
#[derive(Clone)]
pub enum ProcessorKind {
    /// Geometry change described by a [`ResizeSpec`].
    Resize(ResizeSpec),
    /// Circular crop.
    Circle {
        /// Optional border drawn around the crop.
        border: Option<Border>,
    },
    /// Rounded-corner crop.
    RoundedCorners {
        /// Corner radius.
        radius: f32,
        /// Unit of the radius.
        unit: ScaleUnit,
        /// Optional border drawn around the crop.
        border: Option<Border>,
    },
    /// Named platform colour filter with a parameter bag.
    ColorFilter {
        /// Platform filter name.
        name: String,
        /// Filter parameters forwarded verbatim.
        parameters: BTreeMap<String, serde_json::Value>,
    },
    /// Gaussian blur.
    GaussianBlur {
        /// Blur radius in points.
        radius: u32,
    },
    /// Caller-supplied closure with an explicit identity.
    Anonymous {
        /// Transformation to run; `None` output marks a processing failure.
        apply: Arc<TransformFn>,
    },
}

impl Processor {
    /// Resize processor for the given spec.
    #[must_use]
    pub fn resize(spec: ResizeSpec) -> Self {
        Self {
            identity: format!(
                "resize?w={}&h={}&unit={}&mode={}&crop={}&upscale={}",
                spec.target.width,
                spec.target.height,
                spec.unit.as_str(),
                spec.mode.as_str(),
                spec.crop,
                spec.upscale
            ),
            kind: ProcessorKind::Resize(spec),
        }
    }

    /// Circular crop with an optional border.
    #[must_use]
    pub fn circle(border: Option<Border>) -> Self {
        Self {
            identity: format!("circle?border={}", border_fragment(border.as_ref())),
            kind: ProcessorKind::Circle { border },
        }
    }

    /// Rounded-corner crop with the given radius.
    #[must_use]
    pub fn rounded_corners(radius: f32, unit: ScaleUnit, border: Option<Border>) -> Self {
        Self {
            identity: format!(
                "rounded-corners?radius={radius}&unit={}&border={}",
                unit.as_str(),
                border_fragment(border.as_ref())
            ),
            kind: ProcessorKind::RoundedCorners {
                radius,
                unit,
                border,
            },
        }
    }

    /// Named platform colour filter.
    ///
    /// The identity is caller-supplied because parameter bags have no
    /// canonical ordering guarantee across platforms; callers must keep it
    /// stable for equal parameter sets.
    #[must_use]
    pub fn color_filter(
        name: impl Into<String>,
        parameters: BTreeMap<String, serde_json::Value>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind: ProcessorKind::ColorFilter {
                name: name.into(),
                parameters,
            },
        }
    }

    /// Gaussian blur with the given radius.
    #[must_use]
    pub fn gaussian_blur(radius: u32) -> Self {
        Self {
            identity: format!("gaussian-blur?radius={radius}"),
            kind: ProcessorKind::GaussianBlur { radius },
        }
    }

    /// Closure-backed processor with an explicit identity.
    ///
    /// The identity must uniquely describe the transformation; it is the
    /// only thing the cache can compare.
    #[must_use]
    pub fn anonymous(
        identity: impl Into<String>,
        apply: impl Fn(ImageFrame) -> Option<ImageFrame> + Send + Sync + 'static,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind: ProcessorKind::Anonymous {
                apply: Arc::new(apply),
            },
        }
    }

    /// Stable identity used for cache-key equality.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Parameter payload.
    #[must_use]
    pub const fn kind(&self) -> &ProcessorKind {
        &self.kind
    }
}

impl PartialEq for Processor {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Processor {}

impl std::hash::Hash for Processor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resize(spec) => f.debug_tuple("Resize").field(spec).finish(),
            Self::Circle { border } => f.debug_struct("Circle").field("border", border).finish(),
            Self::RoundedCorners {
                radius,
                unit,
                border,
            } => f
                .debug_struct("RoundedCorners")
                .field("radius", radius)
                .field("unit", unit)
                .field("border", border)
                .finish(),
            Self::ColorFilter { name, parameters } => f
                .debug_struct("ColorFilter")
                .field("name", name)
                .field("parameters", parameters)
                .finish(),
            Self::GaussianBlur { radius } => f
                .debug_struct("GaussianBlur")
                .field("radius", radius)
                .finish(),
            Self::Anonymous { .. } => f.debug_struct("Anonymous").finish_non_exhaustive(),
        }
    }
}

fn border_fragment(border: Option<&Border>) -> String {
    border.map_or_else(
        || "none".to_owned(),
        |border| {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}@{}{}",
                border.color[0],
                border.color[1],
                border.color[2],
                border.color[3],
                border.width,
                border.unit.as_str()
            )
        },
    )
}

fn to_f32(value: u32) -> f32 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "pixel counts are far below f32 precision limits for scaling purposes"
    )]
    {
        value as f32
    }
}

fn to_pixels(value: f32) -> u32 {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "scaled dimensions are clamped non-negative before rounding"
    )]
    {
        value.round().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_parameters_mean_equal_processors() {
        let spec = ResizeSpec::fit(Size::new(100.0, UNBOUNDED));
        assert_eq!(Processor::resize(spec), Processor::resize(spec));
        assert_ne!(
            Processor::resize(spec),
            Processor::resize(ResizeSpec::fit(Size::new(120.0, UNBOUNDED)))
        );
    }

    #[test]
    fn unbounded_axis_formats_canonically() {
        let processor = Processor::resize(ResizeSpec::fit(Size::new(100.0, UNBOUNDED)));
        assert_eq!(
            processor.identity(),
            "resize?w=100&h=inf&unit=points&mode=aspect_fit&crop=false&upscale=false"
        );
    }

    #[test]
    fn fit_scaling_preserves_aspect_against_the_bounded_axis() {
        let spec = ResizeSpec::fit(Size::new(100.0, UNBOUNDED));
        assert_eq!(spec.scaled_dimensions(400, 300), (100, 75));
        assert_eq!(spec.scaled_dimensions(300, 400), (100, 133));
    }

    #[test]
    fn downscale_only_without_upscale_flag() {
        let spec = ResizeSpec::fit(Size::new(1000.0, UNBOUNDED));
        assert_eq!(spec.scaled_dimensions(400, 300), (400, 300));

        let upscaling = ResizeSpec {
            upscale: true,
            ..spec
        };
        assert_eq!(upscaling.scaled_dimensions(400, 300), (1000, 750));
    }

    #[test]
    fn fill_with_crop_trims_to_the_target_box() {
        let spec = ResizeSpec {
            crop: true,
            ..ResizeSpec::new(Size::new(100.0, 100.0))
        };
        assert_eq!(spec.scaled_dimensions(400, 300), (100, 100));
    }

    #[test]
    fn zero_sized_sources_pass_through() {
        let spec = ResizeSpec::new(Size::new(100.0, 100.0));
        assert_eq!(spec.scaled_dimensions(0, 300), (0, 300));
    }

    #[test]
    fn border_is_part_of_the_identity() {
        let plain = Processor::circle(None);
        let bordered = Processor::circle(Some(Border::new([255, 0, 0, 255], 2.0)));
        assert_ne!(plain, bordered);
        assert_eq!(plain.identity(), "circle?border=none");
        assert_eq!(bordered.identity(), "circle?border=#ff0000ff@2points");
    }

    #[test]
    fn anonymous_processors_compare_by_identity_alone() {
        let double = Processor::anonymous("double-height", |frame| {
            Some(ImageFrame::with_dimensions(
                frame.width,
                frame.height.saturating_mul(2),
            ))
        });
        let other = Processor::anonymous("double-height", |frame| Some(frame));
        assert_eq!(double, other);
    }
}
