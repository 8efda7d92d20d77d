//! Resolution configuration.
//!
//! An immutable bag of defaults threaded into every resolve pass. Override
//! precedence, highest first: instance property, block-kind default,
//! `Config`. Nothing here is process-global; two scenes can resolve with
//! different configs side by side.

/// Defaults consulted during resolution when a block leaves a property unset.
#[derive(Clone, Debug)]
pub struct Config {
    /// Stroke width applied when a block does not set one. Participates in
    /// measurement: a bounding box includes the full stroke.
    pub default_stroke_width: f64,

    /// Stroke color applied to leaf shapes that do not set one.
    pub default_stroke_color: String,

    /// Fill color applied to leaf shapes that do not set one.
    pub default_fill_color: String,

    /// Font size applied to text blocks that do not set one.
    pub default_font_size: f64,

    /// When false, animate-property blocks are still indexed per level but
    /// stepping never triggers them.
    pub enable_animations: bool,

    /// Text metrics heuristic used by [`PlainRenderer`](crate::render::PlainRenderer).
    pub text: TextMetrics,
}

/// Heuristic metrics for estimating text extents without a shaping engine.
///
/// Real typesetting is the renderer's job; these only give headless
/// resolution a plausible extent per display column.
#[derive(Clone, Copy, Debug)]
pub struct TextMetrics {
    /// Advance width of one display column, as a fraction of the font size.
    pub column_width: f64,
    /// Line height as a fraction of the font size.
    pub line_height: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_stroke_width: 1.0,
            default_stroke_color: "black".to_owned(),
            default_fill_color: "none".to_owned(),
            default_font_size: 28.0,
            enable_animations: true,
            text: TextMetrics {
                column_width: 0.6,
                line_height: 1.2,
            },
        }
    }
}
