//! The renderer contract and the resolve walk.
//!
//! A renderer's single obligation is measurement: for each block it reports
//! either a concrete extent, that the extent follows from the children, that
//! it populated the geometry itself, or that measurement is pending (an
//! out-of-band step like text shaping). The walk is depth-first post-order -
//! init dependencies, then children, then the block - so composite formulas
//! always find their inputs measured.
//!
//! Pending blocks are collected and reported; the caller re-resolves once
//! the external measurement lands. Already-resolved blocks are skipped, so
//! re-resolution only touches what is still open.

use std::collections::HashSet;

use kurbo::{Point, Rect};
use unicode_width::UnicodeWidthStr;

use crate::block::{Block, BlockKind, LineEnds};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::layout::layout_table;
use crate::props::PropId;

// =============================================================================
// Contract
// =============================================================================

/// Measurement outcome for one block.
pub enum Measure {
    /// Concrete extent in the block's own coordinates (leaf shapes).
    Extent(Rect),
    /// Aggregate the non-orphan children's bounding boxes.
    FromChildren,
    /// The geometry cells were already populated (tables, and renderers
    /// that write measurements directly).
    Populated,
    /// Measurement needs an out-of-band step; resolve again once it lands.
    Pending,
}

/// Produces concrete drawables and measurements for blocks. The core only
/// consumes the measurement half; element production is the implementor's
/// business.
pub trait Renderer {
    fn render_elem(&mut self, block: &Block, config: &Config) -> Result<Measure>;
}

// =============================================================================
// Resolve walk
// =============================================================================

struct Walk<'a> {
    renderer: &'a mut dyn Renderer,
    config: &'a Config,
    visited: HashSet<u64>,
    pending: Vec<Block>,
}

/// Resolve a tree: measure every block depth-first post-order, honoring
/// init dependencies. Returns the blocks whose measurement is pending.
pub fn resolve(
    root: &Block,
    renderer: &mut dyn Renderer,
    config: &Config,
) -> Result<Vec<Block>> {
    let mut walk = Walk {
        renderer,
        config,
        visited: HashSet::new(),
        pending: Vec::new(),
    };
    walk.visit(root)?;
    if !walk.pending.is_empty() {
        tracing::debug!(pending = walk.pending.len(), "resolve left blocks pending");
    }
    Ok(walk.pending)
}

impl Walk<'_> {
    fn visit(&mut self, block: &Block) -> Result<()> {
        if block.is_resolved() || !self.visited.insert(block.id()) {
            return Ok(());
        }
        for dep in block.init_deps() {
            self.visit(&dep)?;
        }
        for child in block.children() {
            self.visit(&child)?;
        }

        // A pending descendant or dependency blocks this block too; it joins
        // the pending set and waits for the next resolve pass.
        let blocked = block
            .init_deps()
            .into_iter()
            .chain(block.children())
            .any(|b| !b.is_resolved());
        if blocked {
            self.pending.push(block.clone());
            return Ok(());
        }

        if matches!(block.kind(), BlockKind::Table { .. }) && !layout_table(block)? {
            self.pending.push(block.clone());
            return Ok(());
        }

        match self.renderer.render_elem(block, self.config)? {
            Measure::Extent(rect) => block.set_measured_extent(rect),
            Measure::FromChildren => block.set_measured_from_children()?,
            Measure::Populated => {}
            Measure::Pending => {
                self.pending.push(block.clone());
                return Ok(());
            }
        }
        block.mark_resolved(true);
        tracing::trace!(block = %block.label(), "resolved");
        Ok(())
    }
}

// =============================================================================
// Built-in geometry renderer
// =============================================================================

/// Geometry-only renderer: measures every shape synchronously from its
/// properties, producing no output surface. Used for headless resolution
/// and tests; text extents come from a display-width heuristic rather than
/// real shaping.
#[derive(Default)]
pub struct PlainRenderer;

impl PlainRenderer {
    pub fn new() -> Self {
        PlainRenderer
    }

    fn stroke(block: &Block, config: &Config) -> Result<f64> {
        block
            .property(PropId::StrokeWidth)
            .num_or(config.default_stroke_width)
    }

    fn measure_text(block: &Block, config: &Config) -> Result<Measure> {
        let content = block.property(PropId::Content).get_str()?;
        let content = content.as_deref().unwrap_or("");
        let font_size = block
            .property(PropId::FontSize)
            .num_or(config.default_font_size)?;

        let mut lines = 0usize;
        let mut columns = 0usize;
        for line in content.split('\n') {
            lines += 1;
            columns = columns.max(line.width());
        }
        let width = columns as f64 * font_size * config.text.column_width;
        let height = lines as f64 * font_size * config.text.line_height;
        Ok(Measure::Extent(Rect::new(0.0, 0.0, width, height)))
    }

    fn endpoint_center(block: &Block) -> Result<Point> {
        let x = block
            .property(PropId::XMiddle)
            .get_num()?
            .ok_or_else(|| Error::NotResolved(block.label()))?;
        let y = block
            .property(PropId::YMiddle)
            .get_num()?
            .ok_or_else(|| Error::NotResolved(block.label()))?;
        Ok(Point::new(x, y))
    }

    fn measure_line(block: &Block, ends: &LineEnds, config: &Config) -> Result<Measure> {
        let (mut p1, mut p2) = match ends {
            LineEnds::Coords => (
                Point::new(
                    block.property(PropId::X1).require_num()?,
                    block.property(PropId::Y1).require_num()?,
                ),
                Point::new(
                    block.property(PropId::X2).require_num()?,
                    block.property(PropId::Y2).require_num()?,
                ),
            ),
            LineEnds::Blocks { from, to } => {
                let c1 = Self::endpoint_center(from)?;
                let c2 = Self::endpoint_center(to)?;
                let angle = (c2.y - c1.y).atan2(c2.x - c1.x).to_degrees();
                (from.clip_point(angle)?, to.clip_point(angle + 180.0)?)
            }
        };

        // Pull the endpoints toward each other by the shrink amounts.
        let length = p1.distance(p2);
        if length > 0.0 {
            let unit = ((p2.x - p1.x) / length, (p2.y - p1.y) / length);
            let shrink1 = block.property(PropId::Shrink1).num_or(0.0)?;
            let shrink2 = block.property(PropId::Shrink2).num_or(0.0)?;
            p1 = Point::new(p1.x + unit.0 * shrink1, p1.y + unit.1 * shrink1);
            p2 = Point::new(p2.x - unit.0 * shrink2, p2.y - unit.1 * shrink2);
        }

        block
            .put(PropId::RealX1, p1.x)
            .put(PropId::RealY1, p1.y)
            .put(PropId::RealX2, p2.x)
            .put(PropId::RealY2, p2.y);

        let half = Self::stroke(block, config)? / 2.0;
        Ok(Measure::Extent(Rect::new(
            p1.x.min(p2.x) - half,
            p1.y.min(p2.y) - half,
            p1.x.max(p2.x) + half,
            p1.y.max(p2.y) + half,
        )))
    }
}

impl Renderer for PlainRenderer {
    fn render_elem(&mut self, block: &Block, config: &Config) -> Result<Measure> {
        match block.kind() {
            BlockKind::Rect => {
                let w = block.property(PropId::Width).require_nonnegative()?;
                let h = block.property(PropId::Height).require_nonnegative()?;
                let half = Self::stroke(block, config)? / 2.0;
                Ok(Measure::Extent(Rect::new(
                    -half,
                    -half,
                    w + half,
                    h + half,
                )))
            }
            BlockKind::Ellipse => {
                let rx = block.property(PropId::XRadius).require_nonnegative()?;
                let ry = block.property(PropId::YRadius).require_nonnegative()?;
                let half = Self::stroke(block, config)? / 2.0;
                Ok(Measure::Extent(Rect::new(
                    -rx - half,
                    -ry - half,
                    rx + half,
                    ry + half,
                )))
            }
            BlockKind::Poly { points, .. } => {
                let half = Self::stroke(block, config)? / 2.0;
                let mut bounds: Option<Rect> = None;
                for p in points {
                    let r = Rect::new(p.x, p.y, p.x, p.y);
                    bounds = Some(bounds.map_or(r, |b| b.union(r)));
                }
                let bounds = bounds.unwrap_or(Rect::ZERO);
                Ok(Measure::Extent(bounds.inflate(half, half)))
            }
            BlockKind::Line { ends } => Self::measure_line(block, ends, config),
            BlockKind::Text => Self::measure_text(block, config),
            BlockKind::Image => {
                let w = block.property(PropId::Width).require_nonnegative()?;
                let h = block.property(PropId::Height).require_nonnegative()?;
                Ok(Measure::Extent(Rect::new(0.0, 0.0, w, h)))
            }
            BlockKind::Table { .. } => Ok(Measure::Populated),
            BlockKind::Wrap
            | BlockKind::Transform
            | BlockKind::Overlay
            | BlockKind::Frame => Ok(Measure::FromChildren),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_plain(root: &Block) -> Result<Vec<Block>> {
        resolve(root, &mut PlainRenderer::new(), &Config::default())
    }

    #[test]
    fn rect_extent_includes_stroke() {
        let rect = Block::rect(50.0, 20.0);
        resolve_plain(&rect).unwrap();
        // Default stroke 1: half a stroke on each side.
        assert_eq!(
            rect.property(PropId::Left).get_num().unwrap(),
            Some(-0.5)
        );
        assert_eq!(
            rect.property(PropId::RealWidth).get_num().unwrap(),
            Some(51.0)
        );
    }

    #[test]
    fn negative_rect_width_fails() {
        let rect = Block::rect(-1.0, 5.0);
        assert!(matches!(
            resolve_plain(&rect),
            Err(Error::NegativeValue { .. })
        ));
    }

    #[test]
    fn missing_rect_width_fails() {
        let rect = Block::new(BlockKind::Rect);
        assert!(matches!(
            resolve_plain(&rect),
            Err(Error::MissingValue(_))
        ));
    }

    #[test]
    fn text_measures_by_display_width() {
        let text = Block::text("ab\nlonger line");
        let config = Config::default();
        resolve(&text, &mut PlainRenderer::new(), &config).unwrap();
        let expected_w = 11.0 * config.default_font_size * config.text.column_width;
        let expected_h = 2.0 * config.default_font_size * config.text.line_height;
        assert_eq!(
            text.property(PropId::RealWidth).get_num().unwrap(),
            Some(expected_w)
        );
        assert_eq!(
            text.property(PropId::RealHeight).get_num().unwrap(),
            Some(expected_h)
        );
    }

    #[test]
    fn line_between_blocks_clips_to_boundaries() {
        let a = Block::circle(5.0);
        let b = Block::circle(5.0);
        b.shift(20.0, 0.0);
        let line = Block::line(&a, &b);
        line.stroke_width(0.0);
        let root = Block::overlay(vec![]).unwrap();
        root.add_child(&a).unwrap();
        root.add_child(&b).unwrap();
        root.add_child(&line).unwrap();
        resolve_plain(&root).unwrap();

        // Centers at x=0 and x=20, radius 5 (stroke ignored on the line):
        // the segment runs along y=0 from each circle's boundary.
        let x1 = line.property(PropId::RealX1).get_num().unwrap().unwrap();
        let x2 = line.property(PropId::RealX2).get_num().unwrap().unwrap();
        assert!((x1 - 5.5).abs() < 1e-9, "x1 = {x1}");
        assert!((x2 - 14.5).abs() < 1e-9, "x2 = {x2}");
    }

    #[test]
    fn line_shrink_pulls_endpoints_in() {
        let line = Block::line_at(0.0, 0.0, 10.0, 0.0);
        line.stroke_width(0.0);
        line.put(PropId::Shrink1, 2.0).put(PropId::Shrink2, 3.0);
        resolve_plain(&line).unwrap();
        assert_eq!(
            line.property(PropId::RealX1).get_num().unwrap(),
            Some(2.0)
        );
        assert_eq!(
            line.property(PropId::RealX2).get_num().unwrap(),
            Some(7.0)
        );
    }

    #[test]
    fn pending_blocks_are_reported_and_finished_on_re_resolve() {
        /// Defers every text block once, then delegates.
        struct DeferredText {
            inner: PlainRenderer,
            deferred: bool,
        }
        impl Renderer for DeferredText {
            fn render_elem(&mut self, block: &Block, config: &Config) -> Result<Measure> {
                if matches!(block.kind(), BlockKind::Text) && !self.deferred {
                    self.deferred = true;
                    return Ok(Measure::Pending);
                }
                self.inner.render_elem(block, config)
            }
        }

        let text = Block::text("hello");
        let root = Block::overlay(vec![]).unwrap();
        root.add_child(&text).unwrap();

        let mut renderer = DeferredText {
            inner: PlainRenderer::new(),
            deferred: false,
        };
        let config = Config::default();

        let pending = resolve(&root, &mut renderer, &config).unwrap();
        assert_eq!(pending.len(), 2, "text and its unresolved ancestor");
        assert!(pending[0].same(&text));
        assert!(!text.is_resolved());

        let pending = resolve(&root, &mut renderer, &config).unwrap();
        assert!(pending.is_empty());
        assert!(text.is_resolved());
        assert!(root.is_resolved());
    }

    #[test]
    fn resolved_blocks_are_not_re_rendered() {
        struct Counting {
            inner: PlainRenderer,
            calls: usize,
        }
        impl Renderer for Counting {
            fn render_elem(&mut self, block: &Block, config: &Config) -> Result<Measure> {
                self.calls += 1;
                self.inner.render_elem(block, config)
            }
        }

        let rect = Block::rect(5.0, 5.0);
        let root = Block::overlay(vec![]).unwrap();
        root.add_child(&rect).unwrap();

        let mut renderer = Counting {
            inner: PlainRenderer::new(),
            calls: 0,
        };
        let config = Config::default();
        resolve(&root, &mut renderer, &config).unwrap();
        assert_eq!(renderer.calls, 2);
        resolve(&root, &mut renderer, &config).unwrap();
        assert_eq!(renderer.calls, 2, "fully resolved tree is a no-op");

        rect.invalidate_render();
        resolve(&root, &mut renderer, &config).unwrap();
        assert_eq!(renderer.calls, 4);
    }
}
