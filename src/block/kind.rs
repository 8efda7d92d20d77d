//! Shape kinds and leaf constructors.
//!
//! The kind set is closed: renderers match on it, and `clip_point` picks the
//! ellipse boundary off it. Combinator kinds (Transform, Overlay, Table,
//! Frame) are built in [`crate::layout`]; everything here is a leaf or a
//! plain wrapper.

use std::rc::Weak;

use kurbo::Point;

use super::Block;
use crate::cell::Cell;
use crate::error::Result;
use crate::props::PropId;

/// Line endpoints: literal coordinates carried in the `x1`/`y1`/`x2`/`y2`
/// properties, or two blocks the line connects center-to-center, clipped to
/// their boundaries.
pub enum LineEnds {
    Coords,
    Blocks { from: Block, to: Block },
}

/// What a block draws. Immutable after construction.
pub enum BlockKind {
    Rect,
    Ellipse,
    Poly { points: Vec<Point>, closed: bool },
    Line { ends: LineEnds },
    Text,
    Image,
    /// Single-child wrapper; re-wraps a drawable for reuse and supports
    /// content swapping.
    Wrap,
    Transform,
    Overlay,
    Table { rows: usize, cols: usize },
    Frame,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Rect => "rect",
            BlockKind::Ellipse => "ellipse",
            BlockKind::Poly { .. } => "poly",
            BlockKind::Line { .. } => "line",
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Wrap => "wrap",
            BlockKind::Transform => "transform",
            BlockKind::Overlay => "overlay",
            BlockKind::Table { .. } => "table",
            BlockKind::Frame => "frame",
        }
    }
}

impl Block {
    pub fn rect(width: impl Into<Cell>, height: impl Into<Cell>) -> Block {
        let block = Block::new(BlockKind::Rect);
        block.dims(width, height);
        block
    }

    pub fn square(side: f64) -> Block {
        Block::rect(side, side)
    }

    pub fn ellipse(x_radius: f64, y_radius: f64) -> Block {
        let block = Block::new(BlockKind::Ellipse);
        block
            .put(PropId::XRadius, x_radius)
            .put(PropId::YRadius, y_radius);
        block
    }

    pub fn circle(radius: f64) -> Block {
        Block::ellipse(radius, radius)
    }

    pub fn polygon(points: Vec<(f64, f64)>) -> Block {
        Block::poly(points, true)
    }

    pub fn polyline(points: Vec<(f64, f64)>) -> Block {
        Block::poly(points, false)
    }

    fn poly(points: Vec<(f64, f64)>, closed: bool) -> Block {
        let points = points.into_iter().map(|(x, y)| Point::new(x, y)).collect();
        Block::new(BlockKind::Poly { points, closed })
    }

    /// Upward-pointing equilateral triangle with the given side length.
    pub fn eq_triangle(side: f64) -> Block {
        let height = side * 3.0_f64.sqrt() / 2.0;
        Block::polygon(vec![
            (0.0, 0.0),
            (-side / 2.0, height),
            (side / 2.0, height),
        ])
    }

    pub fn text(content: &str) -> Block {
        let block = Block::new(BlockKind::Text);
        block.put(PropId::Content, content);
        block
    }

    pub fn image(href: &str, width: f64, height: f64) -> Block {
        let block = Block::new(BlockKind::Image);
        block.put(PropId::Href, href);
        block.dims(width, height);
        block
    }

    /// Line connecting two blocks, clipped to each one's boundary. The
    /// endpoints are init dependencies: they must be resolved before the
    /// line is.
    pub fn line(from: &Block, to: &Block) -> Block {
        let block = Block::new(BlockKind::Line {
            ends: LineEnds::Blocks {
                from: from.clone(),
                to: to.clone(),
            },
        });
        block.add_init_dependency(from).add_init_dependency(to);
        block
    }

    /// Line between literal coordinates.
    pub fn line_at(x1: f64, y1: f64, x2: f64, y2: f64) -> Block {
        let block = Block::new(BlockKind::Line {
            ends: LineEnds::Coords,
        });
        block
            .put(PropId::X1, x1)
            .put(PropId::Y1, y1)
            .put(PropId::X2, x2)
            .put(PropId::Y2, y2);
        block
    }

    pub fn xline(length: f64) -> Block {
        Block::line_at(0.0, 0.0, length, 0.0)
    }

    pub fn yline(length: f64) -> Block {
        Block::line_at(0.0, 0.0, 0.0, length)
    }

    /// Invisible horizontal spacer.
    pub fn xspace(width: f64) -> Block {
        let block = Block::rect(width, 0.0);
        block.stroke_width(0.0).opacity(0.0);
        block
    }

    /// Invisible vertical spacer.
    pub fn yspace(height: f64) -> Block {
        let block = Block::rect(0.0, height);
        block.stroke_width(0.0).opacity(0.0);
        block
    }

    /// Wrap a drawable. A block instance may appear only once in a tree;
    /// wrapping gives a second tree position its own node (and its own
    /// shift/scale/levels) around the same content.
    pub fn wrap(content: &Block) -> Result<Block> {
        let block = Block::new(BlockKind::Wrap);
        block.add_child(content)?;
        Ok(block)
    }

    /// Swap a wrapper's content after construction. The old content is
    /// released (re-wrappable elsewhere) and the subtree's resolution state
    /// is discarded up to the root.
    pub fn reset_content(&self, content: &Block) -> Result<&Self> {
        let old = std::mem::take(&mut self.node.inner.borrow_mut().children);
        for child in old {
            child.node.inner.borrow_mut().parent = Weak::new();
        }
        self.add_child(content)?;
        self.invalidate_render();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    #[test]
    fn wrap_allows_reuse_of_a_parented_block() {
        let content = Block::rect(10.0, 10.0);
        let first = Block::wrap(&content).unwrap();
        // The raw block is spoken for, but a new wrapper of the wrapper works.
        assert!(Block::wrap(&content).is_err());
        assert!(Block::wrap(&first).is_ok());
    }

    #[test]
    fn reset_content_releases_old_child() {
        let old = Block::rect(1.0, 1.0);
        let new = Block::rect(2.0, 2.0);
        let wrapper = Block::wrap(&old).unwrap();
        wrapper.set_measured_extent(Rect::new(0.0, 0.0, 1.0, 1.0));
        wrapper.mark_resolved(true);

        wrapper.reset_content(&new).unwrap();
        assert!(!wrapper.is_resolved());
        assert!(old.parent().is_none());
        assert!(wrapper.children()[0].same(&new));
        // Old content is free to live elsewhere now.
        assert!(Block::wrap(&old).is_ok());
    }

    #[test]
    fn line_records_endpoint_init_dependencies() {
        let a = Block::circle(5.0);
        let b = Block::circle(5.0);
        let line = Block::line(&a, &b);
        let deps = line.init_deps();
        assert_eq!(deps.len(), 2);
        assert!(deps[0].same(&a));
        assert!(deps[1].same(&b));
    }
}
