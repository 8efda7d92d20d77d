//! Padded background wrapping.

use crate::block::{Block, BlockKind};
use crate::cell::{num, Cell, Value};
use crate::error::Result;
use crate::props::PropId;

/// `content_extent + 2 * (padding + stroke/2)`: the background is padded
/// around the content and grown by half its own stroke so a thick border
/// does not clip it.
fn background_dim_formula(values: &[Option<Value>]) -> Option<Value> {
    let content = num(&values[0])?;
    let padding = num(&values[1]).unwrap_or(0.0);
    let stroke = num(&values[2]).unwrap_or(0.0);
    Some(Value::Num(content + 2.0 * (padding + stroke / 2.0)))
}

impl Block {
    /// Wrap `content` in a background rectangle sized to the content plus
    /// `padding` (see [`Block::padding`]), both centered together.
    pub fn frame(content: &Block) -> Result<Block> {
        let block = Block::new(BlockKind::Frame);
        block.pivot(0.0, 0.0);

        let background = Block::new(BlockKind::Rect);
        background.stroke_width(1.0);
        let width = Cell::derived(
            "frame_width",
            background_dim_formula,
            vec![
                content.property(PropId::RealWidth),
                block.property(PropId::XPadding),
                background.property(PropId::StrokeWidth),
            ],
        );
        let height = Cell::derived(
            "frame_height",
            background_dim_formula,
            vec![
                content.property(PropId::RealHeight),
                block.property(PropId::YPadding),
                background.property(PropId::StrokeWidth),
            ],
        );
        background.dims(width, height);

        // Background first so it renders underneath, both sharing the
        // frame's pivot. The background's dimensions are formulas over the
        // content's measured extent, so the content must resolve ahead of it.
        let bg_wrapper = Block::transform(&background)?;
        bg_wrapper.add_init_dependency(content);
        let content_wrapper = Block::transform(content)?;
        for wrapper in [&bg_wrapper, &content_wrapper] {
            wrapper.put_cell(PropId::XPivot, &block.property(PropId::XPivot));
            wrapper.put_cell(PropId::YPivot, &block.property(PropId::YPivot));
            block.add_child(wrapper)?;
        }
        block.set_measured_from_children()?;
        Ok(block)
    }

    /// Space between a frame's content and its background edge.
    pub fn padding(&self, x: f64, y: f64) -> &Self {
        self.put(PropId::XPadding, x).put(PropId::YPadding, y)
    }

    /// The background rectangle of a frame, for styling.
    pub fn frame_background(&self) -> Option<Block> {
        if !matches!(self.kind(), BlockKind::Frame) {
            return None;
        }
        self.children()
            .first()
            .and_then(|wrapper| wrapper.children().into_iter().next())
    }
}
