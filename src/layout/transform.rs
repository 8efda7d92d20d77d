//! Pivot-relative repositioning and fitting of a single block.

use crate::block::{Block, BlockKind};
use crate::cell::{num, Cell, Value};
use crate::error::Result;
use crate::props::PropId;

/// `-scale * (left*(1-pivot) + right*(1+pivot)) / 2`: the translation that
/// puts the content's pivot point at the transform's origin. Absent until a
/// pivot is set and the content is measured.
fn anchor_formula(values: &[Option<Value>]) -> Option<Value> {
    let low = num(&values[0])?;
    let high = num(&values[1])?;
    let pivot = num(&values[2])?;
    let scale = num(&values[3]).unwrap_or(1.0);
    Some(Value::Num(
        -scale * (low * (1.0 - pivot) + high * (1.0 + pivot)) / 2.0,
    ))
}

/// Uniform scale fitting the content into the requested dimensions. With one
/// dimension given the other follows it (aspect preserved); with both, the
/// smaller ratio wins so the content fits inside.
fn fit_formula(values: &[Option<Value>]) -> Option<Value> {
    let ratio = |dim: &Option<Value>, real: &Option<Value>| Some(num(dim)? / num(real)?);
    let xs = ratio(&values[0], &values[1]);
    let ys = ratio(&values[2], &values[3]);
    match (xs, ys) {
        (Some(a), Some(b)) => Some(Value::Num(a.min(b))),
        (Some(a), None) => Some(Value::Num(a)),
        (None, Some(b)) => Some(Value::Num(b)),
        (None, None) => None,
    }
}

impl Block {
    /// Reposition `content` so that its pivot point (per axis in `[-1, 1]`,
    /// -1 = low edge, 0 = middle, +1 = high edge) lands at this block's
    /// origin. Setting `width`/`height` additionally rescales the content to
    /// fit those dimensions.
    pub fn transform(content: &Block) -> Result<Block> {
        let block = Block::new(BlockKind::Transform);
        block.add_child(content)?;

        let scale = Cell::derived(
            "fit_scale",
            fit_formula,
            vec![
                block.property(PropId::Width),
                content.property(PropId::RealWidth),
                block.property(PropId::Height),
                content.property(PropId::RealHeight),
            ],
        );
        block.put_cell(PropId::XScale, &scale);
        block.put_cell(PropId::YScale, &scale);

        let (anchor_x, anchor_y) = block.anchor_cells();
        anchor_x.set_formula(
            anchor_formula,
            vec![
                content.property(PropId::Left),
                content.property(PropId::Right),
                block.property(PropId::XPivot),
                block.property(PropId::XScale),
            ],
        );
        anchor_y.set_formula(
            anchor_formula,
            vec![
                content.property(PropId::Top),
                content.property(PropId::Bottom),
                block.property(PropId::YPivot),
                block.property(PropId::YScale),
            ],
        );
        block.set_measured_from_children()?;
        Ok(block)
    }

    /// Transform centering the content on the origin.
    pub fn center(content: &Block) -> Result<Block> {
        let block = Block::transform(content)?;
        block.pivot(0.0, 0.0);
        Ok(block)
    }

    /// Transform putting the content's top-left corner at the origin.
    pub fn home(content: &Block) -> Result<Block> {
        let block = Block::transform(content)?;
        block.pivot(-1.0, -1.0);
        Ok(block)
    }
}
