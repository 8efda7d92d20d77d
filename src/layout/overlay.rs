//! Co-located composition: stack blocks over one another.

use crate::block::{Block, BlockKind};
use crate::error::Result;
use crate::props::PropId;

impl Block {
    /// Stack `items` so all of their pivot points coincide at one location.
    /// Each item gets its own transform wrapper, and every wrapper aliases
    /// the overlay's pivot cells - one `pivot` call repositions them all.
    /// With no pivot set, items keep their own coordinates.
    pub fn overlay(items: Vec<Block>) -> Result<Block> {
        let block = Block::new(BlockKind::Overlay);
        let pivot_x = block.property(PropId::XPivot);
        let pivot_y = block.property(PropId::YPivot);
        for item in items {
            let wrapper = Block::transform(&item)?;
            wrapper.put_cell(PropId::XPivot, &pivot_x);
            wrapper.put_cell(PropId::YPivot, &pivot_y);
            block.add_child(&wrapper)?;
        }
        block.set_measured_from_children()?;
        Ok(block)
    }

    /// Overlay with every item centered on the origin.
    pub fn overlay_center(items: Vec<Block>) -> Result<Block> {
        let block = Block::overlay(items)?;
        block.pivot(0.0, 0.0);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    fn measured(w: f64, h: f64) -> Block {
        let block = Block::rect(w, h);
        block.set_measured_extent(Rect::new(0.0, 0.0, w, h));
        block
    }

    #[test]
    fn centered_items_share_a_midpoint() {
        let small = measured(10.0, 10.0);
        let large = measured(40.0, 20.0);
        let overlay = Block::overlay_center(vec![small, large]).unwrap();

        for wrapper in overlay.children() {
            assert_eq!(
                wrapper.property(PropId::XMiddle).get_num().unwrap(),
                Some(0.0)
            );
            assert_eq!(
                wrapper.property(PropId::YMiddle).get_num().unwrap(),
                Some(0.0)
            );
        }
        // The overlay is as big as its largest item.
        assert_eq!(
            overlay.property(PropId::RealWidth).get_num().unwrap(),
            Some(40.0)
        );
    }

    #[test]
    fn one_pivot_write_moves_every_item() {
        let a = measured(10.0, 10.0);
        let b = measured(20.0, 20.0);
        let overlay = Block::overlay(vec![a, b]).unwrap();

        overlay.pivot(-1.0, -1.0);
        for wrapper in overlay.children() {
            assert_eq!(wrapper.property(PropId::Left).get_num().unwrap(), Some(0.0));
            assert_eq!(wrapper.property(PropId::Top).get_num().unwrap(), Some(0.0));
        }

        overlay.pivot(1.0, 1.0);
        for wrapper in overlay.children() {
            assert_eq!(
                wrapper.property(PropId::Right).get_num().unwrap(),
                Some(0.0)
            );
        }
    }
}
