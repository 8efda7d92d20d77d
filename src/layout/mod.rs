//! Layout combinators.
//!
//! Each combinator is a [`crate::block::Block`] of its own kind whose sizing
//! and positioning cells are formulas over the blocks it manages - never
//! absolute literals - so a renderer filling in real measurements recomputes
//! the layout through plain invalidation.

mod frame;
mod overlay;
mod table;
mod transform;

pub(crate) use table::layout_table;
