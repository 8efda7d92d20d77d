//! Grid layout with per-row/column sizing and justification.
//!
//! Construction validates the grid shape and wraps every item in a transform
//! wrapper; the actual sizing runs at resolve time, once the items have been
//! measured, by assigning each wrapper's pivot and shift. Wrapper anchors
//! are formulas over the item geometry, so a later re-measure reflows the
//! cells already placed.

use std::rc::Rc;

use kurbo::Rect;

use crate::block::{Block, BlockKind};
use crate::error::{Error, Result};
use crate::props::PropId;

impl Block {
    /// Grid of blocks, row-major. Every row must have the same number of
    /// columns.
    pub fn table(rows: Vec<Vec<Block>>) -> Result<Block> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(Error::IrregularTable {
                    row: r,
                    got: row.len(),
                    expected: n_cols,
                });
            }
        }
        let block = Block::new(BlockKind::Table {
            rows: n_rows,
            cols: n_cols,
        });
        for row in &rows {
            for item in row {
                block.add_child(&Block::transform(item)?)?;
            }
        }
        Ok(block)
    }

    /// Space between columns / rows.
    pub fn margin(&self, x: f64, y: f64) -> &Self {
        self.put(PropId::XMargin, x).put(PropId::YMargin, y)
    }

    /// Justification strings, one `l`/`c`/`r` per column (x) and per row
    /// (y). Shorter strings repeat their last character.
    pub fn justify(&self, x: &str, y: &str) -> &Self {
        self.put(PropId::XJustify, x).put(PropId::YJustify, y)
    }

    /// Minimum cell dimensions.
    pub fn cell_dims(&self, width: f64, height: f64) -> &Self {
        self.put(PropId::CellWidth, width)
            .put(PropId::CellHeight, height)
    }
}

fn justify_pivots(spec: Option<Rc<str>>, count: usize) -> Result<Vec<f64>> {
    let spec = spec.unwrap_or_else(|| Rc::from("l"));
    let mut pivots = Vec::with_capacity(count);
    let mut last = -1.0;
    for ch in spec.chars().take(count) {
        last = match ch {
            'l' => -1.0,
            'c' => 0.0,
            'r' => 1.0,
            other => return Err(Error::InvalidJustify(other)),
        };
        pivots.push(last);
    }
    pivots.resize(count, last);
    Ok(pivots)
}

/// Size and place a table's cells. Returns `false` (layout deferred) when
/// some item's measurement is still pending.
pub(crate) fn layout_table(block: &Block) -> Result<bool> {
    let (n_rows, n_cols) = match block.kind() {
        BlockKind::Table { rows, cols } => (*rows, *cols),
        _ => return Ok(true),
    };
    if n_rows == 0 || n_cols == 0 {
        block.set_measured_extent(Rect::ZERO);
        return Ok(true);
    }

    let wrappers = block.children();
    let mut items = Vec::with_capacity(wrappers.len());
    for wrapper in &wrappers {
        let Some(item) = wrapper.children().into_iter().next() else {
            return Ok(false);
        };
        items.push(item);
    }

    // Column widths / row heights: the largest member, floored by the
    // explicit cell dimensions.
    let mut widths = vec![block.property(PropId::CellWidth).num_or(0.0)?; n_cols];
    let mut heights = vec![block.property(PropId::CellHeight).num_or(0.0)?; n_rows];
    for r in 0..n_rows {
        for c in 0..n_cols {
            let item = &items[r * n_cols + c];
            let Some(w) = item.property(PropId::RealWidth).get_num()? else {
                return Ok(false);
            };
            let Some(h) = item.property(PropId::RealHeight).get_num()? else {
                return Ok(false);
            };
            widths[c] = widths[c].max(w);
            heights[r] = heights[r].max(h);
        }
    }

    let x_margin = block.property(PropId::XMargin).num_or(0.0)?;
    let y_margin = block.property(PropId::YMargin).num_or(0.0)?;

    // A requested total spreads its excess (or deficit) evenly.
    let natural_width: f64 = widths.iter().sum::<f64>() + x_margin * (n_cols - 1) as f64;
    let extra = (block.property(PropId::Width).get_num()?.unwrap_or(natural_width)
        - natural_width)
        / n_cols as f64;
    for w in &mut widths {
        *w += extra;
    }
    let natural_height: f64 = heights.iter().sum::<f64>() + y_margin * (n_rows - 1) as f64;
    let extra = (block
        .property(PropId::Height)
        .get_num()?
        .unwrap_or(natural_height)
        - natural_height)
        / n_rows as f64;
    for h in &mut heights {
        *h += extra;
    }

    // Cumulative start offsets.
    let mut x_start = vec![0.0; n_cols + 1];
    for c in 1..=n_cols {
        x_start[c] = x_start[c - 1] + widths[c - 1] + if c < n_cols { x_margin } else { 0.0 };
    }
    let mut y_start = vec![0.0; n_rows + 1];
    for r in 1..=n_rows {
        y_start[r] = y_start[r - 1] + heights[r - 1] + if r < n_rows { y_margin } else { 0.0 };
    }

    let x_justify = justify_pivots(block.property(PropId::XJustify).get_str()?, n_cols)?;
    let y_justify = justify_pivots(block.property(PropId::YJustify).get_str()?, n_rows)?;

    // Place each cell in its allotted box; only non-orphans contribute to
    // the table's own extent, and a box ends before its trailing margin.
    let mut extent: Option<Rect> = None;
    for r in 0..n_rows {
        for c in 0..n_cols {
            let wrapper = &wrappers[r * n_cols + c];
            let item = &items[r * n_cols + c];

            let px = item
                .property(PropId::XParentPivot)
                .get_num()?
                .unwrap_or(x_justify[c]);
            let py = item
                .property(PropId::YParentPivot)
                .get_num()?
                .unwrap_or(y_justify[r]);
            wrapper.pivot(px, py);
            wrapper.shift(
                x_start[c] + 0.5 * (px + 1.0) * widths[c],
                y_start[r] + 0.5 * (py + 1.0) * heights[r],
            );

            if !item.is_orphan()? {
                let cell_box = Rect::new(
                    x_start[c],
                    y_start[r],
                    x_start[c] + widths[c],
                    y_start[r] + heights[r],
                );
                extent = Some(extent.map_or(cell_box, |e| e.union(cell_box)));
            }
        }
    }

    // A table of nothing but orphans has no extent of its own.
    if let Some(rect) = extent {
        block.set_measured_extent(rect);
    }
    tracing::trace!(block = %block.label(), cols = n_cols, rows = n_rows, "table laid out");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(w: f64, h: f64) -> Block {
        let block = Block::rect(w, h);
        block.set_measured_extent(Rect::new(0.0, 0.0, w, h));
        block
    }

    fn grid(dims: &[&[(f64, f64)]]) -> (Block, Vec<Vec<Block>>) {
        let rows: Vec<Vec<Block>> = dims
            .iter()
            .map(|row| row.iter().map(|&(w, h)| leaf(w, h)).collect())
            .collect();
        let table = Block::table(rows.clone()).unwrap();
        (table, rows)
    }

    #[test]
    fn irregular_rows_are_rejected() {
        let rows = vec![vec![leaf(1.0, 1.0)], vec![leaf(1.0, 1.0), leaf(1.0, 1.0)]];
        match Block::table(rows) {
            Err(Error::IrregularTable { row, got, expected }) => {
                assert_eq!((row, got, expected), (1, 2, 1));
            }
            other => panic!("expected IrregularTable, got {other:?}"),
        }
    }

    #[test]
    fn columns_take_their_widest_member() {
        let (table, _) = grid(&[&[(10.0, 5.0), (30.0, 5.0)], &[(20.0, 8.0), (15.0, 8.0)]]);
        table.margin(4.0, 2.0);
        assert!(layout_table(&table).unwrap());

        // Columns: max(10,20)=20 and max(30,15)=30, margin 4.
        assert_eq!(
            table.property(PropId::RealWidth).get_num().unwrap(),
            Some(54.0)
        );
        // Rows: 5 and 8, margin 2.
        assert_eq!(
            table.property(PropId::RealHeight).get_num().unwrap(),
            Some(15.0)
        );
    }

    #[test]
    fn requested_width_distributes_excess_evenly() {
        let (table, _) = grid(&[&[(10.0, 5.0), (20.0, 5.0)]]);
        table.width(50.0);
        assert!(layout_table(&table).unwrap());
        assert_eq!(
            table.property(PropId::RealWidth).get_num().unwrap(),
            Some(50.0)
        );
        // Each column grew by 10; the second starts at 10 + 10 = 20.
        let second = &table.children()[1];
        assert_eq!(second.property(PropId::Left).get_num().unwrap(), Some(20.0));
    }

    #[test]
    fn justification_places_cells_within_their_box() {
        let (table, rows) = grid(&[&[(10.0, 5.0)], &[(30.0, 5.0)]]);
        table.justify("r", "l");
        assert!(layout_table(&table).unwrap());

        // Column width 30; the narrow cell is pushed to the right edge.
        let narrow = &table.children()[0];
        assert_eq!(narrow.property(PropId::Right).get_num().unwrap(), Some(30.0));
        assert_eq!(narrow.property(PropId::Left).get_num().unwrap(), Some(20.0));

        // Per-cell parent pivot overrides the column justification.
        rows[0][0].parent_pivot(-1.0, -1.0);
        assert!(layout_table(&table).unwrap());
        let narrow = &table.children()[0];
        assert_eq!(narrow.property(PropId::Left).get_num().unwrap(), Some(0.0));
    }

    #[test]
    fn shorter_justify_string_repeats_last_character() {
        let pivots = justify_pivots(Some(Rc::from("lc")), 4).unwrap();
        assert_eq!(pivots, vec![-1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_justify_character_fails() {
        let (table, _) = grid(&[&[(10.0, 5.0)]]);
        table.justify("x", "l");
        assert!(matches!(
            layout_table(&table),
            Err(Error::InvalidJustify('x'))
        ));
    }

    #[test]
    fn orphaned_last_column_drops_its_trailing_margin() {
        let (table, rows) = grid(&[&[(10.0, 5.0), (20.0, 5.0)]]);
        table.margin(4.0, 0.0);
        rows[0][1].orphan(true);
        assert!(layout_table(&table).unwrap());
        // Only the first column's box counts; no margin trails it.
        assert_eq!(
            table.property(PropId::RealWidth).get_num().unwrap(),
            Some(10.0)
        );
    }

    #[test]
    fn fully_orphaned_table_has_no_extent() {
        let (table, rows) = grid(&[&[(10.0, 5.0)]]);
        rows[0][0].orphan(true);
        assert!(layout_table(&table).unwrap());
        assert_eq!(table.property(PropId::RealWidth).get_num().unwrap(), None);
    }

    #[test]
    fn unmeasured_items_defer_layout() {
        let rows = vec![vec![Block::rect(10.0, 10.0)]];
        let table = Block::table(rows).unwrap();
        assert!(!layout_table(&table).unwrap());
    }

    #[test]
    fn cell_floor_applies() {
        let (table, _) = grid(&[&[(10.0, 5.0)]]);
        table.cell_dims(25.0, 12.0);
        assert!(layout_table(&table).unwrap());
        assert_eq!(
            table.property(PropId::RealWidth).get_num().unwrap(),
            Some(25.0)
        );
        assert_eq!(
            table.property(PropId::RealHeight).get_num().unwrap(),
            Some(12.0)
        );
    }
}
