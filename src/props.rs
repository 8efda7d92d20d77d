//! Property registry - named, typed cells attached to a block.
//!
//! Every block owns a `Props` map from [`PropId`] to [`Cell`], populated
//! lazily: reading a property that was never set yields an empty cell, so
//! reads cannot fail. Writes go through [`Props::set`], which rejects
//! explicit absence and writes to derived (read-only) properties.
//!
//! Property *names* form a closed enum rather than open-ended strings; pair
//! properties (one composite name driving two cells) and derived properties
//! (a fixed formula over named source properties) are declaration shapes
//! layered on top of the plain map, not extra storage.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::cell::{Cell, CellFn, Value};
use crate::error::{Error, Result};

// =============================================================================
// Property names
// =============================================================================

/// Every property a block kind can carry. Closed set; kind defaults and
/// derived declarations refer to these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PropId {
    // Geometry written during resolution.
    Left,
    Top,
    RealWidth,
    RealHeight,
    // Derived geometry.
    Right,
    Bottom,
    XMiddle,
    YMiddle,
    // Transforms applicable to any block.
    XShift,
    YShift,
    XScale,
    YScale,
    // Style.
    StrokeWidth,
    StrokeColor,
    FillColor,
    StrokeOpacity,
    FillOpacity,
    // Visibility levels.
    ShowLevel,
    HideLevel,
    Orphan,
    // Pivot a parent uses when placing this block (table cells).
    XParentPivot,
    YParentPivot,
    // Pivot of a Transform/Overlay/Frame.
    XPivot,
    YPivot,
    // Requested dimensions (rect, transform target, table total, text wrap).
    Width,
    Height,
    // Rect corner rounding.
    XRound,
    YRound,
    // Ellipse radii.
    XRadius,
    YRadius,
    // Table.
    XJustify,
    YJustify,
    XMargin,
    YMargin,
    CellWidth,
    CellHeight,
    // Frame padding.
    XPadding,
    YPadding,
    // Text.
    Content,
    Font,
    FontSize,
    // Image.
    Href,
    // Line endpoints (literal coordinates) and their resolved positions.
    X1,
    Y1,
    X2,
    Y2,
    Shrink1,
    Shrink2,
    RealX1,
    RealY1,
    RealX2,
    RealY2,
    // Animation.
    Duration,
}

impl PropId {
    pub fn name(self) -> &'static str {
        match self {
            PropId::Left => "left",
            PropId::Top => "top",
            PropId::RealWidth => "real_width",
            PropId::RealHeight => "real_height",
            PropId::Right => "right",
            PropId::Bottom => "bottom",
            PropId::XMiddle => "x_middle",
            PropId::YMiddle => "y_middle",
            PropId::XShift => "x_shift",
            PropId::YShift => "y_shift",
            PropId::XScale => "x_scale",
            PropId::YScale => "y_scale",
            PropId::StrokeWidth => "stroke_width",
            PropId::StrokeColor => "stroke_color",
            PropId::FillColor => "fill_color",
            PropId::StrokeOpacity => "stroke_opacity",
            PropId::FillOpacity => "fill_opacity",
            PropId::ShowLevel => "show_level",
            PropId::HideLevel => "hide_level",
            PropId::Orphan => "orphan",
            PropId::XParentPivot => "x_parent_pivot",
            PropId::YParentPivot => "y_parent_pivot",
            PropId::XPivot => "x_pivot",
            PropId::YPivot => "y_pivot",
            PropId::Width => "width",
            PropId::Height => "height",
            PropId::XRound => "x_round",
            PropId::YRound => "y_round",
            PropId::XRadius => "x_radius",
            PropId::YRadius => "y_radius",
            PropId::XJustify => "x_justify",
            PropId::YJustify => "y_justify",
            PropId::XMargin => "x_margin",
            PropId::YMargin => "y_margin",
            PropId::CellWidth => "cell_width",
            PropId::CellHeight => "cell_height",
            PropId::XPadding => "x_padding",
            PropId::YPadding => "y_padding",
            PropId::Content => "content",
            PropId::Font => "font",
            PropId::FontSize => "font_size",
            PropId::Href => "href",
            PropId::X1 => "x1",
            PropId::Y1 => "y1",
            PropId::X2 => "x2",
            PropId::Y2 => "y2",
            PropId::Shrink1 => "shrink1",
            PropId::Shrink2 => "shrink2",
            PropId::RealX1 => "real_x1",
            PropId::RealY1 => "real_y1",
            PropId::RealX2 => "real_x2",
            PropId::RealY2 => "real_y2",
            PropId::Duration => "duration",
        }
    }
}

impl std::fmt::Display for PropId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Registry
// =============================================================================

struct DerivedSpec {
    func: CellFn,
    args: Vec<PropId>,
}

/// Lazily-populated map from property name to cell.
#[derive(Default)]
pub struct Props {
    cells: HashMap<PropId, Cell>,
    derived: HashMap<PropId, DerivedSpec>,
    /// Properties wired to an internal formula; read-only like deriveds.
    wired: HashSet<PropId>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell for `id`, created on first touch. For a declared derived
    /// property the cell is built as its formula over the source property
    /// cells; otherwise it starts empty. Reads never fail.
    pub fn cell(&mut self, id: PropId) -> Cell {
        if let Some(cell) = self.cells.get(&id) {
            return cell.clone();
        }
        let cell = match self.derived.get(&id) {
            Some(spec) => {
                let func = Rc::clone(&spec.func);
                let arg_ids = spec.args.clone();
                let args: Vec<Cell> = arg_ids.into_iter().map(|a| self.cell(a)).collect();
                let cell = Cell::empty(id.name());
                cell.set_formula(move |values| func(values), args);
                cell
            }
            None => Cell::empty(id.name()),
        };
        self.cells.insert(id, cell.clone());
        cell
    }

    /// Whether the property was ever given a value or formula.
    pub fn exists(&self, id: PropId) -> bool {
        self.cells.get(&id).is_some_and(Cell::exists)
    }

    /// Whether `id` was declared derived or wired (and is therefore
    /// read-only).
    pub fn is_derived(&self, id: PropId) -> bool {
        self.derived.contains_key(&id) || self.wired.contains(&id)
    }

    /// Assign a property. `None` is rejected: properties are never cleared
    /// by writing absence, only by rebuilding the registry.
    pub fn set(&mut self, id: PropId, value: Option<Value>) -> Result<()> {
        if self.is_derived(id) {
            return Err(Error::ReadOnlyProperty(id));
        }
        let Some(value) = value else {
            return Err(Error::InvalidAssignment(id));
        };
        self.cell(id).set_value(value);
        Ok(())
    }

    /// Alias a property to an existing cell (dependency by reference).
    pub fn set_to_cell(&mut self, id: PropId, source: &Cell) -> Result<()> {
        if self.is_derived(id) {
            return Err(Error::ReadOnlyProperty(id));
        }
        self.cell(id).set_cell(source);
        Ok(())
    }

    /// Infallible write for writable built-in properties; construction-time
    /// plumbing only. Callers guarantee `id` is not derived.
    pub(crate) fn put(&mut self, id: PropId, value: impl Into<Value>) {
        self.cell(id).set_value(value.into());
    }

    pub(crate) fn put_cell(&mut self, id: PropId, source: &Cell) {
        self.cell(id).set_cell(source);
    }

    /// Attach a formula over arbitrary cells (not necessarily properties of
    /// this registry) and mark the property read-only. Construction-time
    /// geometry wiring.
    pub(crate) fn wire(
        &mut self,
        id: PropId,
        func: impl Fn(&[Option<Value>]) -> Option<Value> + 'static,
        args: Vec<Cell>,
    ) {
        self.cell(id).set_formula(func, args);
        self.wired.insert(id);
    }

    /// Set a pair property: one composite write driving two cells. A single
    /// value assigns both.
    pub fn set_pair(
        &mut self,
        x: PropId,
        y: PropId,
        x_value: Option<Value>,
        y_value: Option<Value>,
    ) -> Result<()> {
        self.set(x, x_value)?;
        self.set(y, y_value)
    }

    /// Both cells of a pair property.
    pub fn pair(&mut self, x: PropId, y: PropId) -> (Cell, Cell) {
        (self.cell(x), self.cell(y))
    }

    /// Declare a read-only derived property: a fixed formula over the named
    /// source properties, memoized like any other cell. Declaring a name
    /// twice (or shadowing an already-touched property) is a configuration
    /// error, raised here rather than at use.
    pub fn declare_derived(
        &mut self,
        id: PropId,
        args: Vec<PropId>,
        func: impl Fn(&[Option<Value>]) -> Option<Value> + 'static,
    ) -> Result<()> {
        if self.derived.contains_key(&id) || self.cells.contains_key(&id) {
            return Err(Error::ConfigurationError(id));
        }
        self.derived.insert(
            id,
            DerivedSpec {
                func: Rc::new(func),
                args,
            },
        );
        Ok(())
    }

    /// Construction-time variant of [`Props::declare_derived`] for the
    /// built-in geometry set; the ids are statically distinct, so the
    /// duplicate check is skipped.
    pub(crate) fn install_derived(
        &mut self,
        id: PropId,
        args: Vec<PropId>,
        func: impl Fn(&[Option<Value>]) -> Option<Value> + 'static,
    ) {
        self.derived.insert(
            id,
            DerivedSpec {
                func: Rc::new(func),
                args,
            },
        );
    }

    /// Seed from another registry. `by_value` copies each property's
    /// current value (class defaults); otherwise properties alias the
    /// source cells.
    pub fn seed_from(&mut self, source: &Props, by_value: bool) -> Result<()> {
        for (id, cell) in &source.cells {
            if by_value {
                if let Some(value) = cell.get()? {
                    self.put(*id, value);
                }
            } else {
                self.put_cell(*id, cell);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(values: &[Option<Value>]) -> Option<Value> {
        let a = values[0].as_ref()?.as_num()?;
        let b = values[1].as_ref()?.as_num()?;
        Some(Value::Num(a + b))
    }

    #[test]
    fn unset_property_reads_absent() {
        let mut props = Props::new();
        assert_eq!(props.cell(PropId::Left).get().unwrap(), None);
        assert!(!props.exists(PropId::Left));
    }

    #[test]
    fn set_then_get() {
        let mut props = Props::new();
        props.set(PropId::Width, Some(Value::Num(40.0))).unwrap();
        assert_eq!(props.cell(PropId::Width).get_num().unwrap(), Some(40.0));
        assert!(props.exists(PropId::Width));
    }

    #[test]
    fn absent_assignment_is_rejected() {
        let mut props = Props::new();
        assert!(matches!(
            props.set(PropId::Width, None),
            Err(Error::InvalidAssignment(PropId::Width))
        ));
    }

    #[test]
    fn derived_property_is_read_only() {
        let mut props = Props::new();
        props
            .declare_derived(PropId::Right, vec![PropId::Left, PropId::RealWidth], sum)
            .unwrap();
        assert!(matches!(
            props.set(PropId::Right, Some(Value::Num(1.0))),
            Err(Error::ReadOnlyProperty(PropId::Right))
        ));
    }

    #[test]
    fn derived_property_recomputes_under_invalidation() {
        let mut props = Props::new();
        props
            .declare_derived(PropId::Right, vec![PropId::Left, PropId::RealWidth], sum)
            .unwrap();

        let right = props.cell(PropId::Right);
        assert_eq!(right.get().unwrap(), None, "absent until sources resolve");

        props.put(PropId::Left, 10.0);
        props.put(PropId::RealWidth, 30.0);
        assert_eq!(right.get_num().unwrap(), Some(40.0));

        props.put(PropId::Left, 15.0);
        assert_eq!(right.get_num().unwrap(), Some(45.0));
    }

    #[test]
    fn duplicate_declaration_is_a_configuration_error() {
        let mut props = Props::new();
        props
            .declare_derived(PropId::Right, vec![PropId::Left, PropId::RealWidth], sum)
            .unwrap();
        assert!(matches!(
            props.declare_derived(PropId::Right, vec![PropId::Left], sum),
            Err(Error::ConfigurationError(PropId::Right))
        ));
    }

    #[test]
    fn pair_property_symmetry() {
        let mut props = Props::new();
        props
            .set_pair(
                PropId::XShift,
                PropId::YShift,
                Some(Value::Num(3.0)),
                Some(Value::Num(4.0)),
            )
            .unwrap();
        let (x, y) = props.pair(PropId::XShift, PropId::YShift);
        assert_eq!(x.get_num().unwrap(), Some(3.0));
        assert_eq!(y.get_num().unwrap(), Some(4.0));

        // One value through the composite name assigns both cells.
        let v = Value::Num(7.0);
        props
            .set_pair(PropId::XShift, PropId::YShift, Some(v.clone()), Some(v))
            .unwrap();
        assert_eq!(x.get_num().unwrap(), Some(7.0));
        assert_eq!(y.get_num().unwrap(), Some(7.0));
    }

    #[test]
    fn wired_property_is_read_only() {
        let mut props = Props::new();
        let source = Cell::literal("source", 2.0);
        props.wire(
            PropId::Left,
            |values| values[0].clone(),
            vec![source.clone()],
        );
        assert_eq!(props.cell(PropId::Left).get_num().unwrap(), Some(2.0));
        assert!(matches!(
            props.set(PropId::Left, Some(Value::Num(0.0))),
            Err(Error::ReadOnlyProperty(PropId::Left))
        ));
    }

    #[test]
    fn seed_from_copies_by_value() {
        let mut defaults = Props::new();
        defaults.put(PropId::FontSize, 28.0);

        let mut props = Props::new();
        props.seed_from(&defaults, true).unwrap();
        assert_eq!(props.cell(PropId::FontSize).get_num().unwrap(), Some(28.0));

        // By-value: later default changes do not leak in.
        defaults.put(PropId::FontSize, 10.0);
        assert_eq!(props.cell(PropId::FontSize).get_num().unwrap(), Some(28.0));
    }
}
