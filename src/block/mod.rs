//! Geometric blocks - the scene tree.
//!
//! A [`Block`] is a tree node pairing a shape [`BlockKind`] with a property
//! registry. All geometry is expressed through cells: a renderer fills in
//! *measured* extents during resolution, and the public `left`/`top`/
//! `real_width`/`real_height` properties are read-only formulas over those
//! measurements plus the block's own shift/scale/anchor, so re-measuring a
//! leaf recomputes every dependent layout through plain invalidation.
//!
//! Coordinates are parent-local: a block's reported geometry already includes
//! its own shift and scale, so a parent aggregating children sees them where
//! they will actually land.
//!
//! Ownership is strict. A parent exclusively owns its children; attaching an
//! already-parented block is an error, and sharing one drawable twice means
//! wrapping it again (see [`Block::wrap`]).

mod kind;

pub use kind::{BlockKind, LineEnds};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use kurbo::{Point, Rect};

use crate::cell::{num, Cell, Value};
use crate::error::{Error, Result};
use crate::level::Item;
use crate::props::{PropId, Props};

// =============================================================================
// Node
// =============================================================================

thread_local! {
    static NEXT_ID: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

/// Internal measurement cells a renderer resolves into. Literal extents for
/// leaves; formulas over children for composites.
pub(crate) struct Measured {
    pub left: Cell,
    pub top: Cell,
    pub width: Cell,
    pub height: Cell,
}

struct BlockInner {
    props: Props,
    /// From-values and duration for the animation triggered at this block's
    /// show level.
    animate: Props,
    children: Vec<Block>,
    /// Blocks that must be fully resolved before this block's own children
    /// (a resolution-order constraint, not a value dependency).
    init_deps: Vec<Block>,
    parent: Weak<Node>,
    /// Ambient show level handed to subsequently added children. Pause and
    /// set-level markers replace this handle; earlier children keep aliasing
    /// the cell they were given.
    env_level: Cell,
    measured: Measured,
    /// Pivot translation installed by Transform; absent reads as zero.
    anchor_x: Cell,
    anchor_y: Cell,
    /// Block hidden when this one is shown (and re-shown stepping backward).
    replaces: Option<Weak<Node>>,
    resolved: bool,
    visible: bool,
    has_animation: bool,
    animation_started: bool,
}

struct Node {
    id: u64,
    kind: BlockKind,
    inner: RefCell<BlockInner>,
}

/// A scene-tree node. Cheap to clone; clones share the node.
#[derive(Clone)]
pub struct Block {
    node: Rc<Node>,
}

/// `measured * scale + anchor + shift`; absent until measured.
fn position_formula(values: &[Option<Value>]) -> Option<Value> {
    let measured = num(&values[0])?;
    let scale = num(&values[1]).unwrap_or(1.0);
    let anchor = num(&values[2]).unwrap_or(0.0);
    let shift = num(&values[3]).unwrap_or(0.0);
    Some(Value::Num(measured * scale + anchor + shift))
}

/// `measured * scale`; absent until measured.
fn extent_formula(values: &[Option<Value>]) -> Option<Value> {
    let measured = num(&values[0])?;
    let scale = num(&values[1]).unwrap_or(1.0);
    Some(Value::Num(measured * scale))
}

fn sum_formula(values: &[Option<Value>]) -> Option<Value> {
    Some(Value::Num(num(&values[0])? + num(&values[1])?))
}

fn midpoint_formula(values: &[Option<Value>]) -> Option<Value> {
    Some(Value::Num(num(&values[0])? + num(&values[1])? / 2.0))
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });

        let mut props = Props::new();
        let measured = Measured {
            left: Cell::empty("measured_left"),
            top: Cell::empty("measured_top"),
            width: Cell::empty("measured_width"),
            height: Cell::empty("measured_height"),
        };
        let anchor_x = Cell::empty("anchor_x");
        let anchor_y = Cell::empty("anchor_y");

        let x_scale = props.cell(PropId::XScale);
        let y_scale = props.cell(PropId::YScale);
        let x_shift = props.cell(PropId::XShift);
        let y_shift = props.cell(PropId::YShift);

        props.wire(
            PropId::Left,
            position_formula,
            vec![
                measured.left.clone(),
                x_scale.clone(),
                anchor_x.clone(),
                x_shift,
            ],
        );
        props.wire(
            PropId::Top,
            position_formula,
            vec![
                measured.top.clone(),
                y_scale.clone(),
                anchor_y.clone(),
                y_shift,
            ],
        );
        props.wire(
            PropId::RealWidth,
            extent_formula,
            vec![measured.width.clone(), x_scale],
        );
        props.wire(
            PropId::RealHeight,
            extent_formula,
            vec![measured.height.clone(), y_scale],
        );

        props.install_derived(
            PropId::Right,
            vec![PropId::Left, PropId::RealWidth],
            sum_formula,
        );
        props.install_derived(
            PropId::Bottom,
            vec![PropId::Top, PropId::RealHeight],
            sum_formula,
        );
        props.install_derived(
            PropId::XMiddle,
            vec![PropId::Left, PropId::RealWidth],
            midpoint_formula,
        );
        props.install_derived(
            PropId::YMiddle,
            vec![PropId::Top, PropId::RealHeight],
            midpoint_formula,
        );

        // Ambient level starts as the block's own show level; pauses among
        // children advance the handle from there.
        let env_level = Cell::empty("env_level");
        env_level.set_cell(&props.cell(PropId::ShowLevel));

        Block {
            node: Rc::new(Node {
                id,
                kind,
                inner: RefCell::new(BlockInner {
                    props,
                    animate: Props::new(),
                    children: Vec::new(),
                    init_deps: Vec::new(),
                    parent: Weak::new(),
                    env_level,
                    measured,
                    anchor_x,
                    anchor_y,
                    replaces: None,
                    resolved: false,
                    visible: true,
                    has_animation: false,
                    animation_started: false,
                }),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.node.id
    }

    pub fn kind(&self) -> &BlockKind {
        &self.node.kind
    }

    /// Diagnostic label: kind plus instance id.
    pub fn label(&self) -> String {
        format!("{}#{}", self.node.kind.name(), self.node.id)
    }

    pub fn same(&self, other: &Block) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self) -> Option<Block> {
        let weak = self.node.inner.borrow().parent.clone();
        weak.upgrade().map(|node| Block { node })
    }

    pub fn children(&self) -> Vec<Block> {
        self.node.inner.borrow().children.clone()
    }

    pub fn init_deps(&self) -> Vec<Block> {
        self.node.inner.borrow().init_deps.clone()
    }

    /// Append a child. A child without an explicit show level inherits the
    /// ambient one, and the ambient handle continues from wherever the
    /// child's own markers left it; a child that pinned its own level leaves
    /// the ambient level of later siblings alone.
    pub fn add_child(&self, child: &Block) -> Result<&Self> {
        if child.parent().is_some() {
            return Err(Error::AlreadyParented(child.label()));
        }
        let inherits = {
            let env = self.node.inner.borrow().env_level.clone();
            let mut child_inner = child.node.inner.borrow_mut();
            child_inner.parent = Rc::downgrade(&self.node);
            if child_inner.props.exists(PropId::ShowLevel) {
                false
            } else {
                child_inner.props.cell(PropId::ShowLevel).set_cell(&env);
                true
            }
        };
        if inherits {
            let child_env = child.node.inner.borrow().env_level.clone();
            self.node.inner.borrow_mut().env_level = child_env;
        }
        self.node.inner.borrow_mut().children.push(child.clone());
        Ok(self)
    }

    /// Add an item: a child block, or a level marker adjusting the ambient
    /// show level for subsequent items.
    pub fn add(&self, item: impl Into<Item>) -> Result<&Self> {
        match item.into() {
            Item::Block(block) => {
                self.add_child(&block)?;
            }
            Item::Pause(n) => {
                let mut inner = self.node.inner.borrow_mut();
                let raised = inner.env_level.or_else(0.0).add(n as f64);
                inner.env_level = raised;
            }
            Item::SetLevel(level) => {
                self.node.inner.borrow_mut().env_level =
                    Cell::literal("env_level", level as f64);
            }
        }
        Ok(self)
    }

    /// Record that `dep` must be resolved before this block's children are.
    pub fn add_init_dependency(&self, dep: &Block) -> &Self {
        self.node.inner.borrow_mut().init_deps.push(dep.clone());
        self
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// The cell behind a named property, created on first touch.
    pub fn property(&self, id: PropId) -> Cell {
        self.node.inner.borrow_mut().props.cell(id)
    }

    /// Whether the property was ever given a value or formula.
    pub fn has_property(&self, id: PropId) -> bool {
        self.node.inner.borrow().props.exists(id)
    }

    /// Assign a property, rejecting writes to derived names and explicit
    /// absence.
    pub fn set_property(&self, id: PropId, value: Option<Value>) -> Result<&Self> {
        self.node.inner.borrow_mut().props.set(id, value)?;
        Ok(self)
    }

    /// Assign a pair property through its composite name.
    pub fn set_property_pair(
        &self,
        x: PropId,
        y: PropId,
        x_value: Option<Value>,
        y_value: Option<Value>,
    ) -> Result<&Self> {
        self.node
            .inner
            .borrow_mut()
            .props
            .set_pair(x, y, x_value, y_value)?;
        Ok(self)
    }

    pub(crate) fn put(&self, id: PropId, value: impl Into<Value>) -> &Self {
        self.node.inner.borrow_mut().props.put(id, value);
        self
    }

    pub(crate) fn put_cell(&self, id: PropId, source: &Cell) {
        self.node.inner.borrow_mut().props.put_cell(id, source);
    }

    // Chainable setters for the built-in writable properties.

    pub fn shift(&self, x: impl Into<Cell>, y: impl Into<Cell>) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        inner.props.cell(PropId::XShift).set_cell(&x.into());
        inner.props.cell(PropId::YShift).set_cell(&y.into());
        drop(inner);
        self
    }

    /// Uniform scale on both axes.
    pub fn scale(&self, factor: impl Into<Cell>) -> &Self {
        let factor = factor.into();
        self.scale_xy(&factor, &factor)
    }

    pub fn scale_xy(&self, x: impl Into<Cell>, y: impl Into<Cell>) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        inner.props.cell(PropId::XScale).set_cell(&x.into());
        inner.props.cell(PropId::YScale).set_cell(&y.into());
        drop(inner);
        self
    }

    /// Anchor point in `[-1, 1]` per axis, consumed by transforms and table
    /// justification.
    pub fn pivot(&self, x: f64, y: f64) -> &Self {
        self.put(PropId::XPivot, x).put(PropId::YPivot, y)
    }

    /// Per-cell override of the enclosing table's justification pivot.
    pub fn parent_pivot(&self, x: f64, y: f64) -> &Self {
        self.put(PropId::XParentPivot, x).put(PropId::YParentPivot, y)
    }

    pub fn width(&self, w: impl Into<Cell>) -> &Self {
        self.node
            .inner
            .borrow_mut()
            .props
            .cell(PropId::Width)
            .set_cell(&w.into());
        self
    }

    pub fn height(&self, h: impl Into<Cell>) -> &Self {
        self.node
            .inner
            .borrow_mut()
            .props
            .cell(PropId::Height)
            .set_cell(&h.into());
        self
    }

    pub fn dims(&self, w: impl Into<Cell>, h: impl Into<Cell>) -> &Self {
        self.width(w).height(h)
    }

    pub fn stroke_color(&self, color: &str) -> &Self {
        self.put(PropId::StrokeColor, color)
    }

    pub fn fill_color(&self, color: &str) -> &Self {
        self.put(PropId::FillColor, color)
    }

    pub fn stroke_width(&self, w: f64) -> &Self {
        self.put(PropId::StrokeWidth, w)
    }

    /// Corner rounding radii for rect-like shapes.
    pub fn rounded(&self, x: f64, y: f64) -> &Self {
        self.put(PropId::XRound, x).put(PropId::YRound, y)
    }

    pub fn font(&self, name: &str) -> &Self {
        self.put(PropId::Font, name)
    }

    pub fn font_size(&self, size: f64) -> &Self {
        self.put(PropId::FontSize, size)
    }

    pub fn stroke_opacity(&self, o: f64) -> &Self {
        self.put(PropId::StrokeOpacity, o)
    }

    pub fn fill_opacity(&self, o: f64) -> &Self {
        self.put(PropId::FillOpacity, o)
    }

    /// Stroke and fill opacity together.
    pub fn opacity(&self, o: f64) -> &Self {
        self.stroke_opacity(o).fill_opacity(o)
    }

    pub fn show_level(&self, level: i64) -> &Self {
        self.put(PropId::ShowLevel, level as f64)
    }

    pub fn hide_level(&self, level: i64) -> &Self {
        self.put(PropId::HideLevel, level as f64)
    }

    pub fn level(&self, show: i64, hide: i64) -> &Self {
        self.show_level(show).hide_level(hide)
    }

    /// Visible for `n` levels: `hide_level = show_level + n`, tracked
    /// through the cell graph so a later show-level change carries over.
    pub fn num_levels(&self, n: i64) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        let hide = inner.props.cell(PropId::ShowLevel).add(n as f64);
        inner.props.cell(PropId::HideLevel).set_cell(&hide);
        drop(inner);
        self
    }

    /// Exclude this block from its parent's bounding-box aggregation.
    pub fn orphan(&self, flag: bool) -> &Self {
        self.put(PropId::Orphan, flag)
    }

    /// Copy show/hide levels and orphan status from `source`, by reference:
    /// later changes to the source carry over.
    pub fn mimic(&self, source: &Block) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        let mut src = source.node.inner.borrow_mut();
        for id in [PropId::ShowLevel, PropId::HideLevel, PropId::Orphan] {
            let from = src.props.cell(id);
            inner.props.cell(id).set_cell(&from);
        }
        drop(src);
        drop(inner);
        self
    }

    /// Hide `other` whenever this block is shown; re-show it when this block
    /// is hidden stepping backward.
    pub fn replaces(&self, other: &Block) -> &Self {
        self.node.inner.borrow_mut().replaces = Some(Rc::downgrade(&other.node));
        self
    }

    pub fn is_orphan(&self) -> Result<bool> {
        let cell = self.property(PropId::Orphan);
        Ok(cell.get()?.is_some_and(|v| v.truthy()))
    }

    pub fn show_level_value(&self) -> Result<Option<i64>> {
        self.property(PropId::ShowLevel).get_level()
    }

    pub fn hide_level_value(&self) -> Result<Option<i64>> {
        self.property(PropId::HideLevel).get_level()
    }

    // =========================================================================
    // Animation
    // =========================================================================

    /// Record a from-value for the animation played when this block's show
    /// level is entered. Indexing into the level schedule keys off any
    /// animate write having happened.
    pub fn animate_from(&self, id: PropId, value: impl Into<Value>) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        inner.animate.put(id, value);
        inner.has_animation = true;
        drop(inner);
        self
    }

    pub fn duration(&self, seconds: f64) -> &Self {
        let mut inner = self.node.inner.borrow_mut();
        inner.animate.put(PropId::Duration, seconds);
        inner.has_animation = true;
        drop(inner);
        self
    }

    pub fn animate_cell(&self, id: PropId) -> Cell {
        self.node.inner.borrow_mut().animate.cell(id)
    }

    pub fn has_animation(&self) -> bool {
        self.node.inner.borrow().has_animation
    }

    pub fn animation_started(&self) -> bool {
        self.node.inner.borrow().animation_started
    }

    pub(crate) fn start_animation(&self) {
        self.node.inner.borrow_mut().animation_started = true;
    }

    pub(crate) fn reset_animation(&self) {
        self.node.inner.borrow_mut().animation_started = false;
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    pub fn is_visible(&self) -> bool {
        self.node.inner.borrow().visible
    }

    pub(crate) fn show(&self) {
        let replaced = {
            let mut inner = self.node.inner.borrow_mut();
            inner.visible = true;
            inner.replaces.clone()
        };
        if let Some(node) = replaced.and_then(|weak| weak.upgrade()) {
            Block { node }.hide(false);
        }
    }

    /// `reverse` marks a backward step, which undoes the replacement too.
    pub(crate) fn hide(&self, reverse: bool) {
        let replaced = {
            let mut inner = self.node.inner.borrow_mut();
            inner.visible = false;
            inner.replaces.clone()
        };
        if reverse {
            if let Some(node) = replaced.and_then(|weak| weak.upgrade()) {
                Block { node }.show();
            }
        }
    }

    /// Hidden until its show level is entered; applied while the level
    /// schedule is built.
    pub(crate) fn set_initially_hidden(&self) {
        self.node.inner.borrow_mut().visible = false;
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    pub fn is_resolved(&self) -> bool {
        self.node.inner.borrow().resolved
    }

    pub(crate) fn mark_resolved(&self, resolved: bool) {
        self.node.inner.borrow_mut().resolved = resolved;
    }

    pub(crate) fn with_measured<R>(&self, f: impl FnOnce(&Measured) -> R) -> R {
        f(&self.node.inner.borrow().measured)
    }

    /// Store a renderer-measured extent (leaf shapes).
    pub(crate) fn set_measured_extent(&self, rect: Rect) {
        self.with_measured(|m| {
            m.left.set_value(rect.x0);
            m.top.set_value(rect.y0);
            m.width.set_value(rect.width());
            m.height.set_value(rect.height());
        });
    }

    pub(crate) fn anchor_cells(&self) -> (Cell, Cell) {
        let inner = self.node.inner.borrow();
        (inner.anchor_x.clone(), inner.anchor_y.clone())
    }

    /// Install aggregation formulas: this block's measured extent is the
    /// union of its non-orphan children's reported geometry. With no
    /// eligible children the measured cells are left untouched.
    pub(crate) fn set_measured_from_children(&self) -> Result<()> {
        let mut eligible = Vec::new();
        for child in self.children() {
            if !child.is_orphan()? {
                eligible.push(child);
            }
        }
        if eligible.is_empty() {
            return Ok(());
        }

        let fold = |id: PropId, pick: fn(f64, f64) -> f64| -> Cell {
            let mut cells = eligible.iter().map(|c| c.property(id));
            let first = cells.next().unwrap_or_else(|| Cell::empty("fold"));
            cells.fold(first, |acc, cell| {
                Cell::derived(
                    "bbox",
                    move |values| match (num(&values[0]), num(&values[1])) {
                        (Some(a), Some(b)) => Some(Value::Num(pick(a, b))),
                        (Some(a), None) => Some(Value::Num(a)),
                        (None, Some(b)) => Some(Value::Num(b)),
                        (None, None) => None,
                    },
                    vec![acc, cell],
                )
            })
        };

        let left = fold(PropId::Left, f64::min);
        let top = fold(PropId::Top, f64::min);
        let right = fold(PropId::Right, f64::max);
        let bottom = fold(PropId::Bottom, f64::max);

        self.with_measured(|m| {
            m.left.set_cell(&left);
            m.top.set_cell(&top);
            m.width.set_formula(sub_formula, vec![right.clone(), left.clone()]);
            m.height.set_formula(sub_formula, vec![bottom, top.clone()]);
        });
        Ok(())
    }

    /// Discard resolution state from this subtree and mark every ancestor
    /// unresolved, forcing a fresh resolve pass. Used when content is
    /// swapped post-construction.
    pub fn invalidate_render(&self) {
        tracing::debug!(block = %self.label(), "invalidate render");
        self.clear_subtree();
        let mut parent = self.parent();
        while let Some(p) = parent {
            p.mark_resolved(false);
            parent = p.parent();
        }
    }

    fn clear_subtree(&self) {
        {
            let mut inner = self.node.inner.borrow_mut();
            inner.resolved = false;
            inner.measured.left.clear();
            inner.measured.top.clear();
            inner.measured.width.clear();
            inner.measured.height.clear();
        }
        for child in self.children() {
            child.clear_subtree();
        }
    }

    pub(crate) fn env_level_cell(&self) -> Cell {
        self.node.inner.borrow().env_level.clone()
    }

    // =========================================================================
    // Geometry queries
    // =========================================================================

    fn require_geometry(&self, id: PropId) -> Result<f64> {
        self.property(id)
            .get_num()?
            .ok_or_else(|| Error::NotResolved(self.label()))
    }

    /// Where a ray leaving the block's center at `angle` (degrees) exits the
    /// block boundary: the bounding box for most shapes, the ellipse arc for
    /// elliptical ones. A composite with a single non-orphan child delegates
    /// to it.
    pub fn clip_point(&self, angle: f64) -> Result<Point> {
        let mut eligible = Vec::new();
        for child in self.children() {
            if !child.is_orphan()? {
                eligible.push(child);
            }
        }
        if eligible.len() == 1 && !matches!(self.node.kind, BlockKind::Ellipse) {
            let p = eligible[0].clip_point(angle)?;
            return self.map_to_own_space(p);
        }

        let cx = self.require_geometry(PropId::XMiddle)?;
        let cy = self.require_geometry(PropId::YMiddle)?;
        let width = self.require_geometry(PropId::RealWidth)?;
        let height = self.require_geometry(PropId::RealHeight)?;
        let (dx, dy) = (angle.to_radians().cos(), angle.to_radians().sin());

        match self.node.kind {
            BlockKind::Ellipse => {
                let (rx, ry) = (width / 2.0, height / 2.0);
                let denom = ((ry * dx).powi(2) + (rx * dy).powi(2)).sqrt();
                if denom == 0.0 {
                    return Ok(Point::new(cx, cy));
                }
                let r = rx * ry / denom;
                Ok(Point::new(cx + r * dx, cy + r * dy))
            }
            _ => {
                let tx = if dx != 0.0 {
                    (width / 2.0) / dx.abs()
                } else {
                    f64::INFINITY
                };
                let ty = if dy != 0.0 {
                    (height / 2.0) / dy.abs()
                } else {
                    f64::INFINITY
                };
                let t = tx.min(ty);
                if t.is_infinite() {
                    return Ok(Point::new(cx, cy));
                }
                Ok(Point::new(cx + t * dx, cy + t * dy))
            }
        }
    }

    /// Map a point from child coordinates through this block's own
    /// scale/anchor/shift into parent coordinates.
    fn map_to_own_space(&self, p: Point) -> Result<Point> {
        let mut inner = self.node.inner.borrow_mut();
        let sx = inner.props.cell(PropId::XScale).num_or(1.0)?;
        let sy = inner.props.cell(PropId::YScale).num_or(1.0)?;
        let shx = inner.props.cell(PropId::XShift).num_or(0.0)?;
        let shy = inner.props.cell(PropId::YShift).num_or(0.0)?;
        let ax = inner.anchor_x.num_or(0.0)?;
        let ay = inner.anchor_y.num_or(0.0)?;
        Ok(Point::new(p.x * sx + ax + shx, p.y * sy + ay + shy))
    }

    /// Resolved bounding box in parent coordinates.
    pub fn bbox(&self) -> Result<Rect> {
        Ok(Rect::new(
            self.require_geometry(PropId::Left)?,
            self.require_geometry(PropId::Top)?,
            self.require_geometry(PropId::Right)?,
            self.require_geometry(PropId::Bottom)?,
        ))
    }
}

fn sub_formula(values: &[Option<Value>]) -> Option<Value> {
    Some(Value::Num(num(&values[0])? - num(&values[1])?))
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("label", &self.label())
            .field("children", &self.node.inner.borrow().children.len())
            .field("resolved", &self.node.inner.borrow().resolved)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
