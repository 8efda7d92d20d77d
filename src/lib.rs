//! # easel
//!
//! Declarative, dependency-tracked scene layout for vector presentations.
//!
//! Authors build a tree of geometric blocks whose positions and sizes are
//! expressed relative to each other - pivots, justifications, margins -
//! rather than as absolute coordinates. The engine resolves the tree into
//! concrete geometry and a sequence of visibility "levels" for incremental
//! reveal.
//!
//! ## Architecture
//!
//! Everything rides on one reactive substrate:
//! ```text
//! Cells (lazy, memoized, invalidating) → Properties → Blocks → Combinators
//! ```
//! A [`Renderer`] fills in measured extents during a depth-first post-order
//! resolve; every layout formula above recomputes through plain
//! invalidation, so re-measuring one leaf reflows exactly what depends on
//! it. The [`Scene`] then steps a level state machine over the resolved
//! tree to drive show/hide/animate effects.
//!
//! ## Modules
//!
//! - [`cell`] - lazy value cells and their combinators
//! - [`props`] - named property registry (simple, pair, derived)
//! - [`block`] - the scene tree and shape kinds
//! - [`layout`] - Transform, Overlay, Table, Frame combinators
//! - [`level`] - reveal schedule and stepping state machine
//! - [`render`] - renderer contract, resolve walk, built-in geometry renderer
//! - [`scene`] - presentation unit tying tree, config, and levels together

pub mod block;
pub mod cell;
pub mod config;
pub mod error;
pub mod layout;
pub mod level;
pub mod props;
pub mod render;
pub mod scene;

pub use block::{Block, BlockKind, LineEnds};
pub use cell::{Cell, Value};
pub use config::{Config, TextMetrics};
pub use error::{Error, Result};
pub use level::{pause, pause_by, set_level, Item, LevelState, Schedule};
pub use props::{PropId, Props};
pub use render::{resolve, Measure, PlainRenderer, Renderer};
pub use scene::Scene;
