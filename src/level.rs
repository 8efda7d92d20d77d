//! Incremental reveal: the level schedule and stepping state machine.
//!
//! After a tree resolves, every block carrying a show or hide level is
//! indexed into a [`Schedule`]: per level, the blocks to show, hide, or
//! animate when that level is *entered going forward*. Stepping backward
//! through a level undoes exactly what entering it did. Jumps are repeated
//! single steps, so intermediate levels fire their effects in order no
//! matter where the walk started.

use crate::block::Block;
use crate::config::Config;
use crate::error::Result;

// =============================================================================
// Items
// =============================================================================

/// One thing added to a block during tree assembly: a child, or a marker
/// adjusting the ambient show level for the siblings that follow.
pub enum Item {
    Block(Block),
    /// Raise the ambient level by `n` for subsequent siblings.
    Pause(i64),
    /// Pin the ambient level to an absolute value.
    SetLevel(i64),
}

impl From<Block> for Item {
    fn from(block: Block) -> Self {
        Item::Block(block)
    }
}

impl From<&Block> for Item {
    fn from(block: &Block) -> Self {
        Item::Block(block.clone())
    }
}

/// Ambient-level increment marker (default increment is 1).
pub fn pause() -> Item {
    Item::Pause(1)
}

pub fn pause_by(n: i64) -> Item {
    Item::Pause(n)
}

pub fn set_level(level: i64) -> Item {
    Item::SetLevel(level)
}

// =============================================================================
// Schedule
// =============================================================================

/// Per-level show/hide/animate index over a resolved tree.
#[derive(Default)]
pub struct Schedule {
    show: Vec<Vec<Block>>,
    hide: Vec<Vec<Block>>,
    animate: Vec<Vec<Block>>,
}

impl Schedule {
    /// Index a whole resolved tree. Blocks whose show level is negative are
    /// skipped (visible from the start); indexed blocks start hidden until
    /// stepping reaches them.
    pub fn build(root: &Block) -> Result<Schedule> {
        let mut schedule = Schedule::default();
        schedule.index_subtree(root)?;
        tracing::debug!(max_level = schedule.max_level(), "level schedule built");
        Ok(schedule)
    }

    fn index_subtree(&mut self, block: &Block) -> Result<()> {
        self.index_block(block)?;
        for child in block.children() {
            self.index_subtree(&child)?;
        }
        Ok(())
    }

    fn index_block(&mut self, block: &Block) -> Result<()> {
        if let Some(level) = block.show_level_value()? {
            if level >= 0 {
                if level > 0 {
                    block.set_initially_hidden();
                }
                self.slot(Op::Show, level).push(block.clone());
                if block.has_animation() {
                    self.slot(Op::Animate, level).push(block.clone());
                }
            }
        }
        if let Some(level) = block.hide_level_value()? {
            if level >= 0 {
                self.slot(Op::Hide, level).push(block.clone());
            }
        }
        Ok(())
    }

    fn slot(&mut self, op: Op, level: i64) -> &mut Vec<Block> {
        let list = match op {
            Op::Show => &mut self.show,
            Op::Hide => &mut self.hide,
            Op::Animate => &mut self.animate,
        };
        let index = level as usize;
        if list.len() <= index {
            list.resize_with(index + 1, Vec::new);
        }
        &mut list[index]
    }

    /// Highest level any block shows or hides at.
    pub fn max_level(&self) -> i64 {
        self.show.len().max(self.hide.len()) as i64 - 1
    }

    pub fn show_blocks(&self, level: i64) -> &[Block] {
        Self::at(&self.show, level)
    }

    pub fn hide_blocks(&self, level: i64) -> &[Block] {
        Self::at(&self.hide, level)
    }

    pub fn animate_blocks(&self, level: i64) -> &[Block] {
        Self::at(&self.animate, level)
    }

    fn at(list: &[Vec<Block>], level: i64) -> &[Block] {
        usize::try_from(level)
            .ok()
            .and_then(|i| list.get(i))
            .map_or(&[], Vec::as_slice)
    }
}

enum Op {
    Show,
    Hide,
    Animate,
}

// =============================================================================
// Stepping
// =============================================================================

/// Current position in the reveal sequence. Starts at -1 (nothing entered);
/// the first forward step enters level 0.
pub struct LevelState {
    current: i64,
}

impl Default for LevelState {
    fn default() -> Self {
        LevelState { current: -1 }
    }
}

impl LevelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    /// Walk to `target` one level at a time, applying every intermediate
    /// level's effects in order. The target is clamped to the schedule, and
    /// -1 is reachable only before the first forward step: once level 0 has
    /// been entered it is the backward floor.
    pub fn set_level(&mut self, target: i64, schedule: &Schedule, config: &Config) {
        let floor = if self.current < 0 { -1 } else { 0 };
        let target = target.clamp(floor, schedule.max_level().max(floor));
        tracing::debug!(from = self.current, to = target, "level step");

        while self.current < target {
            self.current += 1;
            self.enter(self.current, schedule, config);
        }
        while self.current > target {
            self.leave(self.current, schedule);
            self.current -= 1;
        }
    }

    /// Effects of entering `level` forward: hide its hide-list, show its
    /// show-list, trigger its animations.
    fn enter(&self, level: i64, schedule: &Schedule, config: &Config) {
        for block in schedule.hide_blocks(level) {
            block.hide(false);
        }
        for block in schedule.show_blocks(level) {
            block.show();
        }
        if config.enable_animations {
            for block in schedule.animate_blocks(level) {
                block.start_animation();
            }
        }
    }

    /// Reverse of [`LevelState::enter`]: re-hide what it showed, re-show
    /// what it hid, and reset (not replay) its animations.
    fn leave(&self, level: i64, schedule: &Schedule) {
        for block in schedule.show_blocks(level) {
            block.hide(true);
        }
        for block in schedule.hide_blocks(level) {
            block.show();
        }
        for block in schedule.animate_blocks(level) {
            block.reset_animation();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
