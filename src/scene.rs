//! A presentation unit: one block tree, its configuration, and its reveal
//! state.
//!
//! `Scene` ties the pieces together: it resolves the tree through a
//! [`Renderer`], builds the level schedule once resolution completes, and
//! steps the reveal sequence. Level operations before a complete resolve
//! fail with [`Error::NotResolved`].

use crate::block::Block;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::level::{LevelState, Schedule};
use crate::props::PropId;
use crate::render::{self, Renderer};

pub struct Scene {
    root: Block,
    config: Config,
    schedule: Option<Schedule>,
    level: LevelState,
}

impl Scene {
    pub fn new(root: Block) -> Scene {
        Scene::with_config(root, Config::default())
    }

    pub fn with_config(root: Block, config: Config) -> Scene {
        // The root anchors the ambient level at 0 unless told otherwise.
        if !root.has_property(PropId::ShowLevel) {
            root.show_level(0);
        }
        Scene {
            root,
            config,
            schedule: None,
            level: LevelState::new(),
        }
    }

    pub fn root(&self) -> &Block {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the tree. Returns the blocks whose measurement is still
    /// pending; with an empty return the scene is fully resolved and the
    /// level schedule is (re)built, reveal state reset to the start.
    pub fn resolve(&mut self, renderer: &mut dyn Renderer) -> Result<Vec<Block>> {
        let pending = render::resolve(&self.root, renderer, &self.config)?;
        if pending.is_empty() {
            self.schedule = Some(Schedule::build(&self.root)?);
            self.level = LevelState::new();
        }
        Ok(pending)
    }

    /// Discard resolution state and the level schedule; the next
    /// [`Scene::resolve`] starts from scratch.
    pub fn invalidate(&mut self) {
        self.root.invalidate_render();
        self.schedule = None;
        self.level = LevelState::new();
    }

    pub fn current_level(&self) -> i64 {
        self.level.current()
    }

    pub fn max_level(&self) -> Result<i64> {
        Ok(self.schedule()?.max_level())
    }

    /// Jump to `target`, firing every intermediate level's effects in order.
    pub fn set_level(&mut self, target: i64) -> Result<()> {
        let Some(schedule) = self.schedule.as_ref() else {
            return Err(Error::NotResolved("scene level schedule".to_owned()));
        };
        self.level.set_level(target, schedule, &self.config);
        Ok(())
    }

    pub fn step_forward(&mut self) -> Result<i64> {
        self.set_level(self.level.current() + 1)?;
        Ok(self.level.current())
    }

    pub fn step_backward(&mut self) -> Result<i64> {
        self.set_level(self.level.current() - 1)?;
        Ok(self.level.current())
    }

    fn schedule(&self) -> Result<&Schedule> {
        self.schedule
            .as_ref()
            .ok_or_else(|| Error::NotResolved("scene level schedule".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PlainRenderer;

    fn revealed_scene() -> (Scene, Block, Block) {
        let first = Block::rect(10.0, 10.0);
        let second = Block::rect(10.0, 10.0);
        let root = Block::overlay(vec![]).unwrap();
        root.add_child(&first).unwrap();
        root.add(crate::level::pause()).unwrap();
        root.add_child(&second).unwrap();
        (Scene::new(root), first, second)
    }

    #[test]
    fn level_operations_require_resolution() {
        let (mut scene, _, _) = revealed_scene();
        assert!(matches!(scene.set_level(1), Err(Error::NotResolved(_))));
        assert!(matches!(scene.max_level(), Err(Error::NotResolved(_))));
    }

    #[test]
    fn resolve_then_step() {
        let (mut scene, first, second) = revealed_scene();
        let pending = scene.resolve(&mut PlainRenderer::new()).unwrap();
        assert!(pending.is_empty());
        assert_eq!(scene.max_level().unwrap(), 1);

        assert!(first.is_visible());
        assert!(!second.is_visible());

        assert_eq!(scene.step_forward().unwrap(), 0);
        assert!(!second.is_visible());
        assert_eq!(scene.step_forward().unwrap(), 1);
        assert!(second.is_visible());
        assert_eq!(scene.step_backward().unwrap(), 0);
        assert!(!second.is_visible());
    }

    #[test]
    fn invalidate_resets_schedule_and_levels() {
        let (mut scene, _, second) = revealed_scene();
        scene.resolve(&mut PlainRenderer::new()).unwrap();
        scene.set_level(1).unwrap();
        assert!(second.is_visible());

        scene.invalidate();
        assert!(matches!(scene.set_level(1), Err(Error::NotResolved(_))));

        scene.resolve(&mut PlainRenderer::new()).unwrap();
        assert_eq!(scene.current_level(), -1);
        assert!(!second.is_visible(), "reveal state starts over");
        scene.set_level(1).unwrap();
        assert!(second.is_visible());
    }
}
