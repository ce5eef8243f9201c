//! Execution progress of a command tree, kept apart from the tree.
//!
//! Nodes are addressed by their path of child indices from the root, so
//! one template can be walked by any number of sessions at once.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::logic::{Variables, resolve};
use crate::model::Block;

/// Child indices from the root of the tree.
pub type NodePath = Vec<usize>;

/// Where a block is in its repeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// A child is still to run.
    Iterating,
    /// Every child ran; the repeat condition decides what happens next.
    AwaitingRepeatDecision,
    /// Done for good.
    Terminal,
}

#[derive(Debug, Default)]
struct BlockCursor {
    next_index: usize,
    current: Option<usize>,
    iterations: usize,
    finished: bool,
}

/// Executed flags and block cursors of one tree walk.
#[derive(Debug, Default)]
pub struct ExecutionState {
    executed: HashSet<NodePath>,
    cursors: HashMap<NodePath, BlockCursor>,
}

pub fn child_path(path: &[usize], index: usize) -> NodePath {
    let mut child = path.to_vec();
    child.push(index);
    child
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_executed(&self, path: &[usize]) -> bool {
        self.executed.contains(path)
    }

    pub fn mark_executed(&mut self, path: &[usize]) {
        self.executed.insert(path.to_vec());
    }

    /// Forget all progress of `path` and its descendants.
    pub fn reset(&mut self, path: &[usize]) {
        self.executed.retain(|p| !p.starts_with(path));
        self.cursors.retain(|p, _| !p.starts_with(path));
    }

    /// Completed passes over the block at `path`, not counting the current one.
    pub fn iterations(&self, path: &[usize]) -> usize {
        self.cursors.get(path).map_or(0, |c| c.iterations)
    }

    pub fn state(&self, block: &Block, path: &[usize]) -> BlockState {
        let Some(cursor) = self.cursors.get(path) else {
            return if block.children.is_empty() {
                BlockState::Terminal
            } else {
                BlockState::Iterating
            };
        };

        if cursor.finished {
            return BlockState::Terminal;
        }
        let current_pending = cursor
            .current
            .is_some_and(|i| !self.executed.contains(&child_path(path, i)));
        if current_pending || cursor.next_index < block.children.len() {
            BlockState::Iterating
        } else if block.children.is_empty() {
            BlockState::Terminal
        } else {
            BlockState::AwaitingRepeatDecision
        }
    }

    /// Index of the next child of the block at `path` to run.
    ///
    /// The current child is returned again until it is marked executed.
    /// Once every child ran, a non-empty repeat condition that resolves
    /// against `variables` resets the whole subtree and starts over.
    pub fn next_child(
        &mut self,
        block: &Block,
        path: &[usize],
        variables: &Variables,
    ) -> Option<usize> {
        loop {
            let cursor = self.cursors.entry(path.to_vec()).or_default();
            if cursor.finished {
                return None;
            }

            if let Some(current) = cursor.current {
                if !self.executed.contains(&child_path(path, current)) {
                    return Some(current);
                }
            }

            if cursor.next_index < block.children.len() {
                let next = cursor.next_index;
                cursor.current = Some(next);
                cursor.next_index += 1;
                return Some(next);
            }

            let repeat = !block.children.is_empty()
                && !block.repeat_condition.is_empty()
                && resolve("", variables, &block.repeat_condition).resolved;
            if !repeat {
                cursor.finished = true;
                return None;
            }

            let iterations = cursor.iterations + 1;
            debug!("Block {} repeats (pass {})", block.uuid, iterations + 1);
            self.reset(path);
            self.cursors.entry(path.to_vec()).or_default().iterations = iterations;
        }
    }
}
