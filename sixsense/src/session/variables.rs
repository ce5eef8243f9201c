//! Scoped session variables.
//!
//! Every variable is a stack of [`ResultRetention`] frames. Entering a
//! node pushes one frame per dynamic field, leaving it pops them again.
//! Retaining a value replaces the top frame. A frame flagged
//! `overwrite_parent` replaces its parent when its scope is left, so the
//! value outlives the scope that produced it (loop counters rely on this).

use std::collections::HashMap;

use indexmap::IndexMap;
use log::trace;

use crate::logic::Variables;
use crate::model::ResultRetention;

#[derive(Debug, Default)]
pub struct VariableTable {
    stacks: HashMap<String, Vec<ResultRetention>>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one frame for every dynamic field.
    pub fn load_scope(&mut self, fields: &IndexMap<String, String>) {
        for (name, value) in fields {
            self.stacks
                .entry(name.clone())
                .or_default()
                .push(ResultRetention::variable(name.clone(), value.clone()));
        }
    }

    /// Pop the frames pushed by [`VariableTable::load_scope`].
    pub fn unload_scope(&mut self, fields: &IndexMap<String, String>) {
        for name in fields.keys() {
            self.remove_frame(name);
        }
    }

    fn remove_frame(&mut self, name: &str) {
        let Some(stack) = self.stacks.get_mut(name) else {
            return;
        };
        if let Some(top) = stack.pop() {
            if top.overwrite_parent {
                trace!("Variable {} escapes its scope with value {:?}", name, top.value);
                stack.pop();
                stack.push(top.with_overwrite_parent(false));
            }
        }
    }

    /// Replace the top frame of `retention.name` (or start its stack).
    pub fn retain(&mut self, retention: ResultRetention) {
        let stack = self.stacks.entry(retention.name.clone()).or_default();
        stack.pop();
        stack.push(retention);
    }

    /// Current value, empty when the variable has no frame.
    pub fn get(&self, name: &str) -> String {
        self.stacks
            .get(name)
            .and_then(|stack| stack.last())
            .map(|frame| frame.value.clone())
            .unwrap_or_default()
    }

    pub fn depth(&self, name: &str) -> usize {
        self.stacks.get(name).map_or(0, Vec::len)
    }

    /// The top frame of every variable.
    pub fn current(&self) -> Variables {
        self.stacks
            .iter()
            .filter_map(|(name, stack)| stack.last().map(|top| (name.clone(), top.value.clone())))
            .collect()
    }
}
