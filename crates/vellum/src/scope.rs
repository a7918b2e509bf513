//! Runtime scope chain: nested variable frames and block tables
//!
//! Frames live in a flat arena and link to their parent by index; entering
//! a scope pushes a frame, exiting moves the cursor back up. Frames are
//! never deallocated mid-execution, which is what lets a content
//! continuation capture its defining frame as a plain index and re-enter
//! it later.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::BlockNode;
use crate::template::VarMap;
use crate::value::Value;

/// Block table shared by reference across the frames of one template
/// invocation.
pub(crate) type BlockMap = HashMap<String, Arc<BlockNode>>;

struct Frame {
    parent: Option<usize>,
    variables: VarMap,
    blocks: Arc<BlockMap>,
}

/// The scope chain of one runtime.
pub(crate) struct ScopeChain {
    frames: Vec<Frame>,
    current: usize,
}

impl ScopeChain {
    /// Create a chain whose base frame holds the caller-supplied
    /// variables.
    pub(crate) fn new(variables: VarMap) -> Self {
        ScopeChain {
            frames: vec![Frame {
                parent: None,
                variables,
                blocks: Arc::new(BlockMap::new()),
            }],
            current: 0,
        }
    }

    /// Push a frame inheriting the current block table.
    pub(crate) fn enter(&mut self) {
        let blocks = self.frames[self.current].blocks.clone();
        self.frames.push(Frame {
            parent: Some(self.current),
            variables: VarMap::new(),
            blocks,
        });
        self.current = self.frames.len() - 1;
    }

    /// Push a frame seeded with a template's collected block table.
    pub(crate) fn enter_template(&mut self, blocks: Arc<BlockMap>) {
        self.frames.push(Frame {
            parent: Some(self.current),
            variables: VarMap::new(),
            blocks,
        });
        self.current = self.frames.len() - 1;
    }

    /// Move back to the parent frame. The base frame is never popped.
    pub(crate) fn exit(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            self.current = parent;
        }
    }

    /// Index of the current frame, capturable by continuations.
    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    /// Re-enter a previously captured frame.
    pub(crate) fn set_current(&mut self, index: usize) {
        debug_assert!(index < self.frames.len());
        self.current = index;
    }

    /// Walk innermost → outermost looking for a binding.
    pub(crate) fn resolve(&self, name: &str) -> Option<&Value> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let frame = &self.frames[i];
            if let Some(v) = frame.variables.get(name) {
                return Some(v);
            }
            idx = frame.parent;
        }
        None
    }

    /// Mutate the binding in the frame where it lives, or define it in
    /// the innermost frame when no frame has it.
    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            if self.frames[i].variables.get(name).is_some() {
                self.frames[i].variables.set(name, value);
                return;
            }
            idx = self.frames[i].parent;
        }
        self.frames[self.current].variables.set(name, value);
    }

    /// Define a binding in the innermost frame unconditionally.
    pub(crate) fn define(&mut self, name: &str, value: Value) {
        self.frames[self.current].variables.set(name, value);
    }

    /// Whether the innermost frame already binds this name.
    pub(crate) fn defined_in_current(&self, name: &str) -> bool {
        self.frames[self.current].variables.get(name).is_some()
    }

    /// Walk the chain's block tables for the nearest definition.
    pub(crate) fn block_lookup(&self, name: &str) -> Option<Arc<BlockNode>> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let frame = &self.frames[i];
            if let Some(block) = frame.blocks.get(name) {
                return Some(block.clone());
            }
            idx = frame.parent;
        }
        None
    }

    /// Depth of the current frame (base frame = 1).
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        let mut depth = 1;
        let mut idx = self.frames[self.current].parent;
        while let Some(i) = idx {
            depth += 1;
            idx = self.frames[i].parent;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ScopeChain {
        ScopeChain::new(VarMap::new())
    }

    #[test]
    fn base_frame_is_never_popped() {
        let mut sc = chain();
        assert_eq!(sc.depth(), 1);
        sc.exit();
        assert_eq!(sc.depth(), 1);
    }

    #[test]
    fn define_and_resolve() {
        let mut sc = chain();
        sc.define("x", Value::Int(1));
        assert_eq!(sc.resolve("x"), Some(&Value::Int(1)));
        assert_eq!(sc.resolve("y"), None);
    }

    #[test]
    fn inner_frames_shadow() {
        let mut sc = chain();
        sc.define("x", Value::Int(1));
        sc.enter();
        sc.define("x", Value::Int(2));
        assert_eq!(sc.resolve("x"), Some(&Value::Int(2)));
        sc.exit();
        assert_eq!(sc.resolve("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn set_value_mutates_where_the_binding_lives() {
        let mut sc = chain();
        sc.define("x", Value::Int(1));
        sc.enter();
        sc.set_value("x", Value::Int(10));
        sc.exit();
        assert_eq!(sc.resolve("x"), Some(&Value::Int(10)));
    }

    #[test]
    fn set_value_defines_innermost_when_unbound() {
        let mut sc = chain();
        sc.enter();
        sc.set_value("fresh", Value::Int(5));
        assert_eq!(sc.resolve("fresh"), Some(&Value::Int(5)));
        sc.exit();
        assert_eq!(sc.resolve("fresh"), None);
    }

    #[test]
    fn captured_frames_stay_addressable() {
        let mut sc = chain();
        sc.define("x", Value::Int(1));
        sc.enter();
        sc.define("x", Value::Int(2));
        let captured = sc.current_index();
        sc.exit();

        sc.enter();
        sc.define("x", Value::Int(3));
        let inner = sc.current_index();

        sc.set_current(captured);
        assert_eq!(sc.resolve("x"), Some(&Value::Int(2)));
        sc.set_current(inner);
        assert_eq!(sc.resolve("x"), Some(&Value::Int(3)));
    }

    #[test]
    fn defined_in_current_ignores_outer_frames() {
        let mut sc = chain();
        sc.define("x", Value::Int(1));
        sc.enter();
        assert!(!sc.defined_in_current("x"));
        sc.define("x", Value::Int(2));
        assert!(sc.defined_in_current("x"));
    }
}
