//! Backend scope frames - local slot maps with allocator snapshots.

use alchc_util::{FxHashMap, Ident};

/// One lexical scope inside the function being emitted
#[derive(Debug)]
pub(crate) struct ScopeFrame {
    /// name -> slot offset from the frame base
    slots: FxHashMap<Ident, usize>,
    /// allocator high-water at scope entry, restored on exit
    pub(crate) saved_offset: usize,
}

/// Stack of scope frames; lookup walks innermost-out
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_frame(&mut self, saved_offset: usize) {
        self.frames.push(ScopeFrame {
            slots: FxHashMap::default(),
            saved_offset,
        });
    }

    pub(crate) fn pop_frame(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }

    /// Record a slot in the innermost frame.
    pub(crate) fn insert(&mut self, name: Ident, offset: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.slots.insert(name, offset);
        }
    }

    /// Find a slot, innermost frame first.
    pub(crate) fn lookup(&self, name: Ident) -> Option<usize> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.slots.get(&name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchc_util::IdentPool;

    #[test]
    fn test_lookup_walks_innermost_out() {
        let mut pool = IdentPool::new();
        let x = pool.get_or_add("x");
        let y = pool.get_or_add("y");

        let mut scopes = ScopeStack::new();
        scopes.push_frame(0);
        scopes.insert(x, 0);
        scopes.push_frame(1);
        scopes.insert(y, 1);

        assert_eq!(scopes.lookup(x), Some(0));
        assert_eq!(scopes.lookup(y), Some(1));

        let frame = scopes.pop_frame().unwrap();
        assert_eq!(frame.saved_offset, 1);
        assert_eq!(scopes.lookup(y), None);
        assert_eq!(scopes.lookup(x), Some(0));
    }

    #[test]
    fn test_inner_shadowing() {
        let mut pool = IdentPool::new();
        let x = pool.get_or_add("x");

        let mut scopes = ScopeStack::new();
        scopes.push_frame(0);
        scopes.insert(x, 0);
        scopes.push_frame(1);
        scopes.insert(x, 5);

        assert_eq!(scopes.lookup(x), Some(5));
        scopes.pop_frame();
        assert_eq!(scopes.lookup(x), Some(0));
    }
}
