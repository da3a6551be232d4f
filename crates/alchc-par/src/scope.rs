//! Scope tracking for parse-time variable resolution.
//!
//! A single flat map `name -> depth of current definition` is backed by a
//! shadow stack of restore records. Scope entry captures the shadow-stack
//! top; scope exit pops records above the marker and either re-inserts the
//! previous binding or removes the name. This keeps lookup O(1) and
//! `leave_scope` a bounded sequence of restores, instead of a literal stack
//! of maps.
//!
//! Function parameters are collected into a pending buffer while the
//! declaration header is parsed and drained into the body scope at the
//! first `enter_scope` that follows.

use alchc_util::{FxHashMap, Ident};

/// Restore record for one definition made since the enclosing marker
#[derive(Debug)]
struct ShadowRecord {
    name: Ident,
    /// Depth of the binding this one shadowed, if any
    prev: Option<u32>,
}

/// The parser's scope stack
#[derive(Debug, Default)]
pub struct ScopeStack {
    /// name -> depth of its innermost definition
    current: FxHashMap<Ident, u32>,
    /// definitions to undo on scope exit
    shadow: Vec<ShadowRecord>,
    /// shadow-stack height at each open scope's entry
    markers: Vec<usize>,
    /// parameters waiting for the body scope
    pending_params: Vec<Ident>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth; 0 outside every scope
    #[inline]
    pub fn depth(&self) -> u32 {
        self.markers.len() as u32
    }

    /// Open a scope and drain any pending parameters into it
    pub fn enter_scope(&mut self) {
        self.markers.push(self.shadow.len());
        let params = std::mem::take(&mut self.pending_params);
        for name in params {
            self.define(name);
        }
    }

    /// Close the innermost scope, restoring shadowed bindings
    pub fn leave_scope(&mut self) {
        let Some(marker) = self.markers.pop() else {
            return;
        };
        while self.shadow.len() > marker {
            let Some(record) = self.shadow.pop() else {
                break;
            };
            match record.prev {
                Some(depth) => {
                    self.current.insert(record.name, depth);
                }
                None => {
                    self.current.remove(&record.name);
                }
            }
        }
    }

    /// Record the first introduction of `name` at the current depth.
    ///
    /// Re-defining a name already bound at this exact depth is a no-op.
    pub fn define(&mut self, name: Ident) {
        let depth = self.depth();
        if self.current.get(&name) == Some(&depth) {
            return;
        }
        let prev = self.current.insert(name, depth);
        self.shadow.push(ShadowRecord { name, prev });
    }

    /// Is `name` visible in the current or any enclosing scope?
    #[inline]
    pub fn is_defined(&self, name: Ident) -> bool {
        self.current.contains_key(&name)
    }

    /// Buffer a parameter name for the upcoming body scope
    pub fn push_pending_param(&mut self, name: Ident) {
        self.pending_params.push(name);
    }

    /// Discard buffered parameters (declaration header failed to parse)
    pub fn clear_pending_params(&mut self) {
        self.pending_params.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchc_util::IdentPool;

    fn idents(names: &[&str]) -> (IdentPool, Vec<Ident>) {
        let mut pool = IdentPool::new();
        let ids = names.iter().map(|n| pool.get_or_add(n)).collect();
        (pool, ids)
    }

    #[test]
    fn test_define_and_lookup() {
        let (_, ids) = idents(&["x", "y"]);
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.define(ids[0]);

        assert!(scopes.is_defined(ids[0]));
        assert!(!scopes.is_defined(ids[1]));
    }

    #[test]
    fn test_inner_scope_sees_outer() {
        let (_, ids) = idents(&["x"]);
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.define(ids[0]);
        scopes.enter_scope();
        assert!(scopes.is_defined(ids[0]));
        scopes.leave_scope();
        assert!(scopes.is_defined(ids[0]));
    }

    #[test]
    fn test_leave_scope_removes_locals() {
        let (_, ids) = idents(&["x"]);
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.enter_scope();
        scopes.define(ids[0]);
        assert!(scopes.is_defined(ids[0]));
        scopes.leave_scope();
        assert!(!scopes.is_defined(ids[0]));
    }

    #[test]
    fn test_shadowing_restores_previous_depth() {
        let (_, ids) = idents(&["x"]);
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.define(ids[0]);
        scopes.enter_scope();
        scopes.define(ids[0]); // shadows the outer x
        assert!(scopes.is_defined(ids[0]));
        scopes.leave_scope();
        // outer binding survives
        assert!(scopes.is_defined(ids[0]));
        scopes.leave_scope();
        assert!(!scopes.is_defined(ids[0]));
    }

    #[test]
    fn test_redefine_same_depth_is_noop() {
        let (_, ids) = idents(&["x"]);
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.define(ids[0]);
        scopes.define(ids[0]);
        scopes.leave_scope();
        assert!(!scopes.is_defined(ids[0]));
    }

    #[test]
    fn test_pending_params_drain_into_next_scope() {
        let (_, ids) = idents(&["a", "b"]);
        let mut scopes = ScopeStack::new();
        scopes.push_pending_param(ids[0]);
        scopes.push_pending_param(ids[1]);
        assert!(!scopes.is_defined(ids[0]));

        scopes.enter_scope();
        assert!(scopes.is_defined(ids[0]));
        assert!(scopes.is_defined(ids[1]));

        scopes.leave_scope();
        assert!(!scopes.is_defined(ids[0]));
    }

    #[test]
    fn test_clear_pending_params() {
        let (_, ids) = idents(&["a"]);
        let mut scopes = ScopeStack::new();
        scopes.push_pending_param(ids[0]);
        scopes.clear_pending_params();
        scopes.enter_scope();
        assert!(!scopes.is_defined(ids[0]));
    }
}
