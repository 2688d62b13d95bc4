use std::collections::HashMap;

use log::{debug, warn};

use crate::host::task::Cancellable;

/// Opaque handle naming one collection in a [`LifecycleRegistry`].
///
/// Tokens are interned per registry; clears take tokens rather than
/// free-form strings, so a typo cannot silently create an orphaned
/// collection that is never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeToken(usize);

impl ScopeToken {
    /// The default, unnamed collection every registry starts with.
    pub const DEFAULT: ScopeToken = ScopeToken(0);
}

/// Named collections of cancellable subscriptions and tasks, scoped to one
/// session or screen. Clearing a collection cancels every member exactly
/// once; a cleared collection is empty and reusable under the same token.
pub struct LifecycleRegistry {
    names: HashMap<String, ScopeToken>,
    collections: Vec<Vec<Box<dyn Cancellable>>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
            collections: vec![Vec::new()],
        }
    }

    /// Intern a named collection, creating it if absent. The same name
    /// always yields the same token.
    pub fn scope(&mut self, name: &str) -> ScopeToken {
        if let Some(token) = self.names.get(name) {
            return *token;
        }
        let token = ScopeToken(self.collections.len());
        self.collections.push(Vec::new());
        self.names.insert(name.to_string(), token);
        token
    }

    /// Register a cancellable unit into a collection.
    pub fn add(&mut self, scope: ScopeToken, unit: impl Cancellable + 'static) {
        match self.collections.get_mut(scope.0) {
            Some(collection) => collection.push(Box::new(unit)),
            None => warn!("ignoring add to unknown scope token {:?}", scope),
        }
    }

    /// Register into the default collection.
    pub fn add_default(&mut self, unit: impl Cancellable + 'static) {
        self.add(ScopeToken::DEFAULT, unit);
    }

    /// Cancel and remove every member of one collection; other collections
    /// are untouched.
    pub fn clear(&mut self, scope: ScopeToken) {
        let Some(collection) = self.collections.get_mut(scope.0) else {
            warn!("ignoring clear of unknown scope token {:?}", scope);
            return;
        };
        let drained = std::mem::take(collection);
        if !drained.is_empty() {
            debug!("clearing scope {:?}: {} members", scope, drained.len());
        }
        for unit in drained {
            unit.cancel();
        }
    }

    /// Cancel and remove every collection, the default one included.
    pub fn clear_all(&mut self) {
        for index in 0..self.collections.len() {
            self.clear(ScopeToken(index));
        }
    }

    /// Number of live members in a collection.
    pub fn len(&self, scope: ScopeToken) -> usize {
        self.collections.get(scope.0).map_or(0, |c| c.len())
    }

    pub fn is_empty(&self, scope: ScopeToken) -> bool {
        self.len(scope) == 0
    }
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
