// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered fallback chains
//!
//! Several stages try a list of strategies in priority order and keep the
//! first one that produces a result. `Attempts` makes that order explicit
//! and reports which strategy won.

/// Ordered list of named strategies; the first `Some` wins
pub struct Attempts<'a, T> {
    steps: Vec<(&'static str, Box<dyn FnOnce() -> Option<T> + 'a>)>,
}

impl<'a, T> Attempts<'a, T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a strategy to the end of the chain
    pub fn then(mut self, name: &'static str, step: impl FnOnce() -> Option<T> + 'a) -> Self {
        self.steps.push((name, Box::new(step)));
        self
    }

    /// Run strategies in order, stopping at the first success
    pub fn run(self) -> Option<(&'static str, T)> {
        for (name, step) in self.steps {
            if let Some(result) = step() {
                tracing::trace!(strategy = name, "attempt succeeded");
                return Some((name, result));
            }
        }
        None
    }

    /// Like [`Attempts::run`], discarding the strategy name
    pub fn first(self) -> Option<T> {
        self.run().map(|(_, result)| result)
    }
}

impl<T> Default for Attempts<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
