//! Invariant checking for deterministic network simulation.
//!
//! Invariants are properties that must always hold during a
//! [`SimNetwork`](crate::SimNetwork) run, as opposed to scenario tests
//! which check one specific sequence of events. The registry extracts a
//! [`NetworkSnapshot`] after each step and runs every registered
//! [`Invariant`] against it; a violation panics with context.

mod checks;
mod snapshot;

pub use checks::{
    DirectSubscribersHaveAnInterface, IndirectSubscribersHaveANextHop, SelfReachabilityNeverClears,
};
pub use snapshot::{NetworkSnapshot, NodeSnapshot, SubscriberSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property that must hold across every execution of a [`SimNetwork`].
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &NetworkSnapshot) -> InvariantResult;
}

/// Registry of invariants to check together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with the standard subscriber-consistency invariants.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SelfReachabilityNeverClears);
        registry.add(DirectSubscribersHaveAnInterface);
        registry.add(IndirectSubscribersHaveANextHop);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check every invariant, collecting all violations.
    pub fn check_all(&self, state: &NetworkSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check every invariant, panicking on the first set of violations.
    pub fn assert_all(&self, state: &NetworkSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// `true` if no invariants are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        let snapshot = NetworkSnapshot::default();
        assert!(registry.check_all(&snapshot).is_ok());
    }
}
