//! Reentrancy guard around the pool's mutating entry points.

use crate::error::PoolError;
use std::cell::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Busy,
}

/// `Idle -> Busy -> Idle`. Entering while `Busy` fails.
#[derive(Debug)]
pub struct ReentrancyGuard {
    state: Cell<GuardState>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self {
            state: Cell::new(GuardState::Idle),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.get()
    }

    /// Mark the pool busy until the returned token is dropped.
    pub fn enter(&self) -> Result<Entered<'_>, PoolError> {
        match self.state.get() {
            GuardState::Busy => Err(PoolError::Reentrant),
            GuardState::Idle => {
                self.state.set(GuardState::Busy);
                Ok(Entered { guard: self })
            }
        }
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the duration of one entry point.
#[must_use]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.state.set(GuardState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_rejected_until_first_drops() {
        let guard = ReentrancyGuard::new();
        let first = guard.enter().unwrap();
        assert_eq!(guard.state(), GuardState::Busy);
        assert!(matches!(guard.enter(), Err(PoolError::Reentrant)));
        drop(first);
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.enter().is_ok());
    }
}
