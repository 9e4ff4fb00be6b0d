//! Memoized resolution cells
//!
//! A [`Memo`] moves from unresolved to resolved/failed exactly once. Cells
//! that can depend on each other share a [`ResolutionScope`]: first-time
//! resolution of any cell in the scope happens under the scope's re-entrant
//! lock, and the scope tracks which cells are currently being resolved so a
//! cell that is asked for itself while resolving reports a cycle instead of
//! recursing forever.
//!
//! Reads of an already resolved cell never take the lock.

use crate::error::{ConfigError, ConfigResult};
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_MEMO_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug)]
struct Frame {
    id: usize,
    name: String,
}

/// Lock and in-progress stack shared by cells that may depend on each other
#[derive(Debug, Default)]
pub struct ResolutionScope {
    active: ReentrantMutex<RefCell<Vec<Frame>>>,
}

impl ResolutionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the cells currently being resolved on this scope, outermost
    /// first. Only meaningful from inside a resolution.
    pub fn in_progress(&self) -> Vec<String> {
        let active = self.active.lock();
        let frames = active.borrow();
        frames.iter().map(|frame| frame.name.clone()).collect()
    }
}

/// Pops the frame pushed for a resolution, also when the resolver panics
struct FrameGuard<'a> {
    frames: &'a RefCell<Vec<Frame>>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.frames.borrow_mut().pop();
    }
}

/// A value computed at most once
#[derive(Debug)]
pub struct Memo<T> {
    id: usize,
    name: String,
    outcome: OnceCell<ConfigResult<T>>,
}

impl<T: Clone> Memo<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_MEMO_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            outcome: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cached outcome, if resolution already happened
    pub fn get(&self) -> Option<&ConfigResult<T>> {
        self.outcome.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Return the cached outcome, running `resolve` first if this is the
    /// first access.
    ///
    /// `resolve` runs at most once per cell, even under concurrent first
    /// access. A cell re-entered from its own resolver yields
    /// [`ConfigError::CyclicDefault`]; that error is returned to the
    /// re-entering caller and the outer resolution decides what to cache.
    pub fn get_or_resolve<F>(&self, scope: &ResolutionScope, resolve: F) -> ConfigResult<T>
    where
        F: FnOnce() -> ConfigResult<T>,
    {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        let active = scope.active.lock();

        // another thread may have finished while we waited for the lock
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        {
            let mut frames = active.borrow_mut();
            if let Some(start) = frames.iter().position(|frame| frame.id == self.id) {
                let mut chain: Vec<String> =
                    frames[start..].iter().map(|frame| frame.name.clone()).collect();
                chain.push(self.name.clone());
                return Err(ConfigError::CyclicDefault { chain });
            }
            frames.push(Frame {
                id: self.id,
                name: self.name.clone(),
            });
        }

        let outcome = {
            let _frame = FrameGuard { frames: &*active };
            resolve()
        };

        // the scope lock is held, so nothing else can have set the cell
        let _ = self.outcome.set(outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_resolves_once() {
        let scope = ResolutionScope::new();
        let memo = Memo::new("port");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo.get_or_resolve(&scope, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(5222u16)
            });
            assert_eq!(value, Ok(5222));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.is_resolved());
    }

    #[test]
    fn test_failure_is_cached() {
        let scope = ResolutionScope::new();
        let memo: Memo<u16> = Memo::new("port");
        let calls = AtomicUsize::new(0);

        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ConfigError::InvalidValue("nope".to_string()))
        };
        let first = memo.get_or_resolve(&scope, resolve);
        let second = memo.get_or_resolve(&scope, || Ok(1));

        assert_eq!(first, second);
        assert!(first.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let scope = ResolutionScope::new();
        let memo: Memo<String> = Memo::new("a");

        let outcome = memo.get_or_resolve(&scope, || {
            memo.get_or_resolve(&scope, || Ok("unreachable".to_string()))
        });

        assert_eq!(
            outcome,
            Err(ConfigError::CyclicDefault {
                chain: vec!["a".to_string(), "a".to_string()]
            })
        );
        // the outer resolution cached the propagated error
        assert_eq!(memo.get(), Some(&outcome));
    }

    #[test]
    fn test_nested_resolution_is_allowed() {
        let scope = ResolutionScope::new();
        let inner: Memo<String> = Memo::new("xmpp-domain");
        let outer: Memo<String> = Memo::new("conference-muc-jid");

        let value = outer.get_or_resolve(&scope, || {
            assert_eq!(scope.in_progress(), vec!["conference-muc-jid"]);
            let domain = inner.get_or_resolve(&scope, || Ok("example.com".to_string()))?;
            Ok(format!("conference.{}", domain))
        });

        assert_eq!(value, Ok("conference.example.com".to_string()));
        assert!(inner.is_resolved());
        assert!(scope.in_progress().is_empty());
    }
}
