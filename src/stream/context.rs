//! Per-request remote execution contexts with scoped release.
//!
//! Every stage that talks to a remote provider acquires an
//! [`ExecutionContext`] from the shared [`ContextRegistry`].  The context owns
//! the open stream handle and a small per-context scratch cache.  Dropping
//! the context releases it exactly once, whether the stage succeeded or
//! failed or the request future itself was dropped:
//!
//! 1. the stream handle is closed (dropped),
//! 2. the scratch cache is cleared,
//! 3. the context is removed from the registry.
//!
//! Contexts are never shared between requests; each has its own UUID.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

// ---------------------------------------------------------------------------
// ContextRegistry
// ---------------------------------------------------------------------------

/// Snapshot of registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    pub live: usize,
    pub acquired: u64,
    pub released: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    live: Mutex<HashMap<Uuid, &'static str>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Hands out [`ExecutionContext`]s and tracks which ones are still alive.
///
/// Cheap to clone; all clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    inner: Arc<RegistryInner>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a fresh context for `stage` (e.g. `"translation"`).
    pub fn acquire<S>(&self, stage: &'static str) -> ExecutionContext<S> {
        let id = Uuid::new_v4();
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, stage);
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        log::debug!("context {id} ({stage}) acquired");

        ExecutionContext {
            id,
            stage,
            stream: None,
            scratch: HashMap::new(),
            registry: self.clone(),
        }
    }

    /// Number of contexts acquired but not yet released.
    pub fn live(&self) -> usize {
        self.inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            live: self.live(),
            acquired: self.inner.acquired.load(Ordering::SeqCst),
            released: self.inner.released.load(Ordering::SeqCst),
        }
    }

    fn release(&self, id: Uuid, stage: &'static str) {
        let removed = self
            .inner
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if removed.is_some() {
            self.inner.released.fetch_add(1, Ordering::SeqCst);
            log::debug!("context {id} ({stage}) released");
        } else {
            log::warn!("context {id} ({stage}) released twice");
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// One stage's remote execution context.  Released on drop.
pub struct ExecutionContext<S> {
    id: Uuid,
    stage: &'static str,
    stream: Option<S>,
    scratch: HashMap<&'static str, String>,
    registry: ContextRegistry,
}

impl<S> ExecutionContext<S> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Hand the open stream to the context; it is closed when the context is
    /// released.  Replaces (and closes) any previously attached stream.
    pub fn attach(&mut self, stream: S) -> &mut S {
        self.stream.insert(stream)
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Record a diagnostic value in the per-context cache.
    pub fn note(&mut self, key: &'static str, value: impl Into<String>) {
        self.scratch.insert(key, value.into());
    }

    pub fn scratch(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).map(String::as_str)
    }
}

impl<S> Drop for ExecutionContext<S> {
    fn drop(&mut self) {
        drop(self.stream.take());
        self.scratch.clear();
        self.registry.release(self.id, self.stage);
    }
}

impl<S> std::fmt::Debug for ExecutionContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("has_stream", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Flags itself as closed when dropped.
    struct Handle(Arc<AtomicBool>);

    impl Drop for Handle {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_releases_exactly_once() {
        let registry = ContextRegistry::new();
        {
            let _ctx: ExecutionContext<()> = registry.acquire("synthesis");
            assert_eq!(registry.live(), 1);
        }
        assert_eq!(
            registry.stats(),
            ContextStats {
                live: 0,
                acquired: 1,
                released: 1
            }
        );
    }

    #[test]
    fn drop_closes_attached_stream() {
        let registry = ContextRegistry::new();
        let closed = Arc::new(AtomicBool::new(false));

        let mut ctx = registry.acquire("translation");
        ctx.attach(Handle(Arc::clone(&closed)));
        assert!(ctx.has_stream());
        assert!(!closed.load(Ordering::SeqCst));

        drop(ctx);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn contexts_get_unique_ids() {
        let registry = ContextRegistry::new();
        let a: ExecutionContext<()> = registry.acquire("a");
        let b: ExecutionContext<()> = registry.acquire("a");
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.live(), 2);
    }

    #[test]
    fn scratch_is_per_context() {
        let registry = ContextRegistry::new();
        let mut a: ExecutionContext<()> = registry.acquire("a");
        let b: ExecutionContext<()> = registry.acquire("b");
        a.note("transcript", "hello");
        assert_eq!(a.scratch("transcript"), Some("hello"));
        assert_eq!(b.scratch("transcript"), None);
    }

    #[test]
    fn release_on_panic_unwind() {
        let registry = ContextRegistry::new();
        let r = registry.clone();
        let result = std::panic::catch_unwind(move || {
            let _ctx: ExecutionContext<()> = r.acquire("boom");
            panic!("stage failed");
        });
        assert!(result.is_err());
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.stats().released, 1);
    }
}
