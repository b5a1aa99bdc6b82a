//! Transaction-scoped queue of deferred counter updates.
//!
//! Counter mutations never hit storage the moment a lifecycle event fires.
//! Each one becomes a [`PendingUpdate`] value object on the enclosing
//! transaction's [`TransactionScope`], and the whole queue is flushed
//! through the backend's atomic adjust only when the outermost transaction
//! commits. A rollback discards the queue unapplied.
//!
//! # Scope lifetime
//!
//! The persistence layer creates one scope per outermost transaction and
//! wires its own commit/rollback callbacks to [`TransactionScope::commit`]
//! and [`TransactionScope::rollback`]. Nested transactions (a save inside a
//! transaction already in flight) call [`TransactionScope::enter`]; their
//! commits are counted down and only the outermost one flushes. Whatever the
//! nesting, the queue is applied at most once: a `settled` flag is swapped
//! atomically before the flush starts.
//!
//! Scopes are `Send + Sync`: the queue is mutex-protected and the depth and
//! settled state are atomics, so a scope may be filled on one thread and
//! settled on another. The queue itself is invisible to concurrently running
//! scopes; cross-transaction correctness rests entirely on the storage
//! layer's atomic adjust primitive.

use std::fmt::{self, Debug, Display};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::backend::{Backend, EntityType};
use crate::error::Result;

/// One queued, not-yet-applied counter delta.
///
/// Exists only for the lifetime of its transaction: consumed on commit,
/// discarded on rollback, never persisted. With the `serde` feature the type
/// is `Serialize`, so a scope's pending work can be exported for inspection.
///
/// # Examples
///
/// ```rust
/// use conteggio::{EntityType, PendingUpdate};
///
/// let update = PendingUpdate {
///     target: EntityType::new("post"),
///     id: 5_i64,
///     column: "comments_count".to_string(),
///     delta: 1,
/// };
/// assert_eq!(update.to_string(), "post#5 comments_count +1");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PendingUpdate<Id> {
    /// Entity type of the row holding the counter.
    pub target: EntityType,
    /// Identifier of that row.
    pub id: Id,
    /// The counter column to adjust.
    pub column: String,
    /// Signed amount to add, `+1` or `-1`.
    pub delta: i64,
}

impl<Id: Debug> Display for PendingUpdate<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{:?} {} {:+}",
            self.target, self.id, self.column, self.delta
        )
    }
}

/// Deferred-update queue tied to one outermost transaction.
pub struct TransactionScope<Id> {
    pending: Mutex<Vec<PendingUpdate<Id>>>,
    /// Open transaction levels; the scope itself counts as one.
    depth: AtomicUsize,
    /// Set once the scope has committed or rolled back.
    settled: AtomicBool,
}

impl<Id: Clone> TransactionScope<Id> {
    /// Creates a scope for a freshly opened outermost transaction.
    pub fn new() -> Self {
        TransactionScope {
            pending: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(1),
            settled: AtomicBool::new(false),
        }
    }

    /// Marks entry into a nested transaction level.
    ///
    /// Each `enter` must be paired with one [`commit`](Self::commit) (or be
    /// abandoned by [`rollback`](Self::rollback)).
    pub fn enter(&self) {
        self.depth.fetch_add(1, Ordering::AcqRel);
    }

    /// Enqueues one pending update.
    pub(crate) fn push(&self, update: PendingUpdate<Id>) {
        self.lock_pending().push(update);
    }

    /// Commits one transaction level.
    ///
    /// Nested levels just count down and return `Ok`. The outermost commit
    /// flushes every pending update through [`Backend::adjust`], in queue
    /// order. The flush runs at most once per scope: a second commit, or a
    /// commit after [`rollback`](Self::rollback), is a no-op.
    ///
    /// # Errors
    ///
    /// The first storage error aborts the flush and propagates; no retry is
    /// attempted here, and the scope stays settled so a retried commit will
    /// not double-apply the deltas that already succeeded.
    pub fn commit<B>(&self, backend: &B) -> Result<()>
    where
        B: Backend<Id = Id>,
    {
        // Saturating countdown: surplus commits on a settled scope must not
        // wrap the level counter.
        let level = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1))
            .unwrap_or(0);
        if level > 1 {
            return Ok(());
        }
        if self.settled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let updates: Vec<PendingUpdate<Id>> = self.lock_pending().drain(..).collect();
        for update in updates {
            backend.adjust(update.target, &update.column, &update.id, update.delta)?;
        }
        Ok(())
    }

    /// Discards every pending update, unapplied, and settles the scope.
    ///
    /// A rollback anywhere abandons the whole scope: later commits are
    /// no-ops.
    pub fn rollback(&self) {
        self.settled.store(true, Ordering::Release);
        self.lock_pending().clear();
    }

    /// Returns `true` once the scope has committed or rolled back.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Snapshot of the not-yet-applied updates, in enqueue order.
    pub fn pending(&self) -> Vec<PendingUpdate<Id>> {
        self.lock_pending().clone()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<PendingUpdate<Id>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Id: Clone> Default for TransactionScope<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Debug> fmt::Debug for TransactionScope<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("depth", &self.depth.load(Ordering::Relaxed))
            .field("settled", &self.settled.load(Ordering::Relaxed))
            .field(
                "pending",
                &self.pending.lock().unwrap_or_else(PoisonError::into_inner),
            )
            .finish()
    }
}
