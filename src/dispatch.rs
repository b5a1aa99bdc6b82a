//! Turns one (record, spec, direction) triple into a pending update.
//!
//! [`apply`] is the single funnel every lifecycle event goes through: it
//! resolves the target id, runs the foreign-key override, evaluates the
//! column strategy against the triggering record's in-flight state, and
//! enqueues the resulting [`PendingUpdate`](crate::txn::PendingUpdate) on
//! the transaction scope. The actual storage mutation happens later, at
//! commit time.

use crate::backend::Backend;
use crate::error::Result;
use crate::registry::CounterSpec;
use crate::resolver;
use crate::txn::{PendingUpdate, TransactionScope};

/// Which way a counter moves for an event.
///
/// # Examples
///
/// ```rust
/// use conteggio::Direction;
///
/// assert_eq!(Direction::Increment.delta(), 1);
/// assert_eq!(Direction::Decrement.delta(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The counter gains one (create, or update's new target).
    Increment,
    /// The counter loses one (destroy, or update's old target).
    Decrement,
}

impl Direction {
    /// The signed delta this direction applies.
    pub const fn delta(self) -> i64 {
        match self {
            Direction::Increment => 1,
            Direction::Decrement => -1,
        }
    }
}

/// Computes the effective target and column for one spec and enqueues the
/// counter mutation.
///
/// `use_current` selects current-state resolution (create, destroy, and the
/// incrementing half of an update) versus previous-state resolution (the
/// decrementing half of an update).
///
/// The spec's foreign-key override, when present, runs unconditionally,
/// even on an unresolved (`None`) base id, and its output is final. An
/// unresolved final id makes the whole apply a silent no-op; that is
/// expected for orphaned or optional associations.
///
/// # Errors
///
/// [`UnknownAssociation`](crate::CounterCacheError::UnknownAssociation) if a
/// hop fails to resolve at the type level (fatal, should have been caught at
/// registration) and [`ColumnResolver`](crate::CounterCacheError::ColumnResolver)
/// if a dynamic column strategy fails; the latter aborts only this apply and
/// enqueues nothing.
pub fn apply<B: Backend>(
    backend: &B,
    txn: &TransactionScope<B::Id>,
    record: &B::Record,
    spec: &CounterSpec<B>,
    direction: Direction,
    use_current: bool,
) -> Result<()> {
    let base = if use_current {
        resolver::resolve_current(backend, spec.owner(), record, spec.path())?
    } else {
        resolver::resolve_previous(backend, spec.owner(), record, spec.path())?
    };

    let id = match spec.foreign_key_override() {
        Some(f) => f(base),
        None => base,
    };
    let Some(id) = id else {
        return Ok(());
    };

    // Column name is captured now, from the triggering record, not at commit.
    let column = spec.resolve_column(record)?;

    txn.push(PendingUpdate {
        target: spec.target(),
        id,
        column,
        delta: direction.delta(),
    });
    Ok(())
}
