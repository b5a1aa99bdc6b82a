//! Lifecycle entry points: the three hooks driven by the ORM's save and
//! destroy events.
//!
//! A [`Lifecycle`] borrows a backend and a read-only
//! [`Registry`](crate::registry::Registry) and exposes `after_create`,
//! `after_update`, and `after_destroy`. The persistence layer calls these
//! synchronously, inline with the record's save/destroy; only the final
//! storage mutation is deferred, onto the supplied
//! [`TransactionScope`](crate::txn::TransactionScope).
//!
//! The events are mutually exclusive per save and fully determine what
//! fires:
//!
//! | event   | condition per spec                 | effect                          |
//! |---------|------------------------------------|---------------------------------|
//! | create  | always                             | +1 at the current target        |
//! | destroy | always                             | -1 at the current target        |
//! | update  | first-level foreign key changed    | +1 new target, -1 old target    |
//! | update  | first-level foreign key unchanged  | nothing, whatever else changed  |
//!
//! Specs are evaluated in registration order, independently: a failing
//! dynamic column resolver aborts its own update but every other spec still
//! runs, and the first such failure is reported once all specs have fired.
//! Configuration errors are fatal and abort immediately.

use crate::backend::Backend;
use crate::dispatch::{self, Direction};
use crate::error::{CounterCacheError, Result};
use crate::registry::{CounterSpec, Registry};
use crate::txn::TransactionScope;

/// The create/update/destroy entry points for one backend + registry pair.
pub struct Lifecycle<'a, B: Backend> {
    backend: &'a B,
    registry: &'a Registry<B>,
}

impl<'a, B: Backend> Lifecycle<'a, B> {
    /// Binds the hooks to a backend and a fully configured registry.
    pub fn new(backend: &'a B, registry: &'a Registry<B>) -> Self {
        Lifecycle { backend, registry }
    }

    /// Fires after a record is created: every spec for its type increments
    /// its current target.
    pub fn after_create(&self, record: &B::Record, txn: &TransactionScope<B::Id>) -> Result<()> {
        self.fire_all(record, txn, Direction::Increment)
    }

    /// Fires after a record is destroyed: every spec for its type decrements
    /// its current target.
    pub fn after_destroy(&self, record: &B::Record, txn: &TransactionScope<B::Id>) -> Result<()> {
        self.fire_all(record, txn, Direction::Decrement)
    }

    /// Fires after a record is updated.
    ///
    /// Each spec looks only at its first-level foreign key. Unchanged means
    /// skip; changes to any other field are irrelevant. Changed means two
    /// independent, order-insensitive applies: increment the new target
    /// (current resolution) and decrement the old one (previous resolution).
    pub fn after_update(&self, record: &B::Record, txn: &TransactionScope<B::Id>) -> Result<()> {
        let entity = self.backend.entity_type(record);
        let mut column_failure = None;

        for spec in self.registry.specs_for(entity) {
            let key = spec.first_foreign_key();
            let current = self.backend.foreign_key(record, key);
            let previous = self.backend.previous_foreign_key(record, key);
            if current == previous {
                continue;
            }

            self.fire_one(record, txn, spec, Direction::Increment, true, &mut column_failure)?;
            self.fire_one(record, txn, spec, Direction::Decrement, false, &mut column_failure)?;
        }

        match column_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fire_all(
        &self,
        record: &B::Record,
        txn: &TransactionScope<B::Id>,
        direction: Direction,
    ) -> Result<()> {
        let entity = self.backend.entity_type(record);
        let mut column_failure = None;

        for spec in self.registry.specs_for(entity) {
            self.fire_one(record, txn, spec, direction, true, &mut column_failure)?;
        }

        match column_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Runs one apply, stashing column-resolver failures instead of
    /// propagating them so the remaining specs still fire.
    fn fire_one(
        &self,
        record: &B::Record,
        txn: &TransactionScope<B::Id>,
        spec: &CounterSpec<B>,
        direction: Direction,
        use_current: bool,
        column_failure: &mut Option<CounterCacheError>,
    ) -> Result<()> {
        match dispatch::apply(self.backend, txn, record, spec, direction, use_current) {
            Ok(()) => Ok(()),
            Err(err @ CounterCacheError::ColumnResolver { .. }) => {
                column_failure.get_or_insert(err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
