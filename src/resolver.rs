//! Relation-path resolution: from a record to the id of the record holding
//! the counter.
//!
//! Resolution walks the named associations hop by hop. A missing link at any
//! hop (a null foreign key or a dangling reference) short-circuits to
//! `None`, which callers treat as "nothing to update". That is routine
//! behavior, not an error. The only error here is a hop that does not name a
//! declared association at all, which is a fatal configuration mistake.
//!
//! Two flavors exist:
//!
//! - [`resolve_current`] follows the record's current relations. The final
//!   hop's foreign-key value *is* the resolved id; the target row itself is
//!   never loaded.
//! - [`resolve_previous`] is used only on update. It starts from the
//!   *previous* value of the first-level foreign key (the value before the
//!   change in flight), loads that record, then continues through the
//!   remaining hops using current relations.

use crate::backend::{Association, Backend, EntityType};
use crate::error::{CounterCacheError, Result};

/// Resolves the current counter target of `record` along `path`.
///
/// Returns `Ok(None)` as soon as any hop yields no related record.
pub fn resolve_current<B: Backend>(
    backend: &B,
    entity: EntityType,
    record: &B::Record,
    path: &[&'static str],
) -> Result<Option<B::Id>> {
    let mut owner = entity;
    let mut held: Option<B::Record> = None;
    let last = path.len().saturating_sub(1);

    for (hop, name) in path.iter().enumerate() {
        let assoc = lookup(backend, owner, *name)?;
        let at: &B::Record = held.as_ref().unwrap_or(record);
        let Some(id) = backend.foreign_key(at, assoc.foreign_key) else {
            return Ok(None);
        };
        if hop == last {
            return Ok(Some(id));
        }
        // Intermediate hop: the related record must exist to keep walking.
        let Some(next) = backend.load(assoc.target, &id) else {
            return Ok(None);
        };
        held = Some(next);
        owner = assoc.target;
    }

    // Empty paths are rejected at registration; nothing to resolve here.
    Ok(None)
}

/// Resolves the counter target `record` pointed at *before* the in-flight
/// change to the first-level foreign key.
///
/// The previous value of `path[0]`'s foreign key selects the first-level
/// record; the remaining hops are then walked through current relations from
/// it. Returns `Ok(None)` if the previous key was null or the record it
/// named no longer exists.
pub fn resolve_previous<B: Backend>(
    backend: &B,
    entity: EntityType,
    record: &B::Record,
    path: &[&'static str],
) -> Result<Option<B::Id>> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(None);
    };

    let assoc = lookup(backend, entity, *first)?;
    let Some(previous) = backend.previous_foreign_key(record, assoc.foreign_key) else {
        return Ok(None);
    };

    // Unlike current resolution, the first-level record is always loaded: a
    // previous target that has since been deleted must not be decremented.
    let Some(loaded) = backend.load(assoc.target, &previous) else {
        return Ok(None);
    };
    if rest.is_empty() {
        return Ok(Some(previous));
    }
    resolve_current(backend, assoc.target, &loaded, rest)
}

fn lookup<B: Backend>(backend: &B, entity: EntityType, name: &'static str) -> Result<Association> {
    backend
        .association(entity, name)
        .ok_or(CounterCacheError::UnknownAssociation {
            entity: entity.name(),
            relation: name,
        })
}
