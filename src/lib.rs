//! # Conteggio - Transactional Counter Caches
//!
//! A Rust library that keeps denormalized aggregate counters ("number of
//! children currently referencing this parent") consistent as child records
//! are created, updated, or destroyed. No database triggers, no manual
//! counter bookkeeping by callers.
//!
//! ## The Problem
//!
//! Showing "Post #5, 37 comments" with a live `COUNT(*)` query is expensive
//! and gets worse with every row. The usual fix is a denormalized column
//! (`posts.comments_count`), but hand-maintained counters drift: someone
//! forgets the decrement on destroy, or updates the counter outside the
//! transaction that created the child, and a rollback leaves it permanently
//! wrong.
//!
//! ## The Solution
//!
//! Declare each counter once (which entity owns it, which relation path
//! leads to the record holding the column) and let the lifecycle hooks do
//! the rest:
//!
//! 1. **Declarative registry**: a [`Registry`] maps entity types to ordered
//!    lists of counter specs. Relation paths are validated against the ORM's
//!    association metadata at registration, so a typo fails at startup, not
//!    during some save three weeks later.
//! 2. **Relation-path resolution**: the [`resolver`] walks one or more
//!    association hops from the triggering record to the id of the counter
//!    row, including resolving the *previous* target when a foreign key is
//!    being moved. Missing links are routine no-ops, never errors.
//! 3. **Transactional deferral**: mutations are queued as
//!    [`PendingUpdate`] value objects on a [`TransactionScope`] and flushed
//!    through the storage layer's atomic increment/decrement only when the
//!    outermost transaction commits: exactly once, even across nested
//!    transactions. A rollback discards the queue untouched.
//!
//! This crate never reads a counter before writing it and never talks to
//! storage directly: everything goes through the [`Backend`] trait the
//! surrounding persistence layer implements.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conteggio::{CounterOptions, EntityType, Lifecycle, Registry, TransactionScope};
//!
//! const COMMENT: EntityType = EntityType::new("comment");
//!
//! // Startup configuration: Comment keeps Post#comments_count in sync.
//! let mut registry = Registry::new();
//! registry.register(&orm, COMMENT, &["post"], CounterOptions::new())?;
//!
//! // Per save, inside the ORM's transaction machinery:
//! let hooks = Lifecycle::new(&orm, &registry);
//! let txn = TransactionScope::new();
//! hooks.after_create(&comment, &txn)?;   // queues post#5 comments_count +1
//! txn.commit(&orm)?;                     // applies it, atomically, once
//! ```
//!
//! Creating a comment with `post_id = 5` increments `Post#5.comments_count`;
//! moving it to `post_id = 7` decrements `Post#5` and increments `Post#7`;
//! destroying it decrements `Post#7`. Updates that leave the foreign key
//! alone touch nothing, no matter what else changed.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`backend`] | [`Backend`] trait, [`EntityType`], [`Association`]: the ORM-facing interface |
//! | [`registry`] | [`Registry`], [`CounterSpec`], [`CounterOptions`]: counter declarations |
//! | [`resolver`] | current/previous relation-path resolution |
//! | [`dispatch`] | [`Direction`] and the per-spec apply funnel |
//! | [`txn`] | [`TransactionScope`], [`PendingUpdate`]: the deferred-commit queue |
//! | [`hooks`] | [`Lifecycle`]: the create/update/destroy entry points |
//! | [`error`] | [`CounterCacheError`] and the crate [`Result`] |
//!
//! ## Consistency Model
//!
//! Each logical save runs inside a transaction supplied by the persistence
//! layer; this crate only registers deferred work against it. Concurrent
//! transactions may target the same counter row; correctness there rests on
//! the backend's [`adjust`](Backend::adjust) being atomic at the storage
//! level (`SET col = col + delta`), which is why this crate never does a
//! read-modify-write. Queues are transaction-scoped and invisible to
//! concurrent transactions.
//!
//! ## What this crate does not do
//!
//! It does not recompute counters from scratch (no reconciliation or
//! backfill), does not offer cross-machine eventual-consistency guarantees,
//! and does not implement the atomic storage increment itself; it only
//! invokes it correctly.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | `Serialize` on [`PendingUpdate`] and [`EntityType`], for exporting a scope's pending work |

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod resolver;
pub mod txn;

#[cfg(test)]
mod test_backend;

pub use backend::{Association, Backend, EntityType};
pub use dispatch::Direction;
pub use error::{BoxError, CounterCacheError, Result};
pub use hooks::Lifecycle;
pub use registry::{ColumnSource, CounterOptions, CounterSpec, Registry};
pub use txn::{PendingUpdate, TransactionScope};
