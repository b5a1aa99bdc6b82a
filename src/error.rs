//! Unified error type for counter-cache operations.
//!
//! This module provides a single [`CounterCacheError`] enum covering the two
//! very different failure classes in this crate:
//!
//! - **Configuration errors** ([`UnknownAssociation`](CounterCacheError::UnknownAssociation),
//!   [`EmptyRelationPath`](CounterCacheError::EmptyRelationPath)) indicate a
//!   programming mistake in a counter declaration. They are fatal and surface
//!   immediately; they must never be swallowed.
//! - **Runtime errors** ([`ColumnResolver`](CounterCacheError::ColumnResolver),
//!   [`Storage`](CounterCacheError::Storage)) affect a single counter update
//!   or the commit flush. A failing column resolver aborts only its own
//!   update; storage errors propagate unretried to whoever drives the commit.
//!
//! Note that an *unresolvable target* (a relation path hop yielding no
//! related record) is not an error at all. It is routine (orphaned or
//! optional associations) and simply makes the affected update a no-op.

use thiserror::Error;

/// Boxed error used as the source of dynamic failures (column resolvers,
/// storage adjustments).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for all counter-cache operations.
#[derive(Debug, Error)]
pub enum CounterCacheError {
    /// A relation path component does not name a declared association on the
    /// expected entity type. Fatal configuration error.
    #[error("no association `{relation}` declared on entity `{entity}`")]
    UnknownAssociation {
        /// Name of the entity type the lookup was performed on.
        entity: &'static str,
        /// The association name that failed to resolve.
        relation: &'static str,
    },

    /// A counter was registered with a zero-length relation path. Fatal
    /// configuration error.
    #[error("empty relation path registered for entity `{entity}`")]
    EmptyRelationPath {
        /// Name of the entity type the registration was for.
        entity: &'static str,
    },

    /// A dynamic column-name resolver failed. Aborts the single update it
    /// was computing a column for; other counter specs are unaffected.
    #[error("column resolver failed for entity `{entity}`: {source}")]
    ColumnResolver {
        /// Name of the entity type whose spec carried the resolver.
        entity: &'static str,
        /// The resolver's own error.
        #[source]
        source: BoxError,
    },

    /// A storage-level atomic adjustment failed during the commit flush.
    /// Propagated to the caller of the flush; this crate does not retry.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
}

impl CounterCacheError {
    /// Wraps an arbitrary storage-layer error.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        CounterCacheError::Storage(err.into())
    }
}

/// Result type for counter-cache operations.
pub type Result<T> = std::result::Result<T, CounterCacheError>;
