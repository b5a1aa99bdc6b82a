//! The interface between this crate and the surrounding persistence layer.
//!
//! This crate never touches storage, schemas, or record loading directly.
//! Everything it needs from the ORM is expressed by the [`Backend`] trait:
//! association metadata, record loading, foreign-key reads (current and
//! pre-change values), the storage-level atomic adjustment, and lifecycle
//! hook installation.
//!
//! # Design
//!
//! Rust has no runtime reflection, so relation traversal is driven by an
//! explicit association-descriptor lookup ([`Backend::association`]) instead
//! of reflecting over model classes. The lookup is consulted when a counter
//! is registered, which means a typo in a relation path fails at
//! configuration time rather than at some arbitrary later mutation.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use conteggio::{Association, Backend, EntityType, Result};
//!
//! struct MyOrm { /* connection pool, schema, ... */ }
//!
//! impl Backend for MyOrm {
//!     type Record = MyRow;
//!     type Id = i64;
//!
//!     fn entity_type(&self, record: &MyRow) -> EntityType {
//!         record.entity
//!     }
//!
//!     fn association(&self, entity: EntityType, name: &str) -> Option<Association> {
//!         self.schema.belongs_to(entity, name)
//!     }
//!
//!     // ... load, foreign_key, previous_foreign_key, adjust, install_hooks
//! }
//! ```

use std::fmt::{self, Debug, Display};

use crate::error::Result;

/// Identifies an entity type (a model class / table) by its singular,
/// snake_case name.
///
/// The name is also the basis for default counter column names: an entity
/// named `comment` gets the default column `comments_count`.
///
/// # Examples
///
/// ```rust
/// use conteggio::EntityType;
///
/// const COMMENT: EntityType = EntityType::new("comment");
/// assert_eq!(COMMENT.name(), "comment");
/// assert_eq!(COMMENT.to_string(), "comment");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntityType(&'static str);

impl EntityType {
    /// Creates an entity type from its singular name.
    pub const fn new(name: &'static str) -> Self {
        EntityType(name)
    }

    /// Returns the entity's name.
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Descriptor for a named association: which entity type it points at and
/// which foreign-key column holds the reference.
///
/// Returned by [`Backend::association`] and used both to validate relation
/// paths at registration time and to know which foreign key to inspect for
/// "did it change" on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    /// The entity type the association points at.
    pub target: EntityType,
    /// The foreign-key column on the *owning* record that holds the
    /// target's identifier.
    pub foreign_key: &'static str,
}

/// Capabilities this crate consumes from the persistence layer.
///
/// Implemented once per ORM integration. All counter-cache machinery (the
/// registry, the relation resolver, the dispatcher, and the lifecycle
/// hooks) is generic over a `Backend`.
///
/// # Contract
///
/// - [`association`](Backend::association) returns `None` only for
///   undeclared names; the crate turns that into a fatal configuration
///   error.
/// - [`previous_foreign_key`](Backend::previous_foreign_key) returns the
///   value a foreign key had *before* the change currently in flight. It is
///   well defined during an update event; when no change to that key is in
///   flight it must equal [`foreign_key`](Backend::foreign_key); that
///   equality is how the hooks decide a key is unchanged.
/// - [`adjust`](Backend::adjust) must be atomic at the storage level
///   (`UPDATE ... SET col = col + delta` or equivalent), never a
///   read-modify-write in application code. This crate never reads a
///   counter value before mutating it.
pub trait Backend {
    /// A loaded record of any entity type known to this backend.
    type Record;

    /// Identifier type for records (and foreign-key values).
    type Id: Clone + PartialEq + Debug;

    /// Returns the entity type of a loaded record.
    fn entity_type(&self, record: &Self::Record) -> EntityType;

    /// Looks up a declared association on `entity`, or `None` if `name` is
    /// not an association of that type.
    fn association(&self, entity: EntityType, name: &str) -> Option<Association>;

    /// Loads a record by id, or `None` if it does not exist.
    fn load(&self, entity: EntityType, id: &Self::Id) -> Option<Self::Record>;

    /// Returns the current value of a foreign-key column on `record`, or
    /// `None` if the key is null.
    fn foreign_key(&self, record: &Self::Record, foreign_key: &str) -> Option<Self::Id>;

    /// Returns the value `foreign_key` had before the change currently in
    /// flight, or `None` if it was null. Equals the current value when the
    /// key is not being changed.
    fn previous_foreign_key(&self, record: &Self::Record, foreign_key: &str) -> Option<Self::Id>;

    /// Atomically adds `delta` to `column` on the `target` row identified by
    /// `id`. Called only from the commit flush of a
    /// [`TransactionScope`](crate::txn::TransactionScope).
    fn adjust(&self, target: EntityType, column: &str, id: &Self::Id, delta: i64) -> Result<()>;

    /// Installs the create/update/destroy lifecycle callbacks for `entity`,
    /// wiring the ORM's save events to a
    /// [`Lifecycle`](crate::hooks::Lifecycle). Called exactly once per
    /// entity type, on its first counter registration.
    fn install_hooks(&self, entity: EntityType);
}
