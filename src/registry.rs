//! Counter declarations and the per-entity-type configuration registry.
//!
//! A [`CounterSpec`] describes one declared counter: the relation path from
//! the owning entity to the record holding the counter column, how to obtain
//! the column name, and an optional foreign-key override. Specs are collected
//! in a [`Registry`], keyed by entity type, in registration order.
//!
//! The registry is built once during startup configuration and treated as
//! read-only afterwards. It is injected into the
//! [`Lifecycle`](crate::hooks::Lifecycle) hooks rather than living in
//! ambient global state, so tests and multi-tenant setups can carry several
//! registries side by side.
//!
//! # Declaring counters
//!
//! ```rust,ignore
//! use conteggio::{CounterOptions, EntityType, Registry};
//!
//! const COMMENT: EntityType = EntityType::new("comment");
//!
//! let mut registry = Registry::new();
//!
//! // Post#comments_count, via the default column name.
//! registry.register(&orm, COMMENT, &["post"], CounterOptions::new())?;
//!
//! // Author#authored_comments_count, two hops away.
//! registry.register(
//!     &orm,
//!     COMMENT,
//!     &["post", "author"],
//!     CounterOptions::new().with_column("authored_comments_count"),
//! )?;
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::backend::{Backend, EntityType};
use crate::error::{BoxError, CounterCacheError, Result};

/// Dynamic column-name strategy: maps the record that triggered the event to
/// a column name, evaluated at mutation time.
pub type ColumnFn<R> = Box<dyn Fn(&R) -> std::result::Result<String, BoxError> + Send + Sync>;

/// Foreign-key override strategy: maps the resolved target id to the final
/// id. Invoked unconditionally when configured, even on `None`.
pub type ForeignKeyFn<Id> = Box<dyn Fn(Option<Id>) -> Option<Id> + Send + Sync>;

/// How a spec obtains its counter column name.
pub enum ColumnSource<R> {
    /// A fixed column name, known at registration time.
    Fixed(String),
    /// A function of the triggering record, evaluated when the event fires.
    /// A returned error aborts that single update only.
    Dynamic(ColumnFn<R>),
}

impl<R> fmt::Debug for ColumnSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSource::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            ColumnSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Options accepted by [`Registry::register`], built in the usual chaining
/// style.
///
/// With no options set, the counter column defaults to the pluralized owning
/// entity name plus `_count` (`comment` → `comments_count`).
pub struct CounterOptions<B: Backend> {
    column: Option<ColumnSource<B::Record>>,
    foreign_key_override: Option<ForeignKeyFn<B::Id>>,
}

impl<B: Backend> CounterOptions<B> {
    /// Creates empty options: default column name, no override.
    pub fn new() -> Self {
        CounterOptions {
            column: None,
            foreign_key_override: None,
        }
    }

    /// Uses a fixed counter column name.
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(ColumnSource::Fixed(name.into()));
        self
    }

    /// Computes the column name from the triggering record at mutation time.
    ///
    /// The function sees the record's in-flight state at the moment the
    /// lifecycle event fired, not the target record and not the state at
    /// commit time.
    pub fn with_column_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&B::Record) -> std::result::Result<String, BoxError> + Send + Sync + 'static,
    {
        self.column = Some(ColumnSource::Dynamic(Box::new(f)));
        self
    }

    /// Post-processes the resolved target id.
    ///
    /// The override runs unconditionally, *even when resolution produced
    /// `None`*, so it may manufacture a valid id from a null input (a fallback
    /// target, say). It is an override, not a filter.
    pub fn with_foreign_key_override<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<B::Id>) -> Option<B::Id> + Send + Sync + 'static,
    {
        self.foreign_key_override = Some(Box::new(f));
        self
    }
}

impl<B: Backend> Default for CounterOptions<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// One declared counter: relation path, column strategy, optional override,
/// plus descriptor data cached when the path was validated.
pub struct CounterSpec<B: Backend> {
    owner: EntityType,
    path: Vec<&'static str>,
    column: ColumnSource<B::Record>,
    foreign_key_override: Option<ForeignKeyFn<B::Id>>,
    /// Foreign key of `path[0]`; the one inspected for change on update.
    first_foreign_key: &'static str,
    /// Entity type of the final hop; the type holding the counter column.
    target: EntityType,
}

impl<B: Backend> CounterSpec<B> {
    /// The entity type this spec was registered for.
    pub fn owner(&self) -> EntityType {
        self.owner
    }

    /// The relation path, in hop order.
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    /// The entity type holding the counter column.
    pub fn target(&self) -> EntityType {
        self.target
    }

    /// The foreign-key column of the first hop.
    pub fn first_foreign_key(&self) -> &'static str {
        self.first_foreign_key
    }

    pub(crate) fn foreign_key_override(&self) -> Option<&ForeignKeyFn<B::Id>> {
        self.foreign_key_override.as_ref()
    }

    /// Evaluates the column strategy against the triggering record.
    pub fn resolve_column(&self, record: &B::Record) -> Result<String> {
        match &self.column {
            ColumnSource::Fixed(name) => Ok(name.clone()),
            ColumnSource::Dynamic(f) => f(record).map_err(|source| {
                CounterCacheError::ColumnResolver {
                    entity: self.owner.name(),
                    source,
                }
            }),
        }
    }
}

impl<B: Backend> fmt::Debug for CounterSpec<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterSpec")
            .field("owner", &self.owner)
            .field("path", &self.path)
            .field("target", &self.target)
            .field("column", &self.column)
            .finish()
    }
}

struct Entry<B: Backend> {
    specs: Vec<CounterSpec<B>>,
    hooks_installed: bool,
}

/// Per-entity-type registry of counter specs.
///
/// Registration is append-only and expected during process/type
/// initialization, not concurrently with live traffic; afterwards the
/// registry is read-only. Registration order is evaluation order.
pub struct Registry<B: Backend> {
    entries: HashMap<EntityType, Entry<B>>,
}

impl<B: Backend> Registry<B> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }

    /// Declares a counter for `entity`, reached through `path`.
    ///
    /// Every hop of `path` is validated against the backend's association
    /// metadata here, so a bad path is a registration-time error, not a
    /// surprise during some later save. The first registration for a given
    /// `entity` also installs the lifecycle hooks for that type, exactly
    /// once; subsequent registrations never reinstall them.
    ///
    /// # Errors
    ///
    /// [`EmptyRelationPath`](CounterCacheError::EmptyRelationPath) for a
    /// zero-length path, [`UnknownAssociation`](CounterCacheError::UnknownAssociation)
    /// when a hop does not name a declared association.
    pub fn register(
        &mut self,
        backend: &B,
        entity: EntityType,
        path: &[&'static str],
        options: CounterOptions<B>,
    ) -> Result<()> {
        let Some((first, rest)) = path.split_first() else {
            return Err(CounterCacheError::EmptyRelationPath {
                entity: entity.name(),
            });
        };

        let first_assoc = lookup(backend, entity, *first)?;
        let mut target = first_assoc.target;
        for name in rest {
            target = lookup(backend, target, *name)?.target;
        }

        let column = options
            .column
            .unwrap_or_else(|| ColumnSource::Fixed(default_column(entity)));

        let entry = self.entries.entry(entity).or_insert_with(|| Entry {
            specs: Vec::new(),
            hooks_installed: false,
        });
        if !entry.hooks_installed {
            backend.install_hooks(entity);
            entry.hooks_installed = true;
        }
        entry.specs.push(CounterSpec {
            owner: entity,
            path: path.to_vec(),
            column,
            foreign_key_override: options.foreign_key_override,
            first_foreign_key: first_assoc.foreign_key,
            target,
        });
        Ok(())
    }

    /// Returns the specs registered for `entity`, in registration order.
    /// Empty for types with no counters.
    pub fn specs_for(&self, entity: EntityType) -> &[CounterSpec<B>] {
        self.entries
            .get(&entity)
            .map(|entry| entry.specs.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of registered specs, across all entity types.
    pub fn len(&self) -> usize {
        self.entries.values().map(|entry| entry.specs.len()).sum()
    }

    /// Returns `true` if no counter has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Backend> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Registry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (entity, entry) in &self.entries {
            map.entry(&entity.name(), &entry.specs);
        }
        map.finish()
    }
}

fn lookup<B: Backend>(
    backend: &B,
    entity: EntityType,
    name: &'static str,
) -> Result<crate::backend::Association> {
    backend
        .association(entity, name)
        .ok_or(CounterCacheError::UnknownAssociation {
            entity: entity.name(),
            relation: name,
        })
}

/// Default counter column for an owning entity: pluralized name + `_count`.
fn default_column(entity: EntityType) -> String {
    format!("{}_count", pluralize(entity.name()))
}

/// Basic English pluralization, enough for conventional table/column naming.
pub(crate) fn pluralize(noun: &str) -> String {
    if let Some(stem) = noun.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .last()
            .map(|c| "aeiou".contains(c))
            .unwrap_or(true);
        if !vowel_before {
            return format!("{stem}ies");
        }
    }
    // single trailing z doubles before es: quiz -> quizzes
    if noun.ends_with('z') && !noun.ends_with("zz") {
        return format!("{noun}zes");
    }
    if noun.ends_with('s')
        || noun.ends_with('x')
        || noun.ends_with('z')
        || noun.ends_with("ch")
        || noun.ends_with("sh")
    {
        return format!("{noun}es");
    }
    format!("{noun}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_backend::{blog, AUTHOR, COMMENT, POST};

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("comment"), "comments");
        assert_eq!(pluralize("reply"), "replies");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("quiz"), "quizzes");
        assert_eq!(pluralize("buzz"), "buzzes");
        assert_eq!(pluralize("dish"), "dishes");
    }

    #[test]
    fn test_default_column() {
        assert_eq!(default_column(COMMENT), "comments_count");
        assert_eq!(default_column(EntityType::new("reply")), "replies_count");
    }

    #[test]
    fn test_register_single_hop() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();

        let specs = registry.specs_for(COMMENT);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].owner(), COMMENT);
        assert_eq!(specs[0].target(), POST);
        assert_eq!(specs[0].first_foreign_key(), "post_id");
    }

    #[test]
    fn test_register_multi_hop_target() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post", "author"], CounterOptions::new())
            .unwrap();

        let specs = registry.specs_for(COMMENT);
        assert_eq!(specs[0].target(), AUTHOR);
        assert_eq!(specs[0].first_foreign_key(), "post_id");
    }

    #[test]
    fn test_register_unknown_association() {
        let orm = blog();
        let mut registry = Registry::new();
        let err = registry
            .register(&orm, COMMENT, &["article"], CounterOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CounterCacheError::UnknownAssociation {
                entity: "comment",
                relation: "article",
            }
        ));
    }

    #[test]
    fn test_register_unknown_second_hop() {
        let orm = blog();
        let mut registry = Registry::new();
        let err = registry
            .register(&orm, COMMENT, &["post", "editor"], CounterOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CounterCacheError::UnknownAssociation {
                entity: "post",
                relation: "editor",
            }
        ));
    }

    #[test]
    fn test_register_empty_path() {
        let orm = blog();
        let mut registry = Registry::new();
        let err = registry
            .register(&orm, COMMENT, &[], CounterOptions::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CounterCacheError::EmptyRelationPath { entity: "comment" }
        ));
    }

    #[test]
    fn test_hooks_installed_once() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();
        registry
            .register(&orm, COMMENT, &["post", "author"], CounterOptions::new())
            .unwrap();

        assert_eq!(*orm.installs.lock().unwrap(), vec![COMMENT]);
    }

    #[test]
    fn test_hooks_installed_per_type() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();
        registry
            .register(&orm, POST, &["author"], CounterOptions::new())
            .unwrap();

        assert_eq!(*orm.installs.lock().unwrap(), vec![COMMENT, POST]);
    }

    #[test]
    fn test_registration_order_preserved() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(
                &orm,
                COMMENT,
                &["post"],
                CounterOptions::new().with_column("first"),
            )
            .unwrap();
        registry
            .register(
                &orm,
                COMMENT,
                &["post"],
                CounterOptions::new().with_column("second"),
            )
            .unwrap();

        let rec = crate::test_backend::comment(1, Some(5));
        let columns: Vec<String> = registry
            .specs_for(COMMENT)
            .iter()
            .map(|spec| spec.resolve_column(&rec).unwrap())
            .collect();
        assert_eq!(columns, vec!["first", "second"]);
    }

    #[test]
    fn test_specs_for_unregistered_type() {
        let registry: Registry<crate::test_backend::MiniOrm> = Registry::new();
        assert!(registry.specs_for(AUTHOR).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_len() {
        let orm = blog();
        let mut registry = Registry::new();
        assert_eq!(registry.len(), 0);
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();
        registry
            .register(&orm, POST, &["author"], CounterOptions::new())
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_default_column_used_when_unset() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();

        let rec = crate::test_backend::comment(1, Some(5));
        let column = registry.specs_for(COMMENT)[0].resolve_column(&rec).unwrap();
        assert_eq!(column, "comments_count");
    }

    #[test]
    fn test_dynamic_column_failure() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(
                &orm,
                COMMENT,
                &["post"],
                CounterOptions::new().with_column_fn(|_rec| Err("no column for state".into())),
            )
            .unwrap();

        let rec = crate::test_backend::comment(1, Some(5));
        let err = registry.specs_for(COMMENT)[0]
            .resolve_column(&rec)
            .unwrap_err();
        assert!(matches!(
            err,
            CounterCacheError::ColumnResolver {
                entity: "comment",
                ..
            }
        ));
    }

    #[test]
    fn test_spec_debug() {
        let orm = blog();
        let mut registry = Registry::new();
        registry
            .register(&orm, COMMENT, &["post"], CounterOptions::new())
            .unwrap();
        let debug = format!("{:?}", registry.specs_for(COMMENT)[0]);
        assert!(debug.contains("comment"));
        assert!(debug.contains("post"));
        assert!(debug.contains("comments_count"));
    }
}
