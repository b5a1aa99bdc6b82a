//! Tiny in-memory ORM shared by the unit tests: three entity types
//! (comment → post → author), hand-rolled association metadata, a record
//! store, and a counter table with an injectable adjust failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::backend::{Association, Backend, EntityType};
use crate::error::{CounterCacheError, Result};

pub(crate) const COMMENT: EntityType = EntityType::new("comment");
pub(crate) const POST: EntityType = EntityType::new("post");
pub(crate) const AUTHOR: EntityType = EntityType::new("author");

/// A loaded record: entity type, foreign keys, and the pre-change values of
/// any keys currently being updated.
#[derive(Debug, Clone)]
pub(crate) struct Rec {
    pub id: i64,
    pub entity: EntityType,
    fks: HashMap<&'static str, Option<i64>>,
    previous: HashMap<&'static str, Option<i64>>,
    pub flagged: bool,
}

impl Rec {
    pub fn new(id: i64, entity: EntityType) -> Self {
        Rec {
            id,
            entity,
            fks: HashMap::new(),
            previous: HashMap::new(),
            flagged: false,
        }
    }

    pub fn with_fk(mut self, key: &'static str, value: Option<i64>) -> Self {
        self.fks.insert(key, value);
        self
    }

    /// Records an in-flight change: `key` used to hold `value`.
    pub fn with_previous(mut self, key: &'static str, value: Option<i64>) -> Self {
        self.previous.insert(key, value);
        self
    }
}

pub(crate) fn comment(id: i64, post_id: Option<i64>) -> Rec {
    Rec::new(id, COMMENT).with_fk("post_id", post_id)
}

pub(crate) fn post(id: i64, author_id: Option<i64>) -> Rec {
    Rec::new(id, POST).with_fk("author_id", author_id)
}

pub(crate) struct MiniOrm {
    associations: Vec<(EntityType, &'static str, Association)>,
    records: Mutex<HashMap<(EntityType, i64), Rec>>,
    counters: Mutex<HashMap<(EntityType, i64, String), i64>>,
    adjust_count: Mutex<usize>,
    pub installs: Mutex<Vec<EntityType>>,
    fail_adjust: AtomicBool,
}

impl MiniOrm {
    pub fn new() -> Self {
        MiniOrm {
            associations: Vec::new(),
            records: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            adjust_count: Mutex::new(0),
            installs: Mutex::new(Vec::new()),
            fail_adjust: AtomicBool::new(false),
        }
    }

    pub fn with_association(
        mut self,
        owner: EntityType,
        name: &'static str,
        target: EntityType,
        foreign_key: &'static str,
    ) -> Self {
        self.associations.push((
            owner,
            name,
            Association {
                target,
                foreign_key,
            },
        ));
        self
    }

    pub fn insert(&self, rec: Rec) {
        self.records.lock().unwrap().insert((rec.entity, rec.id), rec);
    }

    /// Current value of a counter column, zero if never adjusted.
    pub fn counter(&self, entity: EntityType, id: i64, column: &str) -> i64 {
        self.counters
            .lock()
            .unwrap()
            .get(&(entity, id, column.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of adjust calls that reached storage.
    pub fn adjustments(&self) -> usize {
        *self.adjust_count.lock().unwrap()
    }

    /// Makes every subsequent adjust fail.
    pub fn fail_adjustments(&self) {
        self.fail_adjust.store(true, Ordering::Relaxed);
    }
}

impl Backend for MiniOrm {
    type Record = Rec;
    type Id = i64;

    fn entity_type(&self, record: &Rec) -> EntityType {
        record.entity
    }

    fn association(&self, entity: EntityType, name: &str) -> Option<Association> {
        self.associations
            .iter()
            .find(|(owner, assoc_name, _)| *owner == entity && *assoc_name == name)
            .map(|(_, _, assoc)| *assoc)
    }

    fn load(&self, entity: EntityType, id: &i64) -> Option<Rec> {
        self.records.lock().unwrap().get(&(entity, *id)).cloned()
    }

    fn foreign_key(&self, record: &Rec, foreign_key: &str) -> Option<i64> {
        record.fks.get(foreign_key).copied().flatten()
    }

    fn previous_foreign_key(&self, record: &Rec, foreign_key: &str) -> Option<i64> {
        match record.previous.get(foreign_key) {
            Some(value) => *value,
            // no change in flight: previous equals current
            None => self.foreign_key(record, foreign_key),
        }
    }

    fn adjust(&self, target: EntityType, column: &str, id: &i64, delta: i64) -> Result<()> {
        if self.fail_adjust.load(Ordering::Relaxed) {
            return Err(CounterCacheError::storage("injected adjust failure"));
        }
        *self
            .counters
            .lock()
            .unwrap()
            .entry((target, *id, column.to_string()))
            .or_insert(0) += delta;
        *self.adjust_count.lock().unwrap() += 1;
        Ok(())
    }

    fn install_hooks(&self, entity: EntityType) {
        self.installs.lock().unwrap().push(entity);
    }
}

/// The standard fixture: comments belong to posts, posts belong to authors.
pub(crate) fn blog() -> MiniOrm {
    MiniOrm::new()
        .with_association(COMMENT, "post", POST, "post_id")
        .with_association(POST, "author", AUTHOR, "author_id")
}
