//! In-process storage: documents held in memory, filters and updates
//! evaluated by this crate. Backs `Datastore::in_memory` and the test suite.

mod apply;
mod eval;

use bson::{Bson, Document};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::collection::{
    Collation, Collection, CountOptions, Cursor, DeleteOptions, DeleteResult, FindAndModifyOptions, FindOptions,
    InsertOptions, Modification, Storage, UpdateOptions, UpdateResult,
};
use crate::errors::StorageFailure;
use crate::logger::AUDIT_TARGET;

pub use eval::matches;

/// Collections created on first access and kept for the life of the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn drop_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    fn get_or_create(&self, name: &str) -> Arc<MemoryCollection> {
        if let Some(c) = self.collections.read().get(name) {
            return Arc::clone(c);
        }
        let mut w = self.collections.write();
        Arc::clone(w.entry(name.to_string()).or_insert_with(|| {
            log::debug!("creating in-memory collection {name}");
            Arc::new(MemoryCollection::new(name))
        }))
    }
}

impl Storage for MemoryStorage {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.get_or_create(name)
    }
}

/// Documents in insertion order.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    docs: RwLock<Vec<Document>>,
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn new(max_time_ms: Option<u64>) -> Self {
        Self(max_time_ms.map(|ms| Instant::now() + Duration::from_millis(ms)))
    }

    fn check(&self) -> Result<(), StorageFailure> {
        match self.0 {
            Some(dl) if Instant::now() > dl => Err(StorageFailure::Timeout("operation exceeded max_time_ms".into())),
            _ => Ok(()),
        }
    }
}

fn audit(op: &str, collection: &str, id: Option<&Bson>) {
    let line = serde_json::json!({
        "op": op,
        "collection": collection,
        "doc_id": id.map(|i| i.clone().into_relaxed_extjson()),
    });
    log::info!(target: AUDIT_TARGET, "{line}");
}

fn ignore_collation(collection: &str, collation: Option<&Collation>) {
    if let Some(c) = collation {
        log::warn!("{collection}: collation '{}' ignored; strings compare binary", c.locale);
    }
}

fn same_id(a: &Document, b: &Document) -> bool {
    matches!((a.get("_id"), b.get("_id")), (Some(x), Some(y)) if eval::values_equal(x, y))
}

impl MemoryCollection {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), docs: RwLock::new(Vec::new()) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Positions of matching documents, in sort order when a sort is given.
    fn select(
        docs: &[Document],
        filter: &Document,
        sort: Option<&Document>,
        deadline: &Deadline,
    ) -> Result<Vec<usize>, StorageFailure> {
        let mut hits = Vec::new();
        for (i, d) in docs.iter().enumerate() {
            deadline.check()?;
            if eval::matches(d, filter)? {
                hits.push(i);
            }
        }
        if let Some(sort) = sort {
            if eval::natural_descending(sort) {
                hits.reverse();
            }
            hits.sort_by(|a, b| eval::compare_docs(&docs[*a], &docs[*b], sort));
        }
        Ok(hits)
    }

    fn check_unique(docs: &[Document], candidate: &Document, skip: Option<usize>, name: &str) -> Result<(), StorageFailure> {
        let clash = docs.iter().enumerate().any(|(i, d)| Some(i) != skip && same_id(d, candidate));
        if clash {
            let key = candidate.get("_id").map(ToString::to_string).unwrap_or_default();
            return Err(StorageFailure::DuplicateKey { collection: name.to_string(), key });
        }
        Ok(())
    }

    fn upsert_document(
        docs: &mut Vec<Document>,
        filter: &Document,
        update: &Document,
        name: &str,
    ) -> Result<Document, StorageFailure> {
        let mut fresh = apply::seed_from_filter(filter)?;
        if apply::is_operator_update(update) {
            apply::apply_update(&mut fresh, update, filter, true)?;
        } else {
            let id = fresh.get("_id").cloned();
            fresh = update.clone();
            if let Some(id) = id {
                fresh.insert("_id", id);
            }
        }
        apply::ensure_id(&mut fresh);
        Self::check_unique(docs, &fresh, None, name)?;
        docs.push(fresh.clone());
        Ok(fresh)
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> Result<Cursor, StorageFailure> {
        ignore_collation(&self.name, options.collation.as_ref());
        let deadline = Deadline::new(options.max_time_ms);
        let docs = self.docs.read();
        let hits = Self::select(&docs, filter, options.sort.as_ref(), &deadline)?;
        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = options.limit.filter(|l| *l > 0).map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let out: Vec<Document> = hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|i| match &options.projection {
                Some(p) => eval::project(&docs[i], p),
                None => docs[i].clone(),
            })
            .collect();
        log::trace!("find {} -> {} docs", self.name, out.len());
        Ok(Cursor::new(out, options.batch_size))
    }

    fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64, StorageFailure> {
        ignore_collation(&self.name, options.collation.as_ref());
        let deadline = Deadline::new(options.max_time_ms);
        let docs = self.docs.read();
        let hits = Self::select(&docs, filter, None, &deadline)?.len() as u64;
        let after_skip = hits.saturating_sub(options.skip.unwrap_or(0));
        Ok(options.limit.filter(|l| *l > 0).map_or(after_skip, |l| after_skip.min(l)))
    }

    fn insert(&self, mut document: Document, _options: &InsertOptions) -> Result<Bson, StorageFailure> {
        let id = apply::ensure_id(&mut document);
        let mut docs = self.docs.write();
        Self::check_unique(&docs, &document, None, &self.name)?;
        docs.push(document);
        audit("insert", &self.name, Some(&id));
        Ok(id)
    }

    fn replace(
        &self,
        filter: &Document,
        mut document: Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult, StorageFailure> {
        if apply::is_operator_update(&document) {
            return Err(StorageFailure::Other("replacement document cannot contain update operators".into()));
        }
        let mut docs = self.docs.write();
        let hits = Self::select(&docs, filter, None, &Deadline(None))?;
        let Some(&i) = hits.first() else {
            if !options.upsert {
                return Ok(UpdateResult::default());
            }
            let fresh = Self::upsert_document(&mut docs, filter, &document, &self.name)?;
            let id = fresh.get("_id").cloned();
            audit("upsert", &self.name, id.as_ref());
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: id });
        };
        let old_id = docs[i].get("_id").cloned();
        let new_id = document.get("_id").cloned();
        match (old_id, new_id) {
            (Some(old), Some(new)) if !eval::values_equal(&old, &new) => {
                return Err(StorageFailure::Other("the _id field cannot be changed".into()));
            }
            (Some(old), None) => {
                let mut out = Document::new();
                out.insert("_id", old);
                out.extend(document);
                document = out;
            }
            _ => {}
        }
        let modified = u64::from(docs[i] != document);
        let id = document.get("_id").cloned();
        docs[i] = document;
        audit("replace", &self.name, id.as_ref());
        Ok(UpdateResult { matched_count: 1, modified_count: modified, upserted_id: None })
    }

    fn update(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateResult, StorageFailure> {
        if !apply::is_operator_update(update) {
            return self.replace(filter, update.clone(), options);
        }
        ignore_collation(&self.name, options.collation.as_ref());
        let mut docs = self.docs.write();
        let mut hits = Self::select(&docs, filter, None, &Deadline(None))?;
        if hits.is_empty() {
            if !options.upsert {
                return Ok(UpdateResult::default());
            }
            let fresh = Self::upsert_document(&mut docs, filter, update, &self.name)?;
            let id = fresh.get("_id").cloned();
            audit("upsert", &self.name, id.as_ref());
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: id });
        }
        if !options.multi {
            hits.truncate(1);
        }
        // Stage every change first so a failure leaves the collection untouched.
        let mut staged = Vec::with_capacity(hits.len());
        for i in &hits {
            let mut next = docs[*i].clone();
            if apply::apply_update(&mut next, update, filter, false)? {
                staged.push((*i, next));
            }
        }
        let modified = staged.len() as u64;
        for (i, next) in staged {
            audit("update", &self.name, next.get("_id"));
            docs[i] = next;
        }
        Ok(UpdateResult { matched_count: hits.len() as u64, modified_count: modified, upserted_id: None })
    }

    fn delete(&self, filter: &Document, options: &DeleteOptions) -> Result<DeleteResult, StorageFailure> {
        ignore_collation(&self.name, options.collation.as_ref());
        let mut docs = self.docs.write();
        let mut hits = Self::select(&docs, filter, None, &Deadline(None))?;
        if !options.multi {
            hits.truncate(1);
        }
        for i in hits.iter().rev() {
            let gone = docs.remove(*i);
            audit("delete", &self.name, gone.get("_id"));
        }
        Ok(DeleteResult { deleted_count: hits.len() as u64 })
    }

    fn find_and_modify(
        &self,
        filter: &Document,
        modification: &Modification,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>, StorageFailure> {
        let deadline = Deadline::new(options.max_time_ms);
        let mut docs = self.docs.write();
        let hits = Self::select(&docs, filter, options.sort.as_ref(), &deadline)?;
        let shape = |d: Document| match &options.projection {
            Some(p) => eval::project(&d, p),
            None => d,
        };

        let Some(&i) = hits.first() else {
            let update = match modification {
                Modification::Update(u) | Modification::Replace(u) if options.upsert => u,
                _ => return Ok(None),
            };
            let fresh = Self::upsert_document(&mut docs, filter, update, &self.name)?;
            audit("upsert", &self.name, fresh.get("_id"));
            return Ok(options.return_new.then(|| shape(fresh)));
        };

        let before = docs[i].clone();
        let after = match modification {
            Modification::Remove => {
                docs.remove(i);
                audit("delete", &self.name, before.get("_id"));
                return Ok(Some(shape(before)));
            }
            Modification::Update(u) if apply::is_operator_update(u) => {
                let mut next = before.clone();
                apply::apply_update(&mut next, u, filter, false)?;
                next
            }
            Modification::Update(u) | Modification::Replace(u) => {
                let mut next = u.clone();
                if let Some(id) = before.get("_id") {
                    if next.get("_id").is_some_and(|n| !eval::values_equal(n, id)) {
                        return Err(StorageFailure::Other("the _id field cannot be changed".into()));
                    }
                    next.insert("_id", id.clone());
                }
                next
            }
        };
        Self::check_unique(&docs, &after, Some(i), &self.name)?;
        docs[i] = after.clone();
        audit("update", &self.name, after.get("_id"));
        Ok(Some(shape(if options.return_new { after } else { before })))
    }
}
