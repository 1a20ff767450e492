//! Applies update documents (`$set`, `$inc`, `$push`, ...) to stored documents.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::cmp::Ordering;

use super::eval::{as_f64, compare_bson, is_operator_doc, lookup, matches, matches_field, values_equal};
use crate::errors::StorageFailure;

fn failure(msg: impl Into<String>) -> StorageFailure {
    StorageFailure::Other(msg.into())
}

/// True when the first key is an update operator.
#[must_use]
pub(crate) fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Value at an exact path; numeric segments index into arrays.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut cur = doc.get(segments.next()?)?;
    for seg in segments {
        cur = match cur {
            Bson::Document(d) => d.get(seg)?,
            Bson::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn slot_in_doc<'a>(doc: &'a mut Document, segs: &[&str], path: &str) -> Result<&'a mut Bson, StorageFailure> {
    let Some((first, rest)) = segs.split_first() else {
        return Err(failure(format!("empty path in '{path}'")));
    };
    if !doc.contains_key(*first) {
        let fresh = if rest.is_empty() { Bson::Null } else { Bson::Document(Document::new()) };
        doc.insert(*first, fresh);
    }
    let slot = doc.get_mut(*first).ok_or_else(|| failure(format!("cannot create '{path}'")))?;
    if rest.is_empty() { Ok(slot) } else { slot_in_value(slot, rest, path) }
}

fn slot_in_value<'a>(value: &'a mut Bson, segs: &[&str], path: &str) -> Result<&'a mut Bson, StorageFailure> {
    match value {
        Bson::Document(d) => slot_in_doc(d, segs, path),
        Bson::Array(items) => {
            let (first, rest) = segs.split_first().ok_or_else(|| failure(format!("empty path in '{path}'")))?;
            let idx: usize = first
                .parse()
                .map_err(|_| failure(format!("cannot use '{first}' to address an array element in '{path}'")))?;
            if idx >= items.len() {
                items.resize(idx + 1, Bson::Null);
            }
            let item = items.get_mut(idx).ok_or_else(|| failure(format!("cannot create '{path}'")))?;
            if rest.is_empty() {
                return Ok(item);
            }
            if matches!(item, Bson::Null) {
                *item = Bson::Document(Document::new());
            }
            slot_in_value(item, rest, path)
        }
        other => Err(failure(format!("cannot create field '{}' in element {other}", segs.join(".")))),
    }
}

/// Writes `value` at `path`, creating intermediate documents.
///
/// # Errors
/// Fails when the path runs through a scalar.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), StorageFailure> {
    let segs: Vec<&str> = path.split('.').collect();
    *slot_in_doc(doc, &segs, path)? = value;
    Ok(())
}

/// Removes the field at `path`. Array elements are nulled, not shifted.
pub(crate) fn remove_path(doc: &mut Document, path: &str) {
    let (parent, last) = match path.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, path),
    };
    let Some(parent) = parent else {
        doc.remove(last);
        return;
    };
    let segs: Vec<&str> = parent.split('.').collect();
    if get_path(doc, parent).is_none() {
        return;
    }
    match slot_in_doc(doc, &segs, parent) {
        Ok(Bson::Document(d)) => {
            d.remove(last);
        }
        Ok(Bson::Array(items)) => {
            if let Some(item) = last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *item = Bson::Null;
            }
        }
        _ => {}
    }
}

/// Index of the first array element at `prefix` satisfying the filter
/// conditions that mention `prefix`.
fn positional_index(doc: &Document, prefix: &str, filter: &Document) -> Result<usize, StorageFailure> {
    let not_found = || failure(format!("the positional operator did not find the match needed from the query for '{prefix}'"));
    let Some(Bson::Array(items)) = get_path(doc, prefix) else { return Err(not_found()) };
    let nested = format!("{prefix}.");
    for (i, item) in items.iter().enumerate() {
        let mut constrained = false;
        let mut all = true;
        for (key, cond) in filter {
            let hit = if key == prefix {
                constrained = true;
                match (cond, item) {
                    (Bson::Document(c), Bson::Document(d)) if c.contains_key("$elemMatch") => {
                        c.get_document("$elemMatch").map_or(Ok(false), |sub| matches(d, sub))?
                    }
                    _ => matches_field(&[item], cond)?,
                }
            } else if let Some(sub) = key.strip_prefix(&nested) {
                constrained = true;
                match item {
                    Bson::Document(d) => matches_field(&lookup(d, sub), cond)?,
                    _ => false,
                }
            } else {
                true
            };
            all &= hit;
        }
        if constrained && all {
            return Ok(i);
        }
    }
    Err(not_found())
}

/// Expands positional segments into concrete paths: `$` becomes the index
/// matched by the filter, `$[]` fans out to every element.
fn expand_path(doc: &Document, path: &str, filter: &Document) -> Result<Vec<String>, StorageFailure> {
    let mut done: Vec<String> = vec![String::new()];
    for seg in path.split('.') {
        let join = |base: &str, s: &str| if base.is_empty() { s.to_string() } else { format!("{base}.{s}") };
        let mut next = Vec::with_capacity(done.len());
        for base in &done {
            match seg {
                "$" => next.push(join(base, &positional_index(doc, base, filter)?.to_string())),
                "$[]" => {
                    if let Some(Bson::Array(items)) = get_path(doc, base) {
                        next.extend((0..items.len()).map(|i| join(base, &i.to_string())));
                    }
                }
                s if s.starts_with("$[") => {
                    return Err(StorageFailure::Unsupported(format!(
                        "filtered positional operator {s} is not supported by the in-memory engine"
                    )));
                }
                s => next.push(join(base, s)),
            }
        }
        done = next;
    }
    Ok(done)
}

fn numeric_sum(current: Option<&Bson>, by: &Bson, path: &str) -> Result<Bson, StorageFailure> {
    let not_numeric = |v: &Bson| failure(format!("cannot apply $inc to non-numeric value {v} at '{path}'"));
    let base = current.unwrap_or(&Bson::Int32(0));
    Ok(match (base, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).checked_add(*b).ok_or_else(|| failure("integer overflow"))?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(|| failure("integer overflow"))?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(|| failure("integer overflow"))?),
        (a, b) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Bson::Double(x + y),
            (None, _) => return Err(not_numeric(a)),
            (_, None) => return Err(not_numeric(b)),
        },
    })
}

fn array_at(doc: &Document, path: &str, op: &str) -> Result<Vec<Bson>, StorageFailure> {
    match get_path(doc, path) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(items)) => Ok(items.clone()),
        Some(other) => Err(failure(format!("{op} needs an array at '{path}', found {other}"))),
    }
}

/// `{$each: [...], $position, $slice, $sort}` or a single value.
fn push(mut items: Vec<Bson>, arg: &Bson) -> Result<Vec<Bson>, StorageFailure> {
    let Bson::Document(spec) = arg else {
        items.push(arg.clone());
        return Ok(items);
    };
    let Some(each) = spec.get("$each") else {
        items.push(arg.clone());
        return Ok(items);
    };
    let Bson::Array(each) = each else { return Err(failure("$each needs an array")) };
    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let at = match spec.get("$position") {
        None => len,
        Some(p) => {
            let p = integer(p, "$position")?;
            if p < 0 { (len + p).max(0) } else { p.min(len) }
        }
    };
    let at = usize::try_from(at).unwrap_or(items.len());
    items.splice(at..at, each.iter().cloned());
    match spec.get("$sort") {
        None => {}
        Some(Bson::Document(fields)) => items.sort_by(|a, b| match (a, b) {
            (Bson::Document(x), Bson::Document(y)) => super::eval::compare_docs(x, y, fields),
            _ => compare_bson(a, b),
        }),
        Some(dir) => {
            let descending = integer(dir, "$sort")? < 0;
            items.sort_by(|a, b| if descending { compare_bson(b, a) } else { compare_bson(a, b) });
        }
    }
    if let Some(slice) = spec.get("$slice") {
        let n = integer(slice, "$slice")?;
        let keep = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX).min(items.len());
        if n < 0 {
            items.drain(..items.len() - keep);
        } else {
            items.truncate(keep);
        }
    }
    Ok(items)
}

#[allow(clippy::cast_possible_truncation)]
fn integer(v: &Bson, what: &str) -> Result<i64, StorageFailure> {
    match v {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        Bson::Double(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(failure(format!("{what} needs an integer, got {other}"))),
    }
}

fn pull_matches(item: &Bson, cond: &Bson) -> Result<bool, StorageFailure> {
    match (item, cond) {
        (_, Bson::Document(c)) if is_operator_doc(c) => matches_field(&[item], cond),
        (Bson::Document(d), Bson::Document(c)) => matches(d, c),
        _ => Ok(values_equal(item, cond)),
    }
}

/// Applies one operator update to `doc`. Returns whether anything changed.
///
/// `inserting` enables `$setOnInsert`.
///
/// # Errors
/// Returns `Other` for malformed operators or type clashes and
/// `Unsupported` for filtered positional paths.
pub(crate) fn apply_update(
    doc: &mut Document,
    update: &Document,
    filter: &Document,
    inserting: bool,
) -> Result<bool, StorageFailure> {
    let before = doc.clone();
    for (op, fields) in update {
        if op == "$isolated" || op == "$atomic" {
            continue;
        }
        let Bson::Document(fields) = fields else {
            return Err(failure(format!("{op} needs a document of fields")));
        };
        for (raw_path, arg) in fields {
            for path in expand_path(doc, raw_path, filter)? {
                if path == "_id" && op != "$setOnInsert" && !(op == "$set" && inserting) {
                    if get_path(doc, "_id").is_some_and(|cur| values_equal(cur, arg)) {
                        continue;
                    }
                    return Err(failure("the _id field cannot be changed"));
                }
                apply_one(doc, op, &path, arg, inserting)?;
            }
        }
    }
    Ok(*doc != before)
}

fn apply_one(doc: &mut Document, op: &str, path: &str, arg: &Bson, inserting: bool) -> Result<(), StorageFailure> {
    match op {
        "$set" => set_path(doc, path, arg.clone()),
        "$setOnInsert" if inserting => set_path(doc, path, arg.clone()),
        "$setOnInsert" => Ok(()),
        "$unset" => {
            remove_path(doc, path);
            Ok(())
        }
        "$inc" => {
            let next = numeric_sum(get_path(doc, path), arg, path)?;
            set_path(doc, path, next)
        }
        "$max" | "$min" => {
            let want = if op == "$max" { Ordering::Greater } else { Ordering::Less };
            let replace = get_path(doc, path).is_none_or(|cur| compare_bson(arg, cur) == want);
            if replace { set_path(doc, path, arg.clone()) } else { Ok(()) }
        }
        "$push" => {
            let items = push(array_at(doc, path, op)?, arg)?;
            set_path(doc, path, Bson::Array(items))
        }
        "$addToSet" => {
            let mut items = array_at(doc, path, op)?;
            let candidates = match arg {
                Bson::Document(d) if d.contains_key("$each") => match d.get("$each") {
                    Some(Bson::Array(each)) => each.clone(),
                    _ => return Err(failure("$each needs an array")),
                },
                v => vec![v.clone()],
            };
            for c in candidates {
                if !items.iter().any(|i| values_equal(i, &c)) {
                    items.push(c);
                }
            }
            set_path(doc, path, Bson::Array(items))
        }
        "$pop" => {
            let mut items = array_at(doc, path, op)?;
            if items.is_empty() {
                return Ok(());
            }
            if integer(arg, "$pop")? < 0 {
                items.remove(0);
            } else {
                items.pop();
            }
            set_path(doc, path, Bson::Array(items))
        }
        "$pull" => {
            if get_path(doc, path).is_none() {
                return Ok(());
            }
            let mut kept = Vec::new();
            for item in array_at(doc, path, op)? {
                if !pull_matches(&item, arg)? {
                    kept.push(item);
                }
            }
            set_path(doc, path, Bson::Array(kept))
        }
        "$pullAll" => {
            let Bson::Array(values) = arg else { return Err(failure("$pullAll needs an array")) };
            if get_path(doc, path).is_none() {
                return Ok(());
            }
            let mut items = array_at(doc, path, op)?;
            items.retain(|i| !values.iter().any(|v| values_equal(i, v)));
            set_path(doc, path, Bson::Array(items))
        }
        other => Err(failure(format!("unknown update operator {other}"))),
    }
}

/// Starting document for an upsert: the filter's top-level equalities and
/// `$eq` conditions.
pub(crate) fn seed_from_filter(filter: &Document) -> Result<Document, StorageFailure> {
    let mut seed = Document::new();
    for (key, cond) in filter {
        if key == "$and" {
            if let Bson::Array(parts) = cond {
                for part in parts {
                    if let Bson::Document(d) = part {
                        for (k, v) in seed_from_filter(d)? {
                            set_path(&mut seed, &k, v)?;
                        }
                    }
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }
        match cond {
            Bson::Document(d) if is_operator_doc(d) => {
                if let Some(v) = d.get("$eq") {
                    set_path(&mut seed, key, v.clone())?;
                }
            }
            Bson::RegularExpression(_) => {}
            v => set_path(&mut seed, key, v.clone())?,
        }
    }
    Ok(seed)
}

/// Adds a fresh `ObjectId` as `_id` when the document has none, keeping
/// `_id` first.
pub(crate) fn ensure_id(doc: &mut Document) -> Bson {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = Document::new();
    out.insert("_id", id.clone());
    out.extend(std::mem::take(doc));
    *doc = out;
    id
}
