//! Filter evaluation over BSON documents.

use bson::{Bson, Document};
use std::cmp::Ordering;

use crate::errors::StorageFailure;

pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_SORT_FIELDS: usize = 32;

fn unsupported(what: &str) -> StorageFailure {
    StorageFailure::Unsupported(format!("{what} is not supported by the in-memory engine"))
}

fn bad_filter(msg: impl Into<String>) -> StorageFailure {
    StorageFailure::Other(format!("bad filter: {}", msg.into()))
}

/// Values reachable at `path`, descending into arrays of documents the way
/// the query language does. Arrays at the end of the path are returned whole.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() > MAX_PATH_DEPTH {
        return Vec::new();
    }
    let mut out = Vec::new();
    collect_doc(doc, &segments, &mut out);
    out
}

fn collect_doc<'a>(doc: &'a Document, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((first, rest)) = segments.split_first() else { return };
    if let Some(v) = doc.get(*first) {
        collect_value(v, rest, out);
    }
}

fn collect_value<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((next, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Bson::Document(d) => collect_doc(d, rest, out),
        Bson::Array(items) => {
            if let Ok(i) = next.parse::<usize>()
                && let Some(item) = items.get(i)
            {
                collect_value(item, tail, out);
            }
            for item in items {
                if let Bson::Document(d) = item {
                    collect_doc(d, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// `{$gt: 1}` but not a DBRef (`{$ref, $id}`).
pub(crate) fn is_operator_doc(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$')) && !d.contains_key("$ref")
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Total order used for sorting and `$min`/`$max`: numbers compare by value,
/// other values of the same type by content, mixed types by type rank.
pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        if let (Bson::Int64(x), Bson::Int64(y)) = (a, b) {
            return x.cmp(y);
        }
        return as_f64(a).unwrap_or(f64::NAN).total_cmp(&as_f64(b).unwrap_or(f64::NAN));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let o = compare_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let o = lk.cmp(rk).then_with(|| compare_bson(lv, rv));
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

/// Equality with numeric widening (`1 == 1.0`).
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r)),
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        _ => a == b,
    }
}

/// A stored value matches `target` if it equals it or is an array holding it.
fn matches_eq(candidate: &Bson, target: &Bson) -> bool {
    values_equal(candidate, target)
        || matches!(candidate, Bson::Array(items) if items.iter().any(|i| values_equal(i, target)))
}

/// Range operators only compare values of the same type class.
fn matches_cmp(candidate: &Bson, target: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let cmp_one = |c: &Bson| type_rank(c) == type_rank(target) && accept(compare_bson(c, target));
    cmp_one(candidate) || matches!(candidate, Bson::Array(items) if items.iter().any(cmp_one))
}

fn type_matches(value: &Bson, spec: &Bson) -> Result<bool, StorageFailure> {
    let code = value.element_type() as u8;
    Ok(match spec {
        Bson::Int32(n) => i64::from(code) == i64::from(*n),
        Bson::Int64(n) => i64::from(code) == *n,
        Bson::String(alias) => match alias.as_str() {
            "number" => is_num(value),
            "double" => code == 0x01,
            "string" => code == 0x02,
            "object" => code == 0x03,
            "array" => code == 0x04,
            "binData" => code == 0x05,
            "objectId" => code == 0x07,
            "bool" => code == 0x08,
            "date" => code == 0x09,
            "null" => code == 0x0A,
            "regex" => code == 0x0B,
            "javascript" => code == 0x0D,
            "int" => code == 0x10,
            "timestamp" => code == 0x11,
            "long" => code == 0x12,
            "decimal" => code == 0x13,
            other => return Err(bad_filter(format!("unknown $type alias '{other}'"))),
        },
        other => return Err(bad_filter(format!("$type needs a number or alias, got {other}"))),
    })
}

#[cfg(feature = "regex")]
fn regex_matches(candidates: &[&Bson], pattern: &str, options: &str) -> Result<bool, StorageFailure> {
    let mut builder = regex::RegexBuilder::new(pattern);
    builder.case_insensitive(options.contains('i'));
    builder.multi_line(options.contains('m'));
    builder.dot_matches_new_line(options.contains('s'));
    let re = builder.build().map_err(|e| bad_filter(e.to_string()))?;
    Ok(candidates.iter().any(|c| match c {
        Bson::String(s) => re.is_match(s),
        Bson::Array(items) => items.iter().any(|i| matches!(i, Bson::String(s) if re.is_match(s))),
        _ => false,
    }))
}

#[cfg(not(feature = "regex"))]
fn regex_matches(_: &[&Bson], _: &str, _: &str) -> Result<bool, StorageFailure> {
    Err(unsupported("$regex (enable the `regex` feature)"))
}

/// Evaluates `filter` against `doc`.
///
/// # Errors
/// Returns `Unsupported` for geo operators, `$where` and `$text`, and
/// `Other` for malformed operator documents.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StorageFailure> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => logical(doc, cond, "$and")?.iter().all(|b| *b),
            "$or" => logical(doc, cond, "$or")?.iter().any(|b| *b),
            "$nor" => !logical(doc, cond, "$nor")?.iter().any(|b| *b),
            "$where" => return Err(unsupported("$where")),
            "$text" => return Err(unsupported("$text")),
            k if k.starts_with('$') => return Err(bad_filter(format!("unknown top-level operator {k}"))),
            path => matches_field(&lookup(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical(doc: &Document, cond: &Bson, op: &str) -> Result<Vec<bool>, StorageFailure> {
    let Bson::Array(items) = cond else {
        return Err(bad_filter(format!("{op} needs an array")));
    };
    if items.is_empty() {
        return Err(bad_filter(format!("{op} needs a non-empty array")));
    }
    items
        .iter()
        .map(|i| match i {
            Bson::Document(d) => matches(doc, d),
            _ => Err(bad_filter(format!("{op} entries must be documents"))),
        })
        .collect()
}

/// Evaluates one field condition against the values found at its path.
pub(crate) fn matches_field(candidates: &[&Bson], cond: &Bson) -> Result<bool, StorageFailure> {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => matches_operators(candidates, ops),
        #[cfg(feature = "regex")]
        Bson::RegularExpression(re) => regex_matches(candidates, re.pattern.as_str(), re.options.as_str()),
        target => Ok(candidates.iter().any(|c| matches_eq(c, target))
            || (matches!(target, Bson::Null) && candidates.is_empty())),
    }
}

fn matches_operators(candidates: &[&Bson], ops: &Document) -> Result<bool, StorageFailure> {
    let options = ops.get_str("$options").unwrap_or("");
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => matches_field(candidates, arg)?,
            "$ne" => !matches_field(candidates, arg)?,
            "$gt" => candidates.iter().any(|c| matches_cmp(c, arg, Ordering::is_gt)),
            "$gte" => candidates.iter().any(|c| matches_cmp(c, arg, Ordering::is_ge)),
            "$lt" => candidates.iter().any(|c| matches_cmp(c, arg, Ordering::is_lt)),
            "$lte" => candidates.iter().any(|c| matches_cmp(c, arg, Ordering::is_le)),
            "$in" => in_list(candidates, arg, op)?,
            "$nin" => !in_list(candidates, arg, op)?,
            "$exists" => {
                let want = match arg {
                    Bson::Boolean(b) => *b,
                    other => as_f64(other).is_some_and(|n| n != 0.0),
                };
                candidates.is_empty() != want
            }
            "$size" => {
                let n = as_f64(arg).ok_or_else(|| bad_filter("$size needs a number"))?;
                candidates.iter().any(|c| matches!(c, Bson::Array(a) if (a.len() as f64 - n).abs() < f64::EPSILON))
            }
            "$all" => {
                let Bson::Array(wanted) = arg else { return Err(bad_filter("$all needs an array")) };
                !wanted.is_empty() && wanted.iter().all(|w| candidates.iter().any(|c| matches_eq(c, w)))
            }
            "$elemMatch" => {
                let Bson::Document(sub) = arg else { return Err(bad_filter("$elemMatch needs a document")) };
                elem_match(candidates, sub)?
            }
            "$mod" => modulo(candidates, arg)?,
            "$type" => {
                let mut any = false;
                for c in candidates {
                    if type_matches(c, arg)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$not" => !matches_field(candidates, arg)?,
            "$regex" => {
                let pattern = match arg {
                    Bson::String(s) => s.as_str(),
                    Bson::RegularExpression(re) => re.pattern.as_str(),
                    _ => return Err(bad_filter("$regex needs a string")),
                };
                regex_matches(candidates, pattern, options)?
            }
            "$options" => true,
            "$near" | "$nearSphere" | "$geoWithin" | "$geoIntersects" | "$maxDistance" => {
                return Err(unsupported(op));
            }
            other => return Err(bad_filter(format!("unknown operator {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(candidates: &[&Bson], arg: &Bson, op: &str) -> Result<bool, StorageFailure> {
    let Bson::Array(list) = arg else { return Err(bad_filter(format!("{op} needs an array"))) };
    let null_wanted = list.iter().any(|v| matches!(v, Bson::Null));
    Ok(list.iter().any(|v| candidates.iter().any(|c| matches_eq(c, v))) || (null_wanted && candidates.is_empty()))
}

fn elem_match(candidates: &[&Bson], sub: &Document) -> Result<bool, StorageFailure> {
    let operator_form = is_operator_doc(sub);
    for c in candidates {
        let Bson::Array(items) = c else { continue };
        for item in items {
            let hit = match item {
                Bson::Document(d) if !operator_form => matches(d, sub)?,
                value if operator_form => matches_operators(&[value], sub)?,
                _ => false,
            };
            if hit {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[allow(clippy::cast_possible_truncation)]
fn modulo(candidates: &[&Bson], arg: &Bson) -> Result<bool, StorageFailure> {
    let (divisor, remainder) = match arg {
        Bson::Array(a) if a.len() == 2 => match (as_f64(&a[0]), as_f64(&a[1])) {
            (Some(d), Some(r)) if d as i64 != 0 => (d as i64, r as i64),
            _ => return Err(bad_filter("$mod needs [divisor, remainder] with a non-zero divisor")),
        },
        _ => return Err(bad_filter("$mod needs [divisor, remainder]")),
    };
    Ok(candidates.iter().any(|c| as_f64(c).is_some_and(|n| (n as i64).wrapping_rem(divisor) == remainder)))
}

/// Orders documents by a `{path: 1|-1}` sort document.
pub(crate) fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, dir) in sort.iter().take(MAX_SORT_FIELDS) {
        if path == "$natural" {
            continue;
        }
        let va = lookup(a, path).into_iter().next();
        let vb = lookup(b, path).into_iter().next();
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if as_f64(dir).is_some_and(|d| d < 0.0) { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// True when the sort asks for reverse insertion order.
pub(crate) fn natural_descending(sort: &Document) -> bool {
    sort.get("$natural").and_then(as_f64).is_some_and(|d| d < 0.0)
}

/// Applies an inclusion or exclusion projection.
pub(crate) fn project(doc: &Document, projection: &Document) -> Document {
    let include_id = projection.get("_id").and_then(as_f64).is_none_or(|v| v != 0.0);
    let inclusive = projection.iter().any(|(k, v)| k != "_id" && as_f64(v).is_some_and(|n| n != 0.0));
    if inclusive {
        let mut out = Document::new();
        if include_id && let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
        for (path, v) in projection {
            if path == "_id" || as_f64(v).is_some_and(|n| n == 0.0) {
                continue;
            }
            if let Some(value) = lookup(doc, path).into_iter().next() {
                super::apply::set_path(&mut out, path, value.clone()).ok();
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (path, _) in projection {
            if path != "_id" || !include_id {
                super::apply::remove_path(&mut out, path);
            }
        }
        out
    }
}
