use bson::Document;

use super::criteria::RenderContext;
use crate::errors::OdmError;

/// One sort key. Paths are resolved against the bound type when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    path: String,
    direction: i32,
}

impl Sort {
    #[must_use]
    pub fn ascending(path: &str) -> Self {
        Self { path: path.to_string(), direction: 1 }
    }

    #[must_use]
    pub fn descending(path: &str) -> Self {
        Self { path: path.to_string(), direction: -1 }
    }

    /// Insertion order.
    #[must_use]
    pub fn natural_ascending() -> Self {
        Self { path: "$natural".to_string(), direction: 1 }
    }

    #[must_use]
    pub fn natural_descending() -> Self {
        Self { path: "$natural".to_string(), direction: -1 }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn direction(&self) -> i32 {
        self.direction
    }
}

/// Parses `"-age, name"` into sort keys; a leading `-` sorts descending.
///
/// # Errors
/// Returns `IllegalArgument` for an empty key such as `"a,,b"` or `"-"`.
pub fn parse_order(order: &str) -> Result<Vec<Sort>, OdmError> {
    if order.trim().is_empty() {
        return Ok(Vec::new());
    }
    order
        .split(',')
        .map(|part| {
            let part = part.trim();
            let (path, sort) = match part.strip_prefix('-') {
                Some(p) => (p.trim(), Sort::descending(p.trim())),
                None => (part, Sort::ascending(part)),
            };
            if path.is_empty() {
                return Err(OdmError::IllegalArgument(format!("empty sort key in '{order}'")));
            }
            Ok(sort)
        })
        .collect()
}

/// Renders sort keys as `{path: 1|-1}` in order.
///
/// # Errors
/// Returns `InvalidFieldPath` when a path does not resolve.
pub(crate) fn render_sort(sorts: &[Sort], ctx: &RenderContext<'_>) -> Result<Option<Document>, OdmError> {
    if sorts.is_empty() {
        return Ok(None);
    }
    let mut out = Document::new();
    for s in sorts {
        let path = if s.path == "$natural" { s.path.clone() } else { ctx.resolve(&s.path)? };
        out.insert(path, s.direction);
    }
    Ok(Some(out))
}

/// Renders `{path: 1|0}`. Inclusions and exclusions cannot be mixed, except
/// for excluding `_id`.
///
/// # Errors
/// Returns `IllegalArgument` for a mixed projection and `InvalidFieldPath`
/// when a path does not resolve.
pub(crate) fn render_projection(
    fields: &[(String, bool)],
    ctx: &RenderContext<'_>,
) -> Result<Option<Document>, OdmError> {
    if fields.is_empty() {
        return Ok(None);
    }
    let mut out = Document::new();
    let mut include: Option<bool> = None;
    for (path, inc) in fields {
        let resolved = ctx.resolve(path)?;
        if resolved != "_id" {
            match include {
                Some(mode) if mode != *inc => {
                    return Err(OdmError::IllegalArgument(
                        "a projection cannot both include and exclude fields".into(),
                    ));
                }
                _ => include = Some(*inc),
            }
        }
        out.insert(resolved, i32::from(*inc));
    }
    Ok(Some(out))
}
