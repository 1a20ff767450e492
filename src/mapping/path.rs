use std::sync::Arc;

use super::mapper::Mapper;
use super::model::{EntityModel, FieldKind, FieldModel};
use crate::errors::OdmError;

/// A dotted path rewritten to stored field names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    /// Field the path ends on, when the descriptor table knows it.
    pub field: Option<FieldModel>,
    /// True when the path ends on an element of `field` (`values.$`, `values.2`).
    pub element: bool,
}

/// What the next path segment is allowed to address.
#[derive(Debug, Clone)]
enum Scope {
    Model(Arc<EntityModel>),
    Elements(Box<Scope>),
    MapKeys(Box<Scope>),
    Scalar(String),
    Reference(String),
    Opaque,
}

/// `$`, `$[]` and `$[identifier]` are passed through untouched.
#[must_use]
pub fn is_positional(segment: &str) -> bool {
    segment == "$" || (segment.starts_with("$[") && segment.ends_with(']'))
}

/// The stored sub-fields of a reference, `$ref` and `$id`.
fn is_db_ref_part(segment: &str) -> bool {
    segment == "$ref" || segment == "$id"
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl Mapper {
    /// Resolves `path` against `model`, substituting stored names.
    ///
    /// With `validate` off, unknown segments pass through verbatim and
    /// nothing below them is checked. Addressing inside a reference field is
    /// rejected either way; only `$ref` and `$id` may follow one.
    ///
    /// # Errors
    /// Returns `InvalidFieldPath` for an empty path, for segments below a
    /// reference, and, when validating, for unknown segments or segments
    /// addressing inside a scalar.
    pub fn resolve_field_path(
        &self,
        model: &Arc<EntityModel>,
        path: &str,
        validate: bool,
    ) -> Result<ResolvedPath, OdmError> {
        let invalid = |reason: String| OdmError::InvalidFieldPath {
            type_name: model.name.clone(),
            path: path.to_string(),
            reason,
        };
        if path.trim().is_empty() {
            return Err(invalid("path is empty".into()));
        }

        let mut scope = Scope::Model(Arc::clone(model));
        let mut out: Vec<String> = Vec::new();
        let mut field: Option<FieldModel> = None;
        let mut element = false;

        for segment in path.split('.') {
            if segment.is_empty() && validate {
                return Err(invalid("empty segment".into()));
            }
            // Array scopes accept positional/index segments, otherwise fall
            // through to the element type (`children.first`).
            if let Scope::Elements(inner) = scope {
                scope = *inner;
                if is_positional(segment) || is_index(segment) {
                    out.push(segment.to_string());
                    element = true;
                    continue;
                }
            }
            match scope {
                Scope::Model(m) => match m.field(segment) {
                    Some(f) => {
                        out.push(f.stored_name.clone());
                        scope = self.scope_for(f);
                        field = Some(f.clone());
                        element = false;
                    }
                    None if validate => {
                        return Err(invalid(format!("'{segment}' is not a field of {}", m.name)));
                    }
                    None => {
                        out.push(segment.to_string());
                        scope = Scope::Opaque;
                        field = None;
                        element = false;
                    }
                },
                Scope::MapKeys(inner) => {
                    out.push(segment.to_string());
                    scope = *inner;
                    element = true;
                }
                Scope::Scalar(name) if validate => {
                    return Err(invalid(format!("'{name}' is not an embedded type; cannot address '{segment}'")));
                }
                Scope::Reference(name) if !is_db_ref_part(segment) => {
                    return Err(invalid(format!("cannot address '{segment}' through reference '{name}'")));
                }
                Scope::Scalar(_) | Scope::Reference(_) | Scope::Opaque | Scope::Elements(_) => {
                    out.push(segment.to_string());
                    scope = Scope::Opaque;
                    field = None;
                    element = false;
                }
            }
        }

        Ok(ResolvedPath { path: out.join("."), field, element })
    }

    /// Walks the known prefix of `path` and fails only when it addresses
    /// inside a reference field. Builders run this as each path is given;
    /// everything else about the path is checked when rendering.
    ///
    /// # Errors
    /// Returns `InvalidFieldPath` naming the reference field.
    pub fn check_reference_path(&self, model: &Arc<EntityModel>, path: &str) -> Result<(), OdmError> {
        let mut scope = Scope::Model(Arc::clone(model));
        for segment in path.split('.') {
            if let Scope::Elements(inner) = scope {
                scope = *inner;
                if is_positional(segment) || is_index(segment) {
                    continue;
                }
            }
            scope = match scope {
                Scope::Model(m) => match m.field(segment) {
                    Some(f) => self.scope_for(f),
                    None => return Ok(()),
                },
                Scope::MapKeys(inner) => *inner,
                Scope::Reference(name) if !is_db_ref_part(segment) => {
                    return Err(OdmError::InvalidFieldPath {
                        type_name: model.name.clone(),
                        path: path.to_string(),
                        reason: format!("cannot address '{segment}' through reference '{name}'"),
                    });
                }
                _ => return Ok(()),
            };
        }
        Ok(())
    }

    fn scope_for(&self, f: &FieldModel) -> Scope {
        match &f.kind {
            FieldKind::Value => Scope::Scalar(f.name.clone()),
            FieldKind::ValueList => Scope::Elements(Box::new(Scope::Scalar(f.name.clone()))),
            FieldKind::Embedded(m) => Scope::Model(self.model_ref(m)),
            FieldKind::EmbeddedList(m) => Scope::Elements(Box::new(Scope::Model(self.model_ref(m)))),
            FieldKind::Map(Some(m)) => Scope::MapKeys(Box::new(Scope::Model(self.model_ref(m)))),
            FieldKind::Map(None) => Scope::MapKeys(Box::new(Scope::Opaque)),
            FieldKind::Reference(_) => Scope::Reference(f.name.clone()),
            FieldKind::ReferenceList(_) => {
                Scope::Elements(Box::new(Scope::Reference(f.name.clone())))
            }
            FieldKind::Geometry | FieldKind::Document => Scope::Opaque,
        }
    }
}
