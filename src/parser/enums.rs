//! Enum collection: a two-pass AST scan run before interface walking.
//!
//! Pass one finds type declarations whose doc block terminates with the
//! `//gospeak:enum` marker and registers an enum entry for each. Pass
//! two attaches values from typed constants: every constant's trailing
//! line comment carries the serialized value in quoted form
//! (`// "active"`), and a missing or empty value is a hard error.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::TypeError;
use crate::go::ast::{Decl, TypeExpr};
use crate::schema::{BasicKind, Type, TypeField, TypeKind, VarType};

use super::Parser;

const ENUM_MARKER: &str = "//gospeak:enum";

impl Parser<'_> {
    pub fn collect_enums(&mut self) -> Result<(), TypeError> {
        self.collect_enum_decls()?;
        self.collect_enum_consts()
    }

    fn collect_enum_decls(&mut self) -> Result<(), TypeError> {
        for file in &self.pkg.files {
            for decl in &file.decls {
                let Decl::Type(spec) = decl else { continue };
                let Some((marker, doc)) = spec.docs.split_last() else {
                    continue;
                };
                if marker.trim() != ENUM_MARKER {
                    continue;
                }

                let backing = match &spec.expr {
                    TypeExpr::Name(name) => BasicKind::from_go_name(name),
                    _ => None,
                }
                .ok_or_else(|| TypeError::EnumNotBasic {
                    enum_name: spec.name.clone(),
                })?;

                let comments: Vec<String> = doc
                    .iter()
                    .map(|line| line.trim_start_matches('/').trim().to_owned())
                    .filter(|line| !line.is_empty())
                    .collect();

                let def = Rc::new(RefCell::new(Type {
                    kind: TypeKind::Enum,
                    name: spec.name.clone(),
                    inner: Some(VarType::basic(backing).shared()),
                    fields: Vec::new(),
                    comments,
                }));
                self.enums.insert(spec.name.clone(), def);
            }
        }
        Ok(())
    }

    fn collect_enum_consts(&mut self) -> Result<(), TypeError> {
        for file in &self.pkg.files {
            for decl in &file.decls {
                let Decl::Const(specs) = decl else { continue };
                // Constants without a declared type continue the
                // previous spec's enum, matching how `iota` blocks read.
                let mut current: Option<String> = None;
                for spec in specs {
                    match &spec.ty {
                        Some(TypeExpr::Name(name)) if self.enums.contains_key(name) => {
                            current = Some(name.clone());
                        }
                        Some(_) => {
                            current = None;
                        }
                        None if spec.has_value => {
                            current = None;
                        }
                        None => {}
                    }
                    let Some(enum_name) = current.clone() else {
                        continue;
                    };

                    let value = value_comment(spec.trailing.as_deref()).ok_or_else(|| {
                        TypeError::EnumMissingValue {
                            enum_name: enum_name.clone(),
                            constant: spec.names.first().cloned().unwrap_or_default(),
                        }
                    })?;

                    let def = &self.enums[&enum_name];
                    for name in &spec.names {
                        def.borrow_mut()
                            .fields
                            .push(TypeField::value(name.as_str(), value.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Extracts the quoted serialized value from a trailing comment like
/// `// "active"`. The backing integer is deliberately discarded; the
/// label is the value.
fn value_comment(trailing: Option<&str>) -> Option<String> {
    let text = trailing?.strip_prefix("//")?.trim();
    let value: String = serde_json::from_str(text).ok()?;
    (!value.is_empty()).then_some(value)
}
