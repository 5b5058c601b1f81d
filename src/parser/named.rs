//! The type walker: resolves any Go type to an IDL [`VarType`].
//!
//! Memoization discipline, on which cycle termination rests:
//!
//! 1. Probe the identity-keyed cache; on a hit, return the cached cell.
//! 2. On a miss, install a placeholder cell under the key *before*
//!    descending. Recursive calls for the same type identity (linked
//!    lists, mutually recursive structs, ...) return the placeholder.
//! 3. Once the recursion produces the final value, assign through the
//!    placeholder so every cycle-closing observer sees the filled value.

use std::rc::Rc;

use by_address::ByAddress;

use crate::error::TypeError;
use crate::go::types::{Basic, GoType, Named, Ty, type_string, underlying};
use crate::schema::{BasicKind, VarRef, VarType};

use super::{marshaler, Parser};

/// How one dispatch step concluded: either a fresh value for the
/// placeholder, or another cache cell whose value is copied into it.
enum Resolution {
    Val(VarType),
    Ref(VarRef),
}

impl Parser<'_> {
    pub fn parse_type(&mut self, ty: &Ty) -> Result<VarRef, TypeError> {
        self.parse_named_type("", ty)
    }

    pub(super) fn parse_named_type(
        &mut self,
        type_name: &str,
        ty: &Ty,
    ) -> Result<VarRef, TypeError> {
        if let Some(hit) = self.parsed.get(&ByAddress(ty.clone())) {
            return Ok(hit.clone());
        }

        // Claim the cache key up-front and fill the cell in afterwards;
        // meanwhile any recursive call for the same type identity
        // returns this same cell. The placeholder's expr names the type
        // so cycle-closing composites render correctly mid-walk.
        let hint = match (type_name, &**ty) {
            ("", GoType::Named(_)) => type_string(ty),
            _ => type_name.to_owned(),
        };
        let placeholder = VarType::unresolved(hint);
        self.parsed.insert(ByAddress(ty.clone()), placeholder.clone());

        match self.resolve(type_name, ty)? {
            Resolution::Val(value) => *placeholder.borrow_mut() = value,
            Resolution::Ref(cell) => {
                if matches!(cell.borrow().kind, crate::schema::VarKind::Unresolved) {
                    // The delegate is still being resolved: this walk
                    // closed a cycle through a wrapper (e.g. a pointer
                    // back to a struct in progress). Alias the cache to
                    // the shared cell so the eventual fill is visible to
                    // every observer; our placeholder never escaped.
                    self.parsed.insert(ByAddress(ty.clone()), cell.clone());
                    return Ok(cell);
                }
                if !Rc::ptr_eq(&placeholder, &cell) {
                    let value = cell.borrow().clone();
                    *placeholder.borrow_mut() = value;
                }
            }
        }
        Ok(placeholder)
    }

    fn resolve(&mut self, type_name: &str, ty: &Ty) -> Result<Resolution, TypeError> {
        match &**ty {
            GoType::Named(named) => self.resolve_named(ty, named),
            GoType::Basic(basic) => Ok(Resolution::Val(parse_basic(basic)?)),
            GoType::Struct(st) => Ok(Resolution::Val(self.parse_struct(type_name, st)?)),
            GoType::Slice(elem) | GoType::Array(_, elem) => {
                let elem = self.parse_named_type(type_name, elem)?;
                Ok(Resolution::Val(VarType::list(elem)))
            }
            GoType::Map(key, value) => {
                let key_var = self.parse_named_type(type_name, key)?;
                if !key_var.borrow().is_basic() {
                    return Err(TypeError::MapKeyNotBasic {
                        key: type_string(key),
                    });
                }
                let value_var = self.parse_named_type(type_name, value)?;
                Ok(Resolution::Val(VarType::map(key_var, value_var)))
            }
            GoType::Interface(_) => Ok(Resolution::Val(VarType::any())),
            GoType::Pointer(elem) => {
                if matches!(&*underlying(elem), GoType::Pointer(_)) {
                    return Err(TypeError::PointerChain {
                        name: type_string(ty),
                    });
                }
                // Pointer-ness is recorded at the field level; the walker
                // just unwraps to the pointee.
                let hint = if type_name.is_empty() {
                    type_string(elem)
                } else {
                    type_name.to_owned()
                };
                Ok(Resolution::Ref(self.parse_named_type(&hint, elem)?))
            }
            GoType::Func(_) | GoType::Chan(_) => Err(TypeError::Unsupported {
                name: type_string(ty),
            }),
        }
    }

    fn resolve_named(&mut self, ty: &Ty, named: &Named) -> Result<Resolution, TypeError> {
        let go_name = type_string(ty);

        if named.pkg == "time" && named.name == "Time" {
            return Ok(Resolution::Val(VarType::timestamp()));
        }

        // Enums are collected before walking; a field typed `Status`
        // resolves to the pre-registered enum entry, which joins the
        // schema's types on first reference.
        if named.is_local()
            && let Some(def) = self.enums.get(&named.name).cloned()
        {
            if self.schema.get_type(&named.name).is_none() {
                self.schema.types.push(def.clone());
            }
            return Ok(Resolution::Val(VarType::strukt(named.name.as_str(), def)));
        }

        if marshaler::is_text_marshaler(self.pkg, ty) {
            return Ok(Resolution::Val(VarType::basic(BasicKind::String)));
        }

        // The structural underlying, with intermediate named types
        // collapsed the way the host type system collapses them.
        let under = underlying(ty);
        if Rc::ptr_eq(&under, ty) {
            return Err(TypeError::Unsupported {
                name: go_name.clone(),
            });
        }

        match &*under {
            // Named pointer, `type NamedPtr *Obj`; the IDL can't express
            // that, so walk the pointee under its own name.
            GoType::Pointer(_) => {
                Ok(Resolution::Ref(self.parse_named_type(&type_string(&under), &under)?))
            }

            // Named slice/array, `type Tags []Tag`.
            GoType::Slice(elem) | GoType::Array(_, elem) => {
                if marshaler::is_json_marshaler(self.pkg, ty) {
                    return Ok(Resolution::Val(VarType::list(VarType::any().shared())));
                }
                if let GoType::Basic(basic) = &*underlying(elem) {
                    let elem = parse_basic(basic)?;
                    return Ok(Resolution::Val(VarType::list(elem.shared())));
                }
                Ok(Resolution::Ref(self.parse_named_type(&type_string(&under), &under)?))
            }

            _ => {
                if marshaler::is_json_marshaler(self.pkg, ty) {
                    return Ok(Resolution::Val(VarType::any()));
                }
                Ok(Resolution::Ref(self.parse_named_type(&go_name, &under)?))
            }
        }
    }
}

fn parse_basic(basic: &Basic) -> Result<VarType, TypeError> {
    BasicKind::from_go_name(basic.name)
        .map(VarType::basic)
        .ok_or_else(|| TypeError::UnknownBasic {
            name: basic.name.to_owned(),
        })
}
