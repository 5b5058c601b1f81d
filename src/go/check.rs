//! Name resolution: turns parsed declarations into the type graph.
//!
//! Resolution runs in passes so that declaration order never matters and
//! recursive types come together naturally: all package-level names are
//! declared first, aliases are resolved to their targets, then each named
//! type's underlying is filled in, and finally receiver methods attach to
//! their named types. Method signatures stay unresolved until the
//! method-set probe asks for them, so helper methods referencing types
//! outside the loader's universe don't fail the load.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::SourceError;

use super::ast::{self, Decl, TypeExpr};
use super::types::{
    GoType, IfaceElem, InterfaceMethod, InterfaceType, MethodDecl, MethodSig, Named, Param,
    Signature, StructField, StructType, Ty,
};
use super::universe::Universe;

#[derive(Debug, Clone)]
struct GenericDecl {
    file: usize,
    params: Vec<String>,
    expr: TypeExpr,
}

/// A fully checked schema package: the `(ast, types, typesInfo, imports)`
/// quadruple the core consumes.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub files: Vec<ast::File>,
    scope: RefCell<IndexMap<String, Ty>>,
    generics: FxHashMap<String, GenericDecl>,
    universe: Universe,
    inst_cache: RefCell<FxHashMap<String, Ty>>,
}

type Bindings = FxHashMap<String, Ty>;

impl Package {
    pub fn check(pkg_name: String, files: Vec<ast::File>) -> Result<Package, Vec<SourceError>> {
        let mut errors = Vec::new();
        let mut scope: IndexMap<String, Ty> = IndexMap::new();
        let mut generics: FxHashMap<String, GenericDecl> = FxHashMap::default();
        // (file index, name, expr, line) of specs whose underlying is
        // resolved in the second pass.
        let mut pending: Vec<(usize, String, TypeExpr, u32)> = Vec::new();
        let mut aliases: Vec<(usize, String, TypeExpr, u32)> = Vec::new();

        for (idx, file) in files.iter().enumerate() {
            for decl in &file.decls {
                let Decl::Type(spec) = decl else { continue };
                if spec.alias {
                    aliases.push((idx, spec.name.clone(), spec.expr.clone(), spec.line));
                    continue;
                }
                if scope.contains_key(&spec.name) {
                    errors.push(SourceError::new(
                        &file.path,
                        spec.line,
                        format!("{} redeclared in this package", spec.name),
                    ));
                    continue;
                }
                let mut named = Named::new("", spec.name.as_str());
                named.type_params = spec.type_params.clone();
                scope.insert(spec.name.clone(), Rc::new(GoType::Named(named)));
                if spec.type_params.is_empty() {
                    pending.push((idx, spec.name.clone(), spec.expr.clone(), spec.line));
                } else {
                    generics.insert(
                        spec.name.clone(),
                        GenericDecl {
                            file: idx,
                            params: spec.type_params.clone(),
                            expr: spec.expr.clone(),
                        },
                    );
                }
            }
        }

        let pkg = Package {
            name: pkg_name,
            files,
            scope: RefCell::new(scope),
            generics,
            universe: Universe::new(),
            inst_cache: RefCell::new(FxHashMap::default()),
        };

        // Aliases may reference each other in any order; iterate to a
        // fixpoint and report whatever never resolves.
        let mut remaining = aliases;
        loop {
            let mut next = Vec::new();
            let mut progressed = false;
            for (idx, name, expr, line) in remaining {
                match pkg.resolve_expr(idx, None, &expr) {
                    Ok(ty) => {
                        pkg.scope.borrow_mut().insert(name, ty);
                        progressed = true;
                    }
                    Err(_) => next.push((idx, name, expr, line)),
                }
            }
            if next.is_empty() {
                break;
            }
            if !progressed {
                for (idx, name, expr, line) in next {
                    let message = match pkg.resolve_expr(idx, None, &expr) {
                        Err(message) => format!("alias {name}: {message}"),
                        Ok(_) => continue,
                    };
                    errors.push(SourceError::new(&pkg.files[idx].path, line, message));
                }
                break;
            }
            remaining = next;
        }

        let mut decl_lines: FxHashMap<String, (usize, u32)> = FxHashMap::default();
        for (idx, name, expr, line) in &pending {
            decl_lines.insert(name.clone(), (*idx, *line));
            match pkg.resolve_expr(*idx, None, expr) {
                Ok(under) => {
                    if let Some(ty) = pkg.lookup(name) {
                        if let GoType::Named(named) = &*ty {
                            *named.underlying.borrow_mut() = Some(under);
                        }
                    }
                }
                Err(message) => {
                    errors.push(SourceError::new(&pkg.files[*idx].path, *line, message));
                }
            }
        }

        // Named-to-named cycles (`type A B; type B A`) have no structural
        // indirection to break them and are invalid.
        for (name, &(idx, line)) in &decl_lines {
            let Some(start) = pkg.lookup(name) else { continue };
            let mut seen: Vec<*const GoType> = vec![Rc::as_ptr(&start)];
            let mut cur = start;
            loop {
                let next = match &*cur {
                    GoType::Named(named) => match &*named.underlying.borrow() {
                        Some(under) => under.clone(),
                        None => break,
                    },
                    _ => break,
                };
                if !matches!(&*next, GoType::Named(_)) {
                    break;
                }
                if seen.contains(&Rc::as_ptr(&next)) {
                    errors.push(SourceError::new(
                        &pkg.files[idx].path,
                        line,
                        format!("invalid recursive type {name}"),
                    ));
                    break;
                }
                seen.push(Rc::as_ptr(&next));
                cur = next;
            }
        }

        for (idx, file) in pkg.files.iter().enumerate() {
            for decl in &file.decls {
                let Decl::Func(func) = decl else { continue };
                let Some(receiver) = &func.receiver else {
                    continue;
                };
                let Some(ty) = pkg.lookup(&receiver.type_name) else {
                    continue;
                };
                if let GoType::Named(named) = &*ty {
                    named.methods.borrow_mut().push(MethodDecl {
                        name: func.name.clone(),
                        pointer_recv: receiver.pointer,
                        sig: MethodSig::Ast {
                            file: idx,
                            sig: func.sig.clone(),
                        },
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(pkg)
        } else {
            Err(errors)
        }
    }

    /// Looks up a package-level name.
    pub fn lookup(&self, name: &str) -> Option<Ty> {
        self.scope.borrow().get(name).cloned()
    }

    /// Resolves a method declaration's signature on demand. `None` means
    /// the signature references types the loader can't see; the caller
    /// treats that as "does not match".
    pub fn method_signature(&self, decl: &MethodDecl) -> Option<Signature> {
        match &decl.sig {
            MethodSig::Resolved(sig) => Some(sig.clone()),
            MethodSig::Ast { file, sig } => self.resolve_signature(*file, None, sig).ok(),
        }
    }

    fn resolve_signature(
        &self,
        file: usize,
        bindings: Option<&Bindings>,
        sig: &ast::SignatureExpr,
    ) -> Result<Signature, String> {
        let resolve_params = |params: &[ast::ParamExpr]| -> Result<Vec<Param>, String> {
            params
                .iter()
                .map(|param| {
                    let ty = self.resolve_expr(file, bindings, &param.ty)?;
                    let ty = if param.variadic {
                        Rc::new(GoType::Slice(ty))
                    } else {
                        ty
                    };
                    Ok(Param {
                        name: param.name.clone(),
                        ty,
                    })
                })
                .collect()
        };
        Ok(Signature {
            params: resolve_params(&sig.params)?,
            results: resolve_params(&sig.results)?,
        })
    }

    fn resolve_expr(
        &self,
        file: usize,
        bindings: Option<&Bindings>,
        expr: &TypeExpr,
    ) -> Result<Ty, String> {
        match expr {
            TypeExpr::Name(name) => {
                if let Some(bound) = bindings.and_then(|b| b.get(name)) {
                    return Ok(bound.clone());
                }
                if let Some(ty) = self.lookup(name) {
                    if let GoType::Named(named) = &*ty {
                        if !named.type_params.is_empty() {
                            return Err(format!("missing type arguments for generic type {name}"));
                        }
                    }
                    return Ok(ty);
                }
                if let Some(basic) = self.universe.basic(name) {
                    return Ok(basic);
                }
                match name.as_str() {
                    "error" => Ok(self.universe.error_type()),
                    "any" => Ok(self.universe.any_type()),
                    _ => Err(format!("unknown type {name}")),
                }
            }
            TypeExpr::Selector(qualifier, name) => {
                let Some(path) = self.files[file].import_path(qualifier) else {
                    return Err(format!("unknown package {qualifier}"));
                };
                if !self.universe.knows_package(path) {
                    return Err(format!(
                        "package {path} is not available to the loader; only types from \
                         time, context, and github.com/google/uuid can be resolved"
                    ));
                }
                self.universe
                    .lookup(path, name)
                    .ok_or_else(|| format!("unknown type {qualifier}.{name}"))
            }
            TypeExpr::Pointer(elem) => Ok(Rc::new(GoType::Pointer(
                self.resolve_expr(file, bindings, elem)?,
            ))),
            TypeExpr::Slice(elem) => Ok(Rc::new(GoType::Slice(
                self.resolve_expr(file, bindings, elem)?,
            ))),
            TypeExpr::Array(len, elem) => Ok(Rc::new(GoType::Array(
                len.clone(),
                self.resolve_expr(file, bindings, elem)?,
            ))),
            TypeExpr::Map(key, value) => Ok(Rc::new(GoType::Map(
                self.resolve_expr(file, bindings, key)?,
                self.resolve_expr(file, bindings, value)?,
            ))),
            TypeExpr::Struct(fields) => {
                let mut out = Vec::new();
                for field in fields {
                    let ty = self
                        .resolve_expr(file, bindings, &field.ty)
                        .map_err(|msg| format!("field {}: {msg}", field.names.join(", ")))?;
                    for name in &field.names {
                        out.push(StructField {
                            name: name.clone(),
                            ty: ty.clone(),
                            tag: field.tag.clone(),
                            embedded: field.embedded,
                        });
                    }
                }
                Ok(Rc::new(GoType::Struct(StructType { fields: out })))
            }
            TypeExpr::Interface(elems) => {
                let mut out = Vec::new();
                for elem in elems {
                    out.push(match elem {
                        ast::InterfaceElem::Method { name, sig, .. } => {
                            let sig = self
                                .resolve_signature(file, bindings, sig)
                                .map_err(|msg| format!("method {name}: {msg}"))?;
                            IfaceElem::Method(InterfaceMethod {
                                name: name.clone(),
                                sig,
                            })
                        }
                        ast::InterfaceElem::Embedded(ty) => {
                            IfaceElem::Embedded(self.resolve_expr(file, bindings, ty)?)
                        }
                        ast::InterfaceElem::Constraint => IfaceElem::Constraint,
                    });
                }
                Ok(Rc::new(GoType::Interface(InterfaceType { elems: out })))
            }
            TypeExpr::Func(sig) => Ok(Rc::new(GoType::Func(
                self.resolve_signature(file, bindings, sig)?,
            ))),
            TypeExpr::Chan(elem) => Ok(Rc::new(GoType::Chan(
                self.resolve_expr(file, bindings, elem)?,
            ))),
            TypeExpr::Instance(base, args) => self.instantiate(file, bindings, base, args),
        }
    }

    /// Instantiates a generic named type by re-resolving its declaration
    /// with parameters bound to the argument types. Instantiations are
    /// interned per rendered name, and the cache entry is installed
    /// before the underlying resolves so recursive generics terminate.
    fn instantiate(
        &self,
        file: usize,
        bindings: Option<&Bindings>,
        base: &TypeExpr,
        args: &[TypeExpr],
    ) -> Result<Ty, String> {
        let TypeExpr::Name(base_name) = base else {
            return Err(format!("generic type {base} is not available to the loader"));
        };
        let Some(generic) = self.generics.get(base_name) else {
            return Err(format!("{base_name} is not a generic type"));
        };
        if generic.params.len() != args.len() {
            return Err(format!(
                "wrong number of type arguments for {base_name}: got {}, want {}",
                args.len(),
                generic.params.len()
            ));
        }

        let arg_tys = args
            .iter()
            .map(|arg| self.resolve_expr(file, bindings, arg))
            .collect::<Result<Vec<_>, _>>()?;
        let inst_name = format!(
            "{base_name}[{}]",
            arg_tys
                .iter()
                .map(super::types::type_string)
                .collect::<Vec<_>>()
                .join(",")
        );
        if let Some(hit) = self.inst_cache.borrow().get(&inst_name) {
            return Ok(hit.clone());
        }

        let inst: Ty = Rc::new(GoType::Named(Named::new("", inst_name.as_str())));
        if let GoType::Named(named) = &*inst {
            *named.origin.borrow_mut() = self.lookup(base_name);
        }
        self.inst_cache
            .borrow_mut()
            .insert(inst_name.clone(), inst.clone());

        let inner: Bindings = generic
            .params
            .iter()
            .cloned()
            .zip(arg_tys)
            .collect();
        let under = self
            .resolve_expr(generic.file, Some(&inner), &generic.expr)
            .map_err(|msg| format!("instantiating {inst_name}: {msg}"))?;
        if let GoType::Named(named) = &*inst {
            *named.underlying.borrow_mut() = Some(under);
        }
        Ok(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::parse::parse_file;
    use crate::go::types::{type_string, underlying};
    use indoc::indoc;

    fn check(src: &str) -> Package {
        let file = parse_file("test.go", src).unwrap();
        Package::check("test".to_owned(), vec![file]).unwrap()
    }

    #[test]
    fn resolves_recursive_struct() {
        let pkg = check(indoc! {r#"
            package test

            type Node struct {
                Next  *Node
                Value int
            }
        "#});
        let node = pkg.lookup("Node").unwrap();
        let GoType::Struct(st) = &*underlying(&node) else {
            panic!("expected struct")
        };
        let GoType::Pointer(pointee) = &*st.fields[0].ty else {
            panic!("expected pointer")
        };
        // The field's pointee is the same interned allocation.
        assert!(Rc::ptr_eq(pointee, &node));
    }

    #[test]
    fn resolves_mutually_recursive_structs() {
        let pkg = check(indoc! {r#"
            package test

            type A struct{ B *B }
            type B struct{ A *A }
        "#});
        let a = pkg.lookup("A").unwrap();
        let GoType::Struct(st) = &*underlying(&a) else {
            panic!("expected struct")
        };
        let GoType::Pointer(b) = &*st.fields[0].ty else {
            panic!("expected pointer")
        };
        assert!(Rc::ptr_eq(b, &pkg.lookup("B").unwrap()));
    }

    #[test]
    fn rejects_unknown_packages() {
        let file = parse_file(
            "test.go",
            indoc! {r#"
                package test

                import "database/sql"

                type Row struct {
                    Name sql.NullString
                }
            "#},
        )
        .unwrap();
        let errors = Package::check("test".to_owned(), vec![file]).unwrap_err();
        assert!(errors[0].message.contains("database/sql"));
        assert_eq!(errors[0].line, 5);
    }

    #[test]
    fn rejects_named_type_cycles() {
        let file = parse_file("test.go", "package test\n\ntype A B\ntype B A\n").unwrap();
        let errors = Package::check("test".to_owned(), vec![file]).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| e.message.contains("invalid recursive type"))
        );
    }

    #[test]
    fn aliases_resolve_to_their_targets() {
        let pkg = check(indoc! {r#"
            package test

            type Pet struct{ Name string }
            type Animal = Pet
            type Creature = Animal
        "#});
        let pet = pkg.lookup("Pet").unwrap();
        assert!(Rc::ptr_eq(&pkg.lookup("Animal").unwrap(), &pet));
        assert!(Rc::ptr_eq(&pkg.lookup("Creature").unwrap(), &pet));
    }

    #[test]
    fn instantiates_generics_with_interning() {
        let pkg = check(indoc! {r#"
            package test

            type Pet struct{ Name string }

            type Page[T any] struct {
                Items []T
                Next  *Page[T]
            }

            type PetPage Page[Pet]
        "#});
        let pet_page = pkg.lookup("PetPage").unwrap();
        let GoType::Named(named) = &*pet_page else {
            panic!("expected named")
        };
        let inst = named.underlying.borrow().clone().unwrap();
        assert_eq!(type_string(&inst), "Page[Pet]");
        let GoType::Struct(st) = &*underlying(&inst) else {
            panic!("expected struct")
        };
        let GoType::Slice(elem) = &*st.fields[0].ty else {
            panic!("expected slice")
        };
        assert!(Rc::ptr_eq(elem, &pkg.lookup("Pet").unwrap()));
        // The recursive `Next *Page[T]` field reuses the interned
        // instantiation instead of recursing forever.
        let GoType::Pointer(next) = &*st.fields[1].ty else {
            panic!("expected pointer")
        };
        assert!(Rc::ptr_eq(next, &inst));
    }

    #[test]
    fn attaches_receiver_methods() {
        let pkg = check(indoc! {r#"
            package test

            type Locale string

            func (l Locale) MarshalText() ([]byte, error) { return []byte(l), nil }
            func (l *Locale) UnmarshalText(data []byte) error { return nil }
        "#});
        let locale = pkg.lookup("Locale").unwrap();
        let GoType::Named(named) = &*locale else {
            panic!("expected named")
        };
        let methods = named.methods.borrow();
        assert_eq!(methods.len(), 2);
        assert!(!methods[0].pointer_recv);
        assert!(methods[1].pointer_recv);
        let sig = pkg.method_signature(&methods[0]).unwrap();
        assert_eq!(sig.results.len(), 2);
    }
}
