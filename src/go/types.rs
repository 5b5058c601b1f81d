//! The resolved Go type graph the walker operates on.
//!
//! Types are reference-counted and named types are interned once per
//! (package, name), so `Rc` pointer identity is a stable cache key: the
//! walker's memoization discipline depends on two references to `Node`
//! resolving to the same allocation. A named type's underlying link lives
//! in a `RefCell` and is filled in a second resolution pass, which is how
//! self-referential and mutually recursive declarations come together.

use std::cell::RefCell;
use std::rc::Rc;

use super::ast;

pub type Ty = Rc<GoType>;

#[derive(Debug)]
pub enum GoType {
    Basic(Basic),
    Named(Named),
    Pointer(Ty),
    Slice(Ty),
    /// Array with its length kept as literal text; lengths are never
    /// evaluated.
    Array(String, Ty),
    Map(Ty, Ty),
    Struct(StructType),
    Interface(InterfaceType),
    Func(Signature),
    Chan(Ty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Basic {
    pub name: &'static str,
}

#[derive(Debug)]
pub struct Named {
    /// Import path of the defining package; empty for the schema package.
    pub pkg: String,
    pub name: String,
    pub underlying: RefCell<Option<Ty>>,
    pub methods: RefCell<Vec<MethodDecl>>,
    pub type_params: Vec<String>,
    /// For generic instantiations, the generic type they came from;
    /// its method set applies to the instantiation.
    pub origin: RefCell<Option<Ty>>,
}

impl Named {
    pub fn new(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            name: name.into(),
            underlying: RefCell::new(None),
            methods: RefCell::new(Vec::new()),
            type_params: Vec::new(),
            origin: RefCell::new(None),
        }
    }

    pub fn with_underlying(pkg: impl Into<String>, name: impl Into<String>, under: Ty) -> Self {
        let named = Self::new(pkg, name);
        *named.underlying.borrow_mut() = Some(under);
        named
    }

    pub fn is_local(&self) -> bool {
        self.pkg.is_empty()
    }
}

/// A receiver method attached to a named type. Signatures stay in AST
/// form until the method-set probe needs them; universe types carry
/// pre-resolved signatures.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub pointer_recv: bool,
    pub sig: MethodSig,
}

#[derive(Debug, Clone)]
pub enum MethodSig {
    Ast { file: usize, sig: ast::SignatureExpr },
    Resolved(Signature),
}

#[derive(Debug)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

#[derive(Debug)]
pub struct StructField {
    /// Declared name; for embedded fields, the unqualified type name.
    pub name: String,
    pub ty: Ty,
    pub tag: Option<String>,
    pub embedded: bool,
}

/// An interface's elements in declaration order. Embedded interfaces are
/// flattened on demand by [`InterfaceType::flattened_methods`].
#[derive(Debug)]
pub struct InterfaceType {
    pub elems: Vec<IfaceElem>,
}

#[derive(Debug)]
pub enum IfaceElem {
    Method(InterfaceMethod),
    Embedded(Ty),
    /// Type-set constraint term; makes the interface unusable as a
    /// service but must not break loading.
    Constraint,
}

#[derive(Debug, Clone)]
pub struct InterfaceMethod {
    pub name: String,
    pub sig: Signature,
}

impl InterfaceType {
    pub fn empty() -> Self {
        Self { elems: Vec::new() }
    }

    /// Methods in declaration order, with embedded interfaces spliced in
    /// at their position. The first occurrence of a name wins.
    pub fn flattened_methods(&self) -> Vec<InterfaceMethod> {
        let mut out: Vec<InterfaceMethod> = Vec::new();
        self.collect_methods(&mut out);
        out
    }

    fn collect_methods(&self, out: &mut Vec<InterfaceMethod>) {
        for elem in &self.elems {
            match elem {
                IfaceElem::Method(method) => {
                    if !out.iter().any(|m| m.name == method.name) {
                        out.push(method.clone());
                    }
                }
                IfaceElem::Embedded(ty) => {
                    if let GoType::Interface(iface) = &*underlying(ty) {
                        iface.collect_methods(out);
                    }
                }
                IfaceElem::Constraint => {}
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Ty,
}

/// Follows named-type chains down to the structural type, like the host
/// type system's `Underlying()`. Named cycles are rejected at check time,
/// so this always terminates.
pub fn underlying(ty: &Ty) -> Ty {
    let mut cur = ty.clone();
    loop {
        let next = match &*cur {
            GoType::Named(named) => match &*named.underlying.borrow() {
                Some(under) => under.clone(),
                None => return cur.clone(),
            },
            _ => return cur,
        };
        cur = next;
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Renders a type the way Go source would spell it, with foreign names
/// qualified by their short package name (`uuid.UUID`, `[]*Pet`).
pub fn type_string(ty: &Ty) -> String {
    match &**ty {
        GoType::Basic(basic) => basic.name.to_owned(),
        GoType::Named(named) => {
            if named.is_local() {
                named.name.clone()
            } else {
                let short = named.pkg.rsplit('/').next().unwrap_or(&named.pkg);
                format!("{short}.{}", named.name)
            }
        }
        GoType::Pointer(elem) => format!("*{}", type_string(elem)),
        GoType::Slice(elem) => format!("[]{}", type_string(elem)),
        GoType::Array(len, elem) => format!("[{len}]{}", type_string(elem)),
        GoType::Map(key, value) => {
            format!("map[{}]{}", type_string(key), type_string(value))
        }
        GoType::Struct(_) => "struct{...}".to_owned(),
        GoType::Interface(iface) if iface.elems.is_empty() => "interface{}".to_owned(),
        GoType::Interface(_) => "interface{...}".to_owned(),
        GoType::Func(_) => "func(...)".to_owned(),
        GoType::Chan(elem) => format!("chan {}", type_string(elem)),
    }
}

/// The originating import path recorded in field metadata; local types
/// and the `time` package yield nothing.
pub fn import_path(ty: &Ty) -> Option<String> {
    match &**ty {
        GoType::Named(named) => {
            if named.pkg.is_empty() || named.pkg == "time" {
                None
            } else {
                Some(named.pkg.clone())
            }
        }
        GoType::Pointer(elem) | GoType::Slice(elem) | GoType::Array(_, elem) => {
            import_path(elem)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(name: &'static str) -> Ty {
        Rc::new(GoType::Basic(Basic { name }))
    }

    #[test]
    fn underlying_follows_named_chains() {
        let int64 = basic("int64");
        let inner = Rc::new(GoType::Named(Named::with_underlying(
            "",
            "Inner",
            int64.clone(),
        )));
        let outer = Rc::new(GoType::Named(Named::with_underlying("", "Outer", inner)));
        assert!(matches!(
            &*underlying(&outer),
            GoType::Basic(Basic { name: "int64" })
        ));
    }

    #[test]
    fn type_strings_qualify_foreign_names() {
        let uuid = Rc::new(GoType::Named(Named::new("github.com/google/uuid", "UUID")));
        assert_eq!(type_string(&uuid), "uuid.UUID");
        let ptr: Ty = Rc::new(GoType::Pointer(uuid.clone()));
        assert_eq!(type_string(&ptr), "*uuid.UUID");
        assert_eq!(import_path(&ptr).as_deref(), Some("github.com/google/uuid"));

        let time = Rc::new(GoType::Named(Named::new("time", "Time")));
        assert_eq!(type_string(&time), "time.Time");
        assert_eq!(import_path(&time), None);

        let local = Rc::new(GoType::Named(Named::new("", "Pet")));
        let slice: Ty = Rc::new(GoType::Slice(Rc::new(GoType::Pointer(local))));
        assert_eq!(type_string(&slice), "[]*Pet");
        assert_eq!(import_path(&slice), None);
    }
}
