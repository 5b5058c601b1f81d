//! Predeclared identifiers and well-known imported packages.
//!
//! The loader checks schema packages without a Go toolchain, so types
//! from imported packages have to come from somewhere. This scope covers
//! the imports schema packages conventionally use: `time` (whose `Time`
//! is the timestamp sentinel), `context` (the handle every service
//! method leads with), and `github.com/google/uuid` (a text-marshaled
//! id type). A selector into any other package is a resolution error.

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::types::{
    Basic, GoType, InterfaceType, MethodDecl, MethodSig, Named, Param, Signature, StructType, Ty,
};

/// All Go basic type names, including the unrepresentable ones; the
/// basic-type mapper rejects those downstream with a clear error.
const BASIC_NAMES: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "float32", "float64", "complex64", "complex128", "byte",
    "rune",
];

#[derive(Debug)]
pub struct Universe {
    basics: FxHashMap<&'static str, Ty>,
    error_ty: Ty,
    any_ty: Ty,
    packages: FxHashMap<&'static str, IndexMap<&'static str, Ty>>,
}

impl Universe {
    pub fn new() -> Self {
        let basics: FxHashMap<&'static str, Ty> = BASIC_NAMES
            .iter()
            .map(|&name| (name, Rc::new(GoType::Basic(Basic { name }))))
            .collect();

        let byte = basics["byte"].clone();
        let int64 = basics["int64"].clone();

        let error_ty: Ty = Rc::new(GoType::Named(Named::with_underlying(
            "",
            "error",
            Rc::new(GoType::Interface(InterfaceType::empty())),
        )));
        let any_ty: Ty = Rc::new(GoType::Interface(InterfaceType::empty()));

        let byte_slice: Ty = Rc::new(GoType::Slice(byte.clone()));

        let mut packages = FxHashMap::default();
        packages.insert("time", {
            let mut time = IndexMap::new();
            time.insert(
                "Time",
                Rc::new(GoType::Named(Named::with_underlying(
                    "time",
                    "Time",
                    Rc::new(GoType::Struct(StructType { fields: Vec::new() })),
                ))),
            );
            time.insert(
                "Duration",
                Rc::new(GoType::Named(Named::with_underlying(
                    "time",
                    "Duration",
                    int64,
                ))),
            );
            time
        });
        packages.insert("context", {
            let mut context = IndexMap::new();
            context.insert(
                "Context",
                Rc::new(GoType::Named(Named::with_underlying(
                    "context",
                    "Context",
                    Rc::new(GoType::Interface(InterfaceType::empty())),
                ))),
            );
            context
        });
        packages.insert("github.com/google/uuid", {
            let uuid = Named::with_underlying(
                "github.com/google/uuid",
                "UUID",
                Rc::new(GoType::Array("16".to_owned(), byte)),
            );
            uuid.methods.borrow_mut().extend([
                MethodDecl {
                    name: "MarshalText".to_owned(),
                    pointer_recv: false,
                    sig: MethodSig::Resolved(Signature {
                        params: Vec::new(),
                        results: vec![
                            Param {
                                name: None,
                                ty: byte_slice.clone(),
                            },
                            Param {
                                name: None,
                                ty: error_ty.clone(),
                            },
                        ],
                    }),
                },
                MethodDecl {
                    name: "UnmarshalText".to_owned(),
                    pointer_recv: true,
                    sig: MethodSig::Resolved(Signature {
                        params: vec![Param {
                            name: Some("data".to_owned()),
                            ty: byte_slice,
                        }],
                        results: vec![Param {
                            name: None,
                            ty: error_ty.clone(),
                        }],
                    }),
                },
            ]);
            let mut pkg = IndexMap::new();
            pkg.insert("UUID", Rc::new(GoType::Named(uuid)));
            pkg
        });

        Self {
            basics,
            error_ty,
            any_ty,
            packages,
        }
    }

    pub fn basic(&self, name: &str) -> Option<Ty> {
        self.basics.get(name).cloned()
    }

    pub fn error_type(&self) -> Ty {
        self.error_ty.clone()
    }

    pub fn any_type(&self) -> Ty {
        self.any_ty.clone()
    }

    pub fn knows_package(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub fn lookup(&self, path: &str, name: &str) -> Option<Ty> {
        self.packages.get(path)?.get(name).cloned()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::types::underlying;

    #[test]
    fn well_known_lookups() {
        let universe = Universe::new();
        assert!(universe.basic("int64").is_some());
        assert!(universe.basic("uintptr").is_some());
        assert!(universe.basic("Foo").is_none());

        let time = universe.lookup("time", "Time").unwrap();
        let GoType::Named(named) = &*time else {
            panic!("expected named")
        };
        assert_eq!(named.pkg, "time");

        assert!(universe.lookup("time", "Nope").is_none());
        assert!(!universe.knows_package("net/http"));
    }

    #[test]
    fn uuid_carries_text_marshaler_methods() {
        let universe = Universe::new();
        let uuid = universe.lookup("github.com/google/uuid", "UUID").unwrap();
        let GoType::Named(named) = &*uuid else {
            panic!("expected named")
        };
        let methods = named.methods.borrow();
        assert_eq!(methods.len(), 2);
        assert!(matches!(&*underlying(&uuid), GoType::Array(len, _) if len == "16"));
    }
}
