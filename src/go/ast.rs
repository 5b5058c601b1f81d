//! Declaration-level AST for Go source files.
//!
//! Only what the schema core consumes is represented: type declarations
//! (with doc comments), const declarations (with trailing value comments),
//! imports, and method declarations for method-set probing. Function
//! bodies and variable declarations are skipped by the parser and never
//! appear here.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct File {
    pub path: PathBuf,
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

impl File {
    /// Resolves a package qualifier used in this file to its import path.
    pub fn import_path(&self, local: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|imp| imp.local_name() == local)
            .map(|imp| imp.path.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
    pub line: u32,
}

impl Import {
    /// The name this import is referenced by: its alias, or the final
    /// path segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Type(TypeSpec),
    Const(Vec<ConstSpec>),
    Func(FuncDecl),
}

/// One named type declaration. Grouped `type ( ... )` blocks are flattened
/// into one spec per name, each carrying its own doc block.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    /// Raw doc-comment lines (including `//`) directly above the spec.
    pub docs: Vec<String>,
    pub name: String,
    pub type_params: Vec<String>,
    pub alias: bool,
    pub expr: TypeExpr,
    pub line: u32,
}

/// One line of a const declaration. Values are never evaluated; only the
/// declared type and the trailing comment matter to the enum collector.
#[derive(Debug, Clone)]
pub struct ConstSpec {
    pub names: Vec<String>,
    pub ty: Option<TypeExpr>,
    pub has_value: bool,
    /// Trailing line comment (including `//`), if any.
    pub trailing: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub receiver: Option<Receiver>,
    pub name: String,
    pub sig: SignatureExpr,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub pointer: bool,
    /// The receiver's base type name, with any type arguments stripped.
    pub type_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SignatureExpr {
    pub params: Vec<ParamExpr>,
    pub results: Vec<ParamExpr>,
}

/// A single parameter or result; shared-type groups (`a, b int`) are
/// flattened into one entry per name.
#[derive(Debug, Clone)]
pub struct ParamExpr {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name(String),
    /// A qualified name, `pkg.Type`.
    Selector(String, String),
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    /// Array with its length expression kept as literal text.
    Array(String, Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Struct(Vec<FieldExpr>),
    Interface(Vec<InterfaceElem>),
    Func(Box<SignatureExpr>),
    Chan(Box<TypeExpr>),
    /// Generic instantiation, `Name[Args...]`.
    Instance(Box<TypeExpr>, Vec<TypeExpr>),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Selector(pkg, name) => write!(f, "{pkg}.{name}"),
            Self::Pointer(elem) => write!(f, "*{elem}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Array(len, elem) => write!(f, "[{len}]{elem}"),
            Self::Map(key, value) => write!(f, "map[{key}]{value}"),
            Self::Struct(_) => f.write_str("struct{...}"),
            Self::Interface(_) => f.write_str("interface{...}"),
            Self::Func(_) => f.write_str("func(...)"),
            Self::Chan(elem) => write!(f, "chan {elem}"),
            Self::Instance(base, args) => {
                write!(f, "{base}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldExpr {
    /// Field names; for embedded fields, the single unqualified type name.
    pub names: Vec<String>,
    pub ty: TypeExpr,
    /// Decoded struct-tag body, if present.
    pub tag: Option<String>,
    pub embedded: bool,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum InterfaceElem {
    Method {
        name: String,
        sig: SignatureExpr,
        line: u32,
    },
    Embedded(TypeExpr),
    /// A type-set constraint element (`~int | string`); carried so
    /// constraint interfaces parse, never part of a method set.
    Constraint,
}
