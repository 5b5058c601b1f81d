//! The language-neutral interface description schema (IDL).
//!
//! The schema is a pointer-linked graph: named [`Type`]s are owned by the
//! [`Schema`] and referenced from fields and arguments through shared
//! [`VarType`] cells. Sharing is what lets recursive Go types terminate:
//! the walker installs a placeholder cell before descending and fills it
//! in afterwards, so every observer of a cycle ends up holding the same
//! cell. Serialization never follows back-references; a nested `VarType`
//! renders as its canonical `expr` string and the name-indexed entry in
//! [`Schema::types`] is authoritative.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

pub const WEBRPC_VERSION: &str = "v1";

/// A shared, fillable reference to a [`VarType`].
pub type VarRef = Rc<RefCell<VarType>>;

/// A shared reference to a named schema [`Type`].
pub type TypeRef = Rc<RefCell<Type>>;

/// Root record of one generated schema, keyed by interface name.
#[derive(Debug, Default)]
pub struct Schema {
    pub webrpc_version: String,
    pub schema_name: String,
    pub schema_version: String,
    /// Named types in first-registration order. A struct containing a
    /// named sub-struct appears after its dependencies, because the
    /// walker registers the leaf before returning to the parent.
    pub types: Vec<TypeRef>,
    pub services: Vec<Service>,
}

impl Schema {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            webrpc_version: WEBRPC_VERSION.to_owned(),
            schema_name: schema_name.into(),
            schema_version: String::new(),
            types: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Returns the registered type with the given name, if any.
    pub fn get_type(&self, name: &str) -> Option<TypeRef> {
        self.types
            .iter()
            .find(|ty| ty.borrow().name == name)
            .cloned()
    }

    /// Renders the schema in its canonical JSON form.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Schema", 5)?;
        s.serialize_field("webrpcVersion", &self.webrpc_version)?;
        s.serialize_field("schemaName", &self.schema_name)?;
        s.serialize_field("schemaVersion", &self.schema_version)?;
        s.serialize_field("types", &SerializeTypes(&self.types))?;
        s.serialize_field("services", &self.services)?;
        s.end()
    }
}

struct SerializeTypes<'a>(&'a [TypeRef]);

impl Serialize for SerializeTypes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|ty| SerializeType(ty)))
    }
}

struct SerializeType<'a>(&'a TypeRef);

impl Serialize for SerializeType<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ty = self.0.borrow();
        let mut s = serializer.serialize_map(None)?;
        s.serialize_entry("kind", ty.kind.as_str())?;
        s.serialize_entry("name", &ty.name)?;
        if let Some(inner) = &ty.inner {
            s.serialize_entry("type", &SerializeVar(inner))?;
        }
        s.serialize_entry("fields", &ty.fields)?;
        if !ty.comments.is_empty() {
            s.serialize_entry("comments", &ty.comments)?;
        }
        s.end()
    }
}

/// One service per annotated interface.
#[derive(Debug)]
pub struct Service {
    pub name: String,
    pub methods: Vec<Method>,
}

impl Serialize for Service {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Service", 2)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("methods", &self.methods)?;
        s.end()
    }
}

#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub inputs: Vec<MethodArgument>,
    pub outputs: Vec<MethodArgument>,
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Method", 3)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("inputs", &self.inputs)?;
        s.serialize_field("outputs", &self.outputs)?;
        s.end()
    }
}

/// The role of a method argument within its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRole {
    Input,
    Output,
}

#[derive(Debug)]
pub struct MethodArgument {
    /// Synthesized as `argN`/`retN` when the source omits a name.
    pub name: String,
    pub ty: VarRef,
    pub role: ArgRole,
}

impl Serialize for MethodArgument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MethodArgument", 2)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("type", &SerializeVar(&self.ty))?;
        s.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Struct,
    Enum,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Enum => "enum",
        }
    }
}

/// A named schema type: a struct synthesized from a Go struct, or an
/// enum collected from a marker-tagged type declaration.
#[derive(Debug)]
pub struct Type {
    pub kind: TypeKind,
    pub name: String,
    /// The backing primitive, for enums.
    pub inner: Option<VarRef>,
    pub fields: Vec<TypeField>,
    pub comments: Vec<String>,
}

/// A struct field or an enum value.
#[derive(Debug, Clone)]
pub struct TypeField {
    /// The IDL/JSON name, after tag renames.
    pub name: String,
    /// Absent for enum value fields.
    pub ty: Option<VarRef>,
    pub optional: bool,
    /// The serialized value, for enum fields.
    pub value: String,
    pub meta: Vec<TypeFieldMeta>,
}

impl TypeField {
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            optional: false,
            value: value.into(),
            meta: Vec::new(),
        }
    }
}

impl Serialize for TypeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_map(None)?;
        s.serialize_entry("name", &self.name)?;
        if let Some(ty) = &self.ty {
            s.serialize_entry("type", &SerializeVar(ty))?;
            s.serialize_entry("optional", &self.optional)?;
        }
        if !self.value.is_empty() {
            s.serialize_entry("value", &self.value)?;
        }
        if !self.meta.is_empty() {
            s.serialize_entry("meta", &self.meta)?;
        }
        s.end()
    }
}

/// A single `{key: value}` metadata entry. Canonical keys record the
/// original Go declaration: `go.field.name`, `go.field.type`,
/// `go.type.import`, and `go.tag.json`.
#[derive(Debug, Clone)]
pub struct TypeFieldMeta {
    pub key: String,
    pub value: String,
}

impl TypeFieldMeta {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Serialize for TypeFieldMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_map(Some(1))?;
        s.serialize_entry(&self.key, &self.value)?;
        s.end()
    }
}

/// The restricted IDL type vocabulary every Go type collapses into.
#[derive(Debug, Clone)]
pub enum VarKind {
    /// A placeholder installed by the walker before it descends;
    /// observable only while a cycle is being closed.
    Unresolved,
    Basic(BasicKind),
    Timestamp,
    Any,
    List { elem: VarRef },
    Map { key: VarRef, value: VarRef },
    Struct { name: String, def: TypeRef },
}

/// A resolved IDL type, carrying the canonical textual `expr` used for
/// display and diffing (e.g. `[]Pet`, `map<string,int64>`, `timestamp`).
#[derive(Debug, Clone)]
pub struct VarType {
    pub expr: String,
    pub kind: VarKind,
}

impl VarType {
    pub fn unresolved(expr: impl Into<String>) -> VarRef {
        Rc::new(RefCell::new(Self {
            expr: expr.into(),
            kind: VarKind::Unresolved,
        }))
    }

    pub fn basic(kind: BasicKind) -> Self {
        Self {
            expr: kind.as_str().to_owned(),
            kind: VarKind::Basic(kind),
        }
    }

    pub fn timestamp() -> Self {
        Self {
            expr: "timestamp".to_owned(),
            kind: VarKind::Timestamp,
        }
    }

    pub fn any() -> Self {
        Self {
            expr: "any".to_owned(),
            kind: VarKind::Any,
        }
    }

    pub fn list(elem: VarRef) -> Self {
        let expr = format!("[]{}", elem.borrow().expr);
        Self {
            expr,
            kind: VarKind::List { elem },
        }
    }

    pub fn map(key: VarRef, value: VarRef) -> Self {
        let expr = format!("map<{},{}>", key.borrow().expr, value.borrow().expr);
        Self {
            expr,
            kind: VarKind::Map { key, value },
        }
    }

    pub fn strukt(name: impl Into<String>, def: TypeRef) -> Self {
        let name = name.into();
        Self {
            expr: name.clone(),
            kind: VarKind::Struct { name, def },
        }
    }

    pub fn shared(self) -> VarRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_basic(&self) -> bool {
        matches!(self.kind, VarKind::Basic(_))
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

struct SerializeVar<'a>(&'a VarRef);

impl Serialize for SerializeVar<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.borrow().expr)
    }
}

/// IDL core primitive kinds and their canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Null,
    Byte,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
}

impl BasicKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Byte => "byte",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    /// Table-driven mapping from Go primitive names to IDL core kinds.
    /// `rune` collapses to its underlying `int32`. Unrecognized names
    /// (`uintptr`, `complex64`, ...) are not representable.
    pub fn from_go_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "byte" => Self::Byte,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" | "rune" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_type_exprs() {
        let elem = VarType::basic(BasicKind::Int64).shared();
        let list = VarType::list(elem);
        assert_eq!(list.expr, "[]int64");

        let key = VarType::basic(BasicKind::String).shared();
        let value = VarType::basic(BasicKind::Int64).shared();
        assert_eq!(VarType::map(key, value).expr, "map<string,int64>");
    }

    #[test]
    fn placeholder_fill_is_visible_to_all_observers() {
        let cell = VarType::unresolved("Node");
        let alias = cell.clone();
        *cell.borrow_mut() = VarType::basic(BasicKind::String);
        assert_eq!(alias.borrow().expr, "string");
        assert!(alias.borrow().is_basic());
    }

    #[test]
    fn meta_serializes_as_single_entry_maps() {
        let field = TypeField {
            name: "id".to_owned(),
            ty: Some(VarType::basic(BasicKind::Int64).shared()),
            optional: true,
            value: String::new(),
            meta: vec![
                TypeFieldMeta::new("go.field.name", "ID"),
                TypeFieldMeta::new("go.tag.json", "id,omitempty"),
            ],
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "id",
                "type": "int64",
                "optional": true,
                "meta": [
                    {"go.field.name": "ID"},
                    {"go.tag.json": "id,omitempty"},
                ],
            })
        );
    }

    #[test]
    fn unknown_basic_names_are_rejected() {
        assert_eq!(BasicKind::from_go_name("uintptr"), None);
        assert_eq!(BasicKind::from_go_name("complex64"), None);
        assert_eq!(BasicKind::from_go_name("rune"), Some(BasicKind::Int32));
    }
}
