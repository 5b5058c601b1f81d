//! Struct synthesis: materializes an IDL struct type from a Go struct.
//!
//! Unexported and `json:"-"` fields are dropped; embedded and
//! `json:",inline"` fields are spliced into the enclosing struct with
//! the same shadowing the host JSON serializer applies; tag semantics
//! (rename, omitempty, string coercion) land on the synthesized field
//! together with metadata recording the original Go declaration.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::TypeError;
use crate::go::types::{
    GoType, StructField, StructType, Ty, import_path, is_exported, type_string, underlying,
};
use crate::schema::{
    BasicKind, Type, TypeField, TypeFieldMeta, TypeKind, VarKind, VarType,
};

use super::{Parser, tags::JsonTag};

impl Parser<'_> {
    pub(super) fn parse_struct(
        &mut self,
        type_name: &str,
        st: &StructType,
    ) -> Result<VarType, TypeError> {
        let mut fields: Vec<TypeField> = Vec::new();

        for field in &st.fields {
            if !is_exported(&field.name) {
                continue;
            }

            let tag = field
                .tag
                .as_deref()
                .and_then(JsonTag::from_struct_tag);
            if tag.as_ref().is_some_and(JsonTag::ignored) {
                continue;
            }

            if field.embedded || tag.as_ref().is_some_and(|t| t.inline) {
                let var = self
                    .parse_named_type("", &field.ty)
                    .map_err(|err| err.in_field(type_name, field.name.as_str()))?;
                let spliced = match &var.borrow().kind {
                    VarKind::Struct { def, .. } if def.borrow().kind == TypeKind::Struct => {
                        def.borrow().fields.clone()
                    }
                    // Embedded non-struct types have no fields to
                    // promote; the serializer treats them as opaque.
                    _ => continue,
                };
                for embedded_field in spliced {
                    append_or_override(&mut fields, embedded_field);
                }
                continue;
            }

            if let Some(synthesized) = self
                .parse_struct_field(type_name, field, tag.as_ref())
                .map_err(|err| err.in_field(type_name, field.name.as_str()))?
            {
                append_or_override(&mut fields, synthesized);
            }
        }

        let def = Rc::new(RefCell::new(Type {
            kind: TypeKind::Struct,
            name: type_name.to_owned(),
            inner: None,
            fields,
            comments: Vec::new(),
        }));
        self.schema.types.push(def.clone());

        Ok(VarType::strukt(type_name, def))
    }

    fn parse_struct_field(
        &mut self,
        parent_name: &str,
        field: &StructField,
        tag: Option<&JsonTag>,
    ) -> Result<Option<TypeField>, TypeError> {
        let mut json_name = field.name.clone();
        let mut go_field_type = type_string(&field.ty);
        let go_import = import_path(&field.ty);
        let mut optional = false;

        if let Some(tag) = tag {
            if tag.ignored() {
                return Ok(None);
            }
            if !tag.name.is_empty() {
                json_name = tag.name.clone();
            }
            if tag.omitempty {
                optional = true;
                go_field_type = format!("*{go_field_type}");
            }
        }

        // `json:",string"` coerces the serialized type regardless of the
        // underlying kind; the original type survives in metadata.
        if tag.is_some_and(|t| t.is_string) {
            let mut meta = vec![
                TypeFieldMeta::new("go.field.name", field.name.as_str()),
                TypeFieldMeta::new("go.field.type", go_field_type.as_str()),
            ];
            if let Some(import) = &go_import {
                meta.push(TypeFieldMeta::new("go.type.import", import.as_str()));
            }
            if let Some(tag) = tag {
                meta.push(TypeFieldMeta::new("go.tag.json", tag.value.as_str()));
            }
            return Ok(Some(TypeField {
                name: json_name,
                ty: Some(VarType::basic(BasicKind::String).shared()),
                optional,
                value: String::new(),
                meta,
            }));
        }

        if matches!(&*underlying(&field.ty), GoType::Pointer(_)) {
            optional = true;
            if !go_field_type.starts_with('*') {
                go_field_type = format!("*{go_field_type}");
            }
        }

        // Anonymous struct fields get a stable synthesized name so they
        // can be registered as a named type.
        let hint = if is_anonymous_struct(&field.ty) {
            format!("{parent_name}{}", field.name)
        } else {
            String::new()
        };

        let var = self.parse_named_type(&hint, &field.ty)?;

        let mut meta = vec![
            TypeFieldMeta::new("go.field.name", field.name.as_str()),
            TypeFieldMeta::new("go.field.type", go_field_type.as_str()),
        ];
        if let Some(import) = &go_import {
            meta.push(TypeFieldMeta::new("go.type.import", import.as_str()));
        }
        if let Some(tag) = tag {
            if !tag.value.is_empty() {
                meta.push(TypeFieldMeta::new("go.tag.json", tag.value.as_str()));
            }
        }

        Ok(Some(TypeField {
            name: json_name,
            ty: Some(var),
            optional,
            value: String::new(),
            meta,
        }))
    }
}

/// `struct{...}` fields, directly or behind pointers, have no declared
/// name of their own.
fn is_anonymous_struct(ty: &Ty) -> bool {
    match &**ty {
        GoType::Struct(_) => true,
        GoType::Pointer(elem) => is_anonymous_struct(elem),
        _ => false,
    }
}

/// Appends a field, deleting any previously present field of the same
/// name first. This mirrors how the host JSON serializer shadows
/// embedded fields: the later occurrence wins and lands at the end.
fn append_or_override(fields: &mut Vec<TypeField>, field: TypeField) {
    fields.retain(|existing| existing.name != field.name);
    fields.push(field);
}
