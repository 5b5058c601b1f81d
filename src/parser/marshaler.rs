//! Method-set probing for serialization overrides.
//!
//! A named type that implements `encoding.TextMarshaler` and
//! `encoding.TextUnmarshaler` serializes as a string; one that
//! implements `json.Marshaler` and `json.Unmarshaler` serializes as an
//! opaque value. Both probes match the canonical method fingerprints
//! over the full method set, pointer receivers included. Signatures
//! that can't be resolved simply fail the fingerprint.

use crate::go::types::{GoType, Named, Signature, Ty, underlying};
use crate::go::Package;

pub fn is_text_marshaler(pkg: &Package, ty: &Ty) -> bool {
    has_marshaler_pair(pkg, ty, "MarshalText", "UnmarshalText")
}

pub fn is_json_marshaler(pkg: &Package, ty: &Ty) -> bool {
    has_marshaler_pair(pkg, ty, "MarshalJSON", "UnmarshalJSON")
}

fn has_marshaler_pair(pkg: &Package, ty: &Ty, marshal: &str, unmarshal: &str) -> bool {
    let GoType::Named(named) = &**ty else {
        return false;
    };
    method_signature(pkg, named, marshal).is_some_and(|sig| is_marshal_signature(&sig))
        && method_signature(pkg, named, unmarshal).is_some_and(|sig| is_unmarshal_signature(&sig))
}

/// Looks up a method on the named type, falling back to the generic
/// origin's method set for instantiations.
fn method_signature(pkg: &Package, named: &Named, name: &str) -> Option<Signature> {
    let decl = named
        .methods
        .borrow()
        .iter()
        .find(|decl| decl.name == name)
        .cloned();
    if let Some(decl) = decl {
        return pkg.method_signature(&decl);
    }
    let origin = named.origin.borrow().clone()?;
    match &*origin {
        GoType::Named(origin) => method_signature(pkg, origin, name),
        _ => None,
    }
}

/// `func () ([]byte, error)`
fn is_marshal_signature(sig: &Signature) -> bool {
    sig.params.is_empty()
        && matches!(&*sig.results, [data, err] if is_byte_slice(&data.ty) && is_error(&err.ty))
}

/// `func ([]byte) error`
fn is_unmarshal_signature(sig: &Signature) -> bool {
    matches!(&*sig.params, [data] if is_byte_slice(&data.ty))
        && matches!(&*sig.results, [err] if is_error(&err.ty))
}

fn is_byte_slice(ty: &Ty) -> bool {
    match &*underlying(ty) {
        GoType::Slice(elem) => matches!(
            &*underlying(elem),
            GoType::Basic(basic) if basic.name == "byte" || basic.name == "uint8"
        ),
        _ => false,
    }
}

fn is_error(ty: &Ty) -> bool {
    matches!(&**ty, GoType::Named(named) if named.name == "error" && named.pkg.is_empty())
}
