//! The type-resolution and schema-synthesis core.
//!
//! [`parse`] is the end-to-end entry point: load the package, collect
//! annotated interfaces, and walk each one into a [`Schema`]. The
//! [`Parser`] itself is designed to run sequentially, without any
//! concurrency, so plain maps can cache already-parsed types while
//! cyclic type graphs terminate through placeholder cells. Construct one
//! parser per interface; parsers share nothing.

mod enums;
mod interface;
mod marshaler;
mod methods;
mod named;
mod struct_;
mod tags;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::rc::Rc;

use by_address::ByAddress;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::{Error, TypeError};
use crate::go::types::{GoType, Ty, type_string, underlying};
use crate::go::Package;
use crate::load;
use crate::schema::{Schema, TypeRef, VarRef};

pub use interface::{BadDirective, DIRECTIVE_PREFIX, Target, collect_interfaces, parse_directive};
pub use tags::JsonTag;

pub struct Parser<'pkg> {
    pub schema: Schema,
    pkg: &'pkg Package,
    /// Identity-keyed cache of already-walked types; doubles as the
    /// cycle-termination mechanism.
    parsed: FxHashMap<ByAddress<Ty>, VarRef>,
    /// Name-keyed enum registry, populated before interface walking.
    enums: IndexMap<String, TypeRef>,
}

impl<'pkg> Parser<'pkg> {
    pub fn new(pkg: &'pkg Package, schema_name: &str) -> Self {
        Self {
            schema: Schema::new(schema_name),
            pkg,
            parsed: FxHashMap::default(),
            enums: IndexMap::new(),
        }
    }
}

/// Parses a Go schema package and returns one target per `//go:webrpc`
/// directive, each paired with its interface's schema. Targets sharing
/// an interface share one schema.
pub fn parse(path: impl AsRef<Path>) -> Result<Vec<Target>, Error> {
    let pkg = load::load_package(path)?;
    parse_package(&pkg)
}

pub fn parse_package(pkg: &Package) -> Result<Vec<Target>, Error> {
    let mut targets = collect_interfaces(pkg)?;

    let mut cache: FxHashMap<String, Rc<Schema>> = FxHashMap::default();
    for target in &mut targets {
        if let Some(schema) = cache.get(&target.interface_name) {
            target.schema = Some(schema.clone());
            continue;
        }

        let schema = Rc::new(parse_interface(pkg, &target.interface_name)?);
        cache.insert(target.interface_name.clone(), schema.clone());
        target.schema = Some(schema);
    }

    Ok(targets)
}

fn parse_interface(pkg: &Package, interface_name: &str) -> Result<Schema, Error> {
    let in_interface = |source: TypeError| Error::Interface {
        interface: interface_name.to_owned(),
        source,
    };

    let mut parser = Parser::new(pkg, interface_name);
    parser
        .collect_enums()
        .map_err(|source| Error::Enums { source })?;

    let ty = pkg.lookup(interface_name).ok_or_else(|| {
        in_interface(TypeError::InterfaceNotFound {
            name: interface_name.to_owned(),
        })
    })?;
    let under = underlying(&ty);
    let GoType::Interface(iface) = &*under else {
        return Err(in_interface(TypeError::NotAnInterface {
            name: interface_name.to_owned(),
            found: type_string(&under),
        }));
    };

    parser
        .parse_interface_methods(&iface.flattened_methods(), interface_name)
        .map_err(in_interface)?;

    Ok(parser.schema)
}
