//! Service method parsing.
//!
//! Every service method leads with a `context.Context` parameter and
//! ends with an `error` result; both are validated and stripped before
//! walking, since downstream generators re-add them. Remaining unnamed
//! arguments are synthesized as `argN`/`retN` by their original tuple
//! index.

use crate::error::TypeError;
use crate::go::types::{GoType, InterfaceMethod, Param, Ty, is_exported, type_string, underlying};
use crate::schema::{ArgRole, Method, MethodArgument, Service};

use super::Parser;

impl Parser<'_> {
    pub fn parse_interface_methods(
        &mut self,
        methods: &[InterfaceMethod],
        name: &str,
    ) -> Result<(), TypeError> {
        let mut service = Service {
            name: name.to_owned(),
            methods: Vec::new(),
        };

        for method in methods {
            if !is_exported(&method.name) {
                continue;
            }
            let wrap = |err: TypeError| err.in_method(method.name.as_str());

            let params = &method.sig.params;
            let Some(first) = params.first() else {
                return Err(wrap(TypeError::MissingContext {
                    reason: "no arguments defined".to_owned(),
                }));
            };
            ensure_context(&first.ty).map_err(wrap)?;

            let results = &method.sig.results;
            let Some(last) = results.last() else {
                return Err(wrap(TypeError::MissingError {
                    reason: "no return values defined".to_owned(),
                }));
            };
            ensure_error(&last.ty).map_err(wrap)?;

            // The context and error are stripped before walking; a
            // generator re-adds both around the wire arguments.
            let inputs = self
                .method_arguments(&params[1..], ArgRole::Input)
                .map_err(wrap)?;
            let outputs = self
                .method_arguments(&results[..results.len() - 1], ArgRole::Output)
                .map_err(wrap)?;

            service.methods.push(Method {
                name: method.name.clone(),
                inputs,
                outputs,
            });
        }

        if service.methods.is_empty() {
            // A service with no exported methods is omitted entirely.
            return Ok(());
        }
        self.schema.services.push(service);
        Ok(())
    }

    fn method_arguments(
        &mut self,
        params: &[Param],
        role: ArgRole,
    ) -> Result<Vec<MethodArgument>, TypeError> {
        params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let name = param
                    .name
                    .clone()
                    .filter(|name| !name.is_empty() && name.as_str() != "_")
                    .unwrap_or_else(|| match role {
                        ArgRole::Input => format!("arg{}", i + 1),
                        ArgRole::Output => format!("ret{}", i + 1),
                    });
                let ty = self
                    .parse_type(&param.ty)
                    .map_err(|err| err.in_argument(name.as_str()))?;
                Ok(MethodArgument { name, ty, role })
            })
            .collect()
    }
}

fn ensure_context(ty: &Ty) -> Result<(), TypeError> {
    let reason = |reason: String| TypeError::MissingContext { reason };
    let GoType::Named(named) = &**ty else {
        return Err(reason(format!(
            "expected named type, found {}",
            type_string(ty)
        )));
    };
    if !matches!(&*underlying(ty), GoType::Interface(_)) {
        return Err(reason(format!(
            "expected underlying interface, found {}",
            type_string(ty)
        )));
    }
    if named.pkg != "context" || named.name != "Context" {
        return Err(reason(format!(
            "expected context.Context, found {}",
            type_string(ty)
        )));
    }
    Ok(())
}

fn ensure_error(ty: &Ty) -> Result<(), TypeError> {
    let ok = matches!(
        &**ty,
        GoType::Named(named) if named.name == "error" && named.pkg.is_empty()
    ) && matches!(&*underlying(ty), GoType::Interface(_));
    if ok {
        Ok(())
    } else {
        Err(TypeError::MissingError {
            reason: format!("expected error, found {}", type_string(ty)),
        })
    }
}
