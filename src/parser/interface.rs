//! Interface discovery and generator-directive parsing.
//!
//! An interface becomes a code-generation target through one or more
//! doc-comment lines of the form:
//!
//! ```text
//! //go:webrpc <generator>[@<version>] [-<opt>[=<val>]]... -out=<path>
//! ```
//!
//! Other comment prefixes (`//go:disabled`, plain doc text) are ignored.

use std::rc::Rc;

use indexmap::IndexMap;
use itertools::Itertools;
use miette::SourceSpan;

use crate::error::Error;
use crate::go::ast::{Decl, TypeExpr};
use crate::go::Package;
use crate::schema::Schema;

pub const DIRECTIVE_PREFIX: &str = "//go:webrpc ";

/// One `(interface, generator, options, out)` tuple extracted from a
/// directive, paired with its schema once the orchestrator has walked
/// the interface.
#[derive(Debug, Clone)]
pub struct Target {
    pub interface_name: String,
    pub generator: String,
    pub opts: IndexMap<String, String>,
    pub out_file: String,
    pub schema: Option<Rc<Schema>>,
}

impl Target {
    /// Renders the target back into directive argument form; parsing a
    /// directive and serializing it again round-trips.
    pub fn to_directive_args(&self) -> String {
        let flags = self.opts.iter().map(|(key, value)| {
            if value.is_empty() {
                format!("-{key}")
            } else {
                format!("-{key}={value}")
            }
        });
        itertools::chain!(
            [self.generator.clone()],
            flags,
            [format!("-out={}", self.out_file)]
        )
        .join(" ")
    }
}

/// Finds all interfaces annotated with `//go:webrpc` directives, in
/// source file and declaration order.
pub fn collect_interfaces(pkg: &Package) -> Result<Vec<Target>, Error> {
    let mut targets = Vec::new();
    for file in &pkg.files {
        for decl in &file.decls {
            let Decl::Type(spec) = decl else { continue };
            if !matches!(spec.expr, TypeExpr::Interface(_)) {
                continue;
            }
            for line in &spec.docs {
                let Some(cmd) = line.strip_prefix(DIRECTIVE_PREFIX) else {
                    continue;
                };
                let mut target =
                    parse_directive(cmd).map_err(|source| Error::Directive {
                        path: file.path.clone(),
                        line: spec.line,
                        source,
                    })?;
                target.interface_name = spec.name.clone();
                targets.push(target);
            }
        }
    }
    Ok(targets)
}

/// Parses directive arguments: whitespace-split tokens where the first
/// non-flag token names the generator, `-out=<path>` is mandatory, and
/// every other `-key[=value]` flag passes through to the generator.
pub fn parse_directive(cmd: &str) -> Result<Target, BadDirective> {
    let mut generator = String::new();
    let mut opts = IndexMap::new();
    let mut out_file = String::new();

    for (offset, word) in words(cmd) {
        let (name, value) = match word.split_once('=') {
            Some((name, value)) => (name, value),
            None => (word, ""),
        };
        if let Some(flag) = name.strip_prefix('-') {
            let flag = flag.trim_start_matches('-');
            if flag == "out" {
                out_file = value.to_owned();
            } else {
                opts.insert(flag.to_owned(), value.to_owned());
            }
        } else if generator.is_empty() {
            generator = word.to_owned();
        } else {
            return Err(BadDirective::new(
                cmd,
                format!("unexpected argument {word}"),
                (offset, word.len()),
            ));
        }
    }

    if generator.is_empty() {
        return Err(BadDirective::new(
            cmd,
            "missing generator name",
            (0, cmd.len()),
        ));
    }
    if out_file.is_empty() {
        return Err(BadDirective::new(
            cmd,
            "-out=<path> flag is required",
            (0, cmd.len()),
        ));
    }

    Ok(Target {
        interface_name: String::new(),
        generator,
        opts,
        out_file,
        schema: None,
    })
}

fn words(cmd: &str) -> impl Iterator<Item = (usize, &str)> {
    cmd.split_whitespace().map(|word| {
        let offset = word.as_ptr() as usize - cmd.as_ptr() as usize;
        (offset, word)
    })
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("failed to parse //go:webrpc directive: {message}")]
pub struct BadDirective {
    message: String,
    #[source_code]
    code: String,
    #[label]
    span: SourceSpan,
}

impl BadDirective {
    fn new(cmd: &str, message: impl Into<String>, span: (usize, usize)) -> Self {
        Self {
            message: message.into(),
            code: cmd.to_owned(),
            span: span.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generator_flags_and_out() {
        let target =
            parse_directive("typescript@v0.11.0 -client -pkg=client -out=./client.gen.ts")
                .unwrap();
        assert_eq!(target.generator, "typescript@v0.11.0");
        assert_eq!(target.out_file, "./client.gen.ts");
        assert_eq!(target.opts.get("client").map(String::as_str), Some(""));
        assert_eq!(target.opts.get("pkg").map(String::as_str), Some("client"));
    }

    #[test]
    fn out_flag_is_required() {
        let err = parse_directive("json -client").unwrap_err();
        assert!(err.message.contains("-out"));
    }

    #[test]
    fn generator_is_required() {
        let err = parse_directive("-out=./x.json").unwrap_err();
        assert!(err.message.contains("generator"));
    }

    #[test]
    fn second_positional_argument_is_rejected() {
        let err = parse_directive("json extra -out=./x.json").unwrap_err();
        assert!(err.message.contains("unexpected argument extra"));
    }

    #[test]
    fn directives_round_trip() {
        let line = "golang -server -importTypesFrom=example.com/proto -pkg=server -out=./server/server.gen.go";
        let target = parse_directive(line).unwrap();
        assert_eq!(target.to_directive_args(), line);
    }
}
