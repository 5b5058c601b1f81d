use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser as _;
use miette::IntoDiagnostic;

use goschema::parser::parse_directive;
use goschema::schema::Schema;
use goschema::{Target, r#gen};

/// Generates webrpc interface schemas from annotated Go packages.
///
/// With no generator targets, prints each discovered interface's schema
/// as JSON to stdout. Targets have the same shape as `//go:webrpc`
/// directives: `<generator> [-flag[=value]]... -out=<path>`.
#[derive(Debug, clap::Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the Go schema package (a directory, or any file inside it).
    schema: PathBuf,

    /// Generator targets, e.g. `json -out=./api.gen.json`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    targets: Vec<String>,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let targets = goschema::parse(&cli.schema)?;
    if targets.is_empty() {
        miette::bail!(
            "no //go:webrpc annotated interfaces found in {}",
            cli.schema.display()
        );
    }
    let schemas = unique_schemas(&targets);

    let cli_targets = collect_cli_targets(&cli.targets)?;
    if cli_targets.is_empty() {
        for (_, schema) in &schemas {
            println!("{}", schema.to_json(true).into_diagnostic()?);
        }
        return Ok(());
    }

    if schemas.len() > 1 {
        miette::bail!(
            "found {} annotated interfaces; command-line generator targets support exactly \
             one (annotate each interface with its own //go:webrpc directives instead)",
            schemas.len()
        );
    }
    let (_, schema) = &schemas[0];
    for target in &cli_targets {
        let code = r#gen::generate(schema, &target.generator)?;
        r#gen::write_to_disk(Path::new(&target.out_file), &code)?;
        println!("generated {} ✓", target.out_file);
    }
    Ok(())
}

/// Deduplicates targets down to one schema per interface, in discovery
/// order.
fn unique_schemas(targets: &[Target]) -> Vec<(String, Rc<Schema>)> {
    let mut schemas: Vec<(String, Rc<Schema>)> = Vec::new();
    for target in targets {
        if schemas.iter().any(|(name, _)| *name == target.interface_name) {
            continue;
        }
        if let Some(schema) = &target.schema {
            schemas.push((target.interface_name.clone(), schema.clone()));
        }
    }
    schemas
}

/// Groups trailing CLI arguments into generator targets; each non-flag
/// token opens a new target, exactly like a directive line.
fn collect_cli_targets(args: &[String]) -> miette::Result<Vec<Target>> {
    let mut groups: Vec<Vec<&str>> = Vec::new();
    for arg in args {
        if arg.starts_with('-') {
            match groups.last_mut() {
                Some(group) => group.push(arg),
                None => miette::bail!("expected a generator name before {arg}"),
            }
        } else {
            groups.push(vec![arg]);
        }
    }
    groups
        .into_iter()
        .map(|group| parse_directive(&group.join(" ")).map_err(Into::into))
        .collect()
}
