//! Built-in generator dispatch for the CLI.
//!
//! The core emits schemas; heavyweight code generators are external
//! consumers of the IDL. The one generator shipped here is `json`,
//! which renders the schema in its canonical JSON form.

use std::path::Path;

use miette::{Context, IntoDiagnostic};

use crate::schema::Schema;

/// Generators the CLI can run without external tooling.
pub const GENERATORS: &[&str] = &["json"];

pub fn generate(schema: &Schema, generator: &str) -> miette::Result<String> {
    match generator {
        "json" => schema
            .to_json(true)
            .into_diagnostic()
            .context("failed to serialize schema"),
        other => miette::bail!(
            "unknown generator {other:?}; built-in generators: {}",
            GENERATORS.join(", ")
        ),
    }
}

pub fn write_to_disk(path: &Path, contents: &str) -> miette::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .with_context(|| format!("failed to create directory `{}`", parent.display()))?;
    }
    std::fs::write(path, contents)
        .into_diagnostic()
        .with_context(|| format!("failed to write `{}`", path.display()))
}
