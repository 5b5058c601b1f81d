//! Loads a Go package directory into a checked [`Package`].
//!
//! Previously generated `*.gen.go` files are overlaid with package-only
//! stubs before parsing, so a syntactically broken file we're about to
//! regenerate can't wedge the run. A shared error-definitions file is
//! also overlaid into the package, letting user code reference the
//! `WebRPCError` values before the first generation ever happens.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::{LoadError, SourceError};
use crate::go::parse::parse_file;
use crate::go::Package;

const ERRORS_SOURCE: &str = include_str!("load/webrpc_errors.go");
const ERRORS_OVERLAY_NAME: &str = "webrpcErrors.gen.go";

pub fn load_package(path: impl AsRef<Path>) -> Result<Package, LoadError> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    // Load the whole directory even when a single file is given, so the
    // checker sees every file of the package.
    let dir = if meta.is_file() {
        path.parent().unwrap_or(Path::new(".")).to_owned()
    } else {
        path.to_owned()
    };

    let base = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_owned());
    let package_line = format!("package {base}\n");

    let mut overlays: FxHashMap<PathBuf, String> = FxHashMap::default();
    collect_gen_overlays(&dir, &package_line, &mut overlays)?;
    overlays.insert(
        dir.join(ERRORS_OVERLAY_NAME),
        ERRORS_SOURCE.replacen("package webrpc", package_line.trim_end(), 1),
    );

    let mut paths: Vec<PathBuf> = Vec::new();
    let entries = fs::read_dir(&dir).map_err(|source| LoadError::Io {
        path: dir.clone(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.clone(),
            source,
        })?;
        let entry_path = entry.path();
        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !entry_path.is_file()
            || !name.ends_with(".go")
            || name.ends_with("_test.go")
            || name.starts_with('.')
            || name.starts_with('_')
        {
            continue;
        }
        paths.push(entry_path);
    }
    let errors_overlay = dir.join(ERRORS_OVERLAY_NAME);
    if !paths.contains(&errors_overlay) {
        paths.push(errors_overlay);
    }
    paths.sort();

    let mut errors: Vec<SourceError> = Vec::new();
    let mut files = Vec::new();
    let mut package: Option<String> = None;
    for file_path in paths {
        let src = match overlays.get(&file_path) {
            Some(overlay) => overlay.clone(),
            None => match fs::read_to_string(&file_path) {
                Ok(src) => src,
                Err(source) => {
                    return Err(LoadError::Io {
                        path: file_path,
                        source,
                    });
                }
            },
        };
        match parse_file(file_path, &src) {
            Ok(file) => {
                match &package {
                    None => package = Some(file.package.clone()),
                    Some(first) if *first != file.package => {
                        return Err(LoadError::PackageNameMismatch {
                            dir,
                            first: first.clone(),
                            second: file.package.clone(),
                        });
                    }
                    Some(_) => {}
                }
                files.push(file);
            }
            Err(err) => errors.push(err),
        }
    }

    let Some(package) = package else {
        return if errors.is_empty() {
            Err(LoadError::NoGoFiles { dir })
        } else {
            Err(LoadError::Source { errors })
        };
    };
    if !errors.is_empty() {
        return Err(LoadError::Source { errors });
    }

    Package::check(package, files).map_err(|errors| LoadError::Source { errors })
}

/// Stubs out every previously generated file under `dir`, recursively.
fn collect_gen_overlays(
    dir: &Path,
    package_line: &str,
    overlays: &mut FxHashMap<PathBuf, String>,
) -> Result<(), LoadError> {
    let entries = fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_owned(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_owned(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_gen_overlays(&path, package_line, overlays)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".gen.go"))
        {
            overlays.insert(path, package_line.to_owned());
        }
    }
    Ok(())
}
