use std::path::PathBuf;

/// A syntax or resolution error pinned to a location in a Go source file.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}:{line}: {message}", path.display())]
pub struct SourceError {
    pub path: PathBuf,
    pub line: u32,
    pub message: String,
}

impl SourceError {
    pub fn new(path: impl Into<PathBuf>, line: u32, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Errors produced while loading and checking a Go package directory.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no Go files found in {}", dir.display())]
    NoGoFiles { dir: PathBuf },

    #[error(
        "found packages {first} and {second} in {}; expected a single package",
        dir.display()
    )]
    PackageNameMismatch {
        dir: PathBuf,
        first: String,
        second: String,
    },

    /// One or more files failed to parse or type-check. All collected
    /// errors are reported at once, like a compiler would.
    #[error("{} source error(s):\n{}", errors.len(), errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Source { errors: Vec<SourceError> },
}

/// Errors produced by the type walker and the schema synthesis core.
///
/// Walker errors wrap their cause with the surrounding field, struct,
/// argument, and method names, so the final message reads as a stack
/// trace through the schema model.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TypeError {
    #[error("unknown basic type: {name}")]
    UnknownBasic { name: String },

    #[error("unsupported type {name}")]
    Unsupported { name: String },

    #[error("map key must be a basic type, got {key}")]
    MapKeyNotBasic { key: String },

    #[error("pointer to pointer {name} is not supported")]
    PointerChain { name: String },

    #[error("parsing struct field {field} of {strukt}: {source}")]
    Field {
        strukt: String,
        field: String,
        #[source]
        source: Box<TypeError>,
    },

    #[error("failed to parse argument {name}: {source}")]
    Argument {
        name: String,
        #[source]
        source: Box<TypeError>,
    },

    #[error("{method}(): {source}")]
    Method {
        method: String,
        #[source]
        source: Box<TypeError>,
    },

    #[error("first method argument must be context.Context: {reason}")]
    MissingContext { reason: String },

    #[error("last return value must be error: {reason}")]
    MissingError { reason: String },

    #[error("enum constant {constant} of {enum_name} must carry a trailing comment with its quoted value (e.g. `// \"active\"`)")]
    EnumMissingValue {
        enum_name: String,
        constant: String,
    },

    #[error("enum type {enum_name} must alias a basic type")]
    EnumNotBasic { enum_name: String },

    #[error("type interface {name} not found in package")]
    InterfaceNotFound { name: String },

    #[error("type {name} is {found}, expected an interface")]
    NotAnInterface { name: String, found: String },
}

impl TypeError {
    /// Wraps this error with the enclosing struct field.
    pub fn in_field(self, strukt: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Field {
            strukt: strukt.into(),
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wraps this error with the enclosing method argument.
    pub fn in_argument(self, name: impl Into<String>) -> Self {
        Self::Argument {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Wraps this error with the enclosing service method.
    pub fn in_method(self, method: impl Into<String>) -> Self {
        Self::Method {
            method: method.into(),
            source: Box::new(self),
        }
    }
}

/// Top-level errors returned by [`crate::parse`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("failed to load Go package: {0}")]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error("{}:{line}: {source}", path.display())]
    Directive {
        path: PathBuf,
        line: u32,
        #[source]
        #[diagnostic_source]
        source: crate::parser::BadDirective,
    },

    #[error("failed to parse interface {interface}: {source}")]
    Interface {
        interface: String,
        #[source]
        source: TypeError,
    },

    #[error("collecting enums: {source}")]
    Enums {
        #[source]
        source: TypeError,
    },
}
