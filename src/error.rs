//! Error taxonomy for the generator.
//!
//! Reflection and configuration errors abort a whole invocation. Synthesis
//! errors only abort the unit (type or file) being generated. Union
//! normalization never fails: an ambiguous tag falls back to the untouched
//! `anyOf`, so there is no error type for it.
use std::path::PathBuf;

use thiserror::Error;

/// A schema value that could not be decoded into the typed model.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema node must be an object or a boolean, found {found}")]
    NotASchema { found: &'static str },
    #[error("keyword `{keyword}` must be {expected}")]
    Keyword { keyword: &'static str, expected: &'static str },
    #[error("unsupported type name `{0}`")]
    UnknownType(String),
    #[error("in `{at}`: {source}")]
    Nested {
        at: String,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    pub(crate) fn within(self, at: impl Into<String>) -> Self {
        SchemaError::Nested { at: at.into(), source: Box::new(self) }
    }
}

/// Failure surfaced while reading the external reflector's output.
#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("failed to read reflection document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed reflection document {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("symbol `{0}` is exported but the schema has no definition for it")]
    DanglingSymbol(String),
}

/// Invalid option combinations, discovered before anything is generated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "a separate schema file was requested, but the tsconfig does not resolve JSON modules; \
         set `compilerOptions.resolveJsonModule` to true in {}",
        tsconfig.display()
    )]
    SchemaFileNeedsJsonModules { tsconfig: PathBuf },
    #[error(
        "failed to read tsconfig {}: {message}; pass --tsconfig to point at a valid file",
        path.display()
    )]
    TsConfig { path: PathBuf, message: String },
    #[error(
        "refusing to write {} outside of the project root {}; choose an output inside the project",
        path.display(),
        root.display()
    )]
    OutsideProjectRoot { path: PathBuf, root: PathBuf },
}

/// A single generation unit could not be synthesized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("type `{0}` is not exported by the reflected sources")]
    UnknownType(String),
    #[error("type `{name}` resolves to the boolean schema `{value}`; a concrete validator cannot be derived from it")]
    BooleanSchema { name: String, value: bool },
    #[error("type `{0}` has no source file in `symbolsByFile`, so it cannot be imported")]
    MissingSource(String),
    #[error("collection has no exported types to validate")]
    EmptyCollection,
}
