//! Schema normalization and ajv validator synthesis for reflected TypeScript
//! types.
//!
//! Pipeline: [`reflect`] → [`normalize`] → [`codegen`]. Each stage borrows its
//! input and returns a fresh value; only [`cli`] touches the file system.
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod normalize;
pub mod path_de;
pub mod paths;
pub mod reflect;
pub mod schema;

pub use codegen::{Codegen, SourcePaths, synthesize};
pub use config::{AjvOptions, FormatMode, GeneratorOptions, StrictMode, TsConfig};
pub use error::{ConfigError, ReflectionError, SchemaError, SynthesisError};
pub use normalize::{normalize, seal_objects};
pub use reflect::{ReflectedTypes, SymbolTable};
pub use schema::{Document, Schema};
