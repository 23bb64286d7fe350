//! Validator synthesis.
//!
//! Turns a (normalized) schema plus the symbol table into the text of one
//! TypeScript module targeting ajv. Output is a pure function of the inputs:
//! symbols are emitted in the order supplied and the schema is rendered with
//! sorted keys, so identical inputs give byte-identical modules.
pub mod request;
pub mod template;

use std::path::Path;

use indexmap::IndexMap;

use crate::config::{FormatMode, GeneratorOptions, TsConfig};
use crate::error::SynthesisError;
use crate::paths;
use crate::reflect::SymbolTable;
use crate::schema::{Document, Schema, to_compact_stable_string};

use request::ValidatorLookup;
use template::{fill, ts_string};

const AJV: &str = "ajv";
const AJV_CLEANER: &str = "ajvCleaner";
const COLLECTION_SCHEMA: &str = "Schema";
const VALIDATOR: &str = "validateSchema";
const CLEANER: &str = "cleanSchema";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Where the generated module lives, relative to an explicit project root.
#[derive(Debug, Clone, Copy)]
pub struct SourcePaths<'a> {
    pub project_root: &'a Path,
    pub output: &'a Path,
}

/// Accumulates module sections; blank sections are dropped.
#[derive(Debug, Default)]
pub struct Codegen {
    sections: Vec<String>,
}

/// Everything one synthesis call reads.
struct Unit<'a> {
    table: &'a SymbolTable,
    schema: &'a Document,
    paths: SourcePaths<'a>,
    ts: &'a TsConfig,
    format_mode: FormatMode,
    options: &'a GeneratorOptions,
}

#[derive(Debug, Default)]
struct FileImports<'a> {
    default: Option<&'a str>,
    named: Vec<&'a str>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            self.sections.push(text);
        }
    }

    pub fn into_string(self) -> String {
        let mut out = self.sections.join("\n\n");
        out.push('\n');
        out
    }
}

/// Emit the validator module.
///
/// With `type_name` the module validates exactly that type (default export
/// `validate(value)`); without it the module covers every symbol of `table`
/// behind an overloaded `validate(typeName)`.
pub fn synthesize(
    table: &SymbolTable,
    schema: &Document,
    paths: SourcePaths<'_>,
    ts: &TsConfig,
    format_mode: FormatMode,
    options: &GeneratorOptions,
    type_name: Option<&str>,
) -> Result<String, SynthesisError> {
    let unit = Unit { table, schema, paths, ts, format_mode, options };
    let out = match type_name {
        Some(name) => unit.single(name)?,
        None => unit.collection()?,
    };
    tracing::debug!(
        output = %paths.output.display(),
        mode = if type_name.is_some() { "single" } else { "collection" },
        bytes = out.len(),
        "synthesized validator module"
    );
    Ok(out)
}

impl Unit<'_> {
    fn single(&self, name: &str) -> Result<String, SynthesisError> {
        if !self.table.contains(name) {
            return Err(SynthesisError::UnknownType(name.to_string()));
        }
        let target = Schema::reference(name);
        let resolved = self.schema
            .resolve(&target)
            .ok_or_else(|| SynthesisError::UnknownType(name.to_string()))?;
        if let Some(value) = resolved.as_bool() {
            return Err(SynthesisError::BooleanSchema { name: name.to_string(), value });
        }
        let source = self.table
            .source_of(name)
            .ok_or_else(|| SynthesisError::MissingSource(name.to_string()))?;
        let specifier = paths::import_specifier(self.paths.project_root, self.paths.output, source);
        let schema_const = format!("{name}Schema");

        let mut cg = Codegen::new();
        cg.section(template::DISABLE_LINT);
        cg.section(template::BANNER);
        cg.section(self.library_imports());
        cg.section(if self.options.use_named_export {
            format!("import {{{name}}} from {};", ts_string(&specifier))
        } else {
            format!("import {name} from {};", ts_string(&specifier))
        });
        cg.section(self.schema_declaration(&schema_const));
        cg.section(self.instances(None));
        cg.section(format!("export {{{name}}};"));
        cg.section(fill(template::VALIDATION_ERROR, &[("MESSAGE", template::SINGLE_MESSAGE)]));

        let mut compile = vec![fill(
            template::SINGLE_COMPILE,
            &[("VALIDATOR", VALIDATOR), ("INSTANCE", AJV), ("TYPE", name), ("SCHEMA", &schema_const)],
        )];
        if self.options.cleaning() {
            compile.push(fill(
                template::SINGLE_COMPILE,
                &[("VALIDATOR", CLEANER), ("INSTANCE", AJV_CLEANER), ("TYPE", name), ("SCHEMA", &schema_const)],
            ));
        }
        cg.section(compile.join("\n"));
        cg.section(fill(
            template::SINGLE_IMPLEMENTATION,
            &[("EXPORT", "default "), ("FUNCTION", "validate"), ("TYPE", name), ("VALIDATOR", VALIDATOR)],
        ));
        if self.options.cleaning() {
            cg.section(fill(
                template::SINGLE_IMPLEMENTATION,
                &[("EXPORT", ""), ("FUNCTION", "cleanAndValidate"), ("TYPE", name), ("VALIDATOR", CLEANER)],
            ));
        }

        let shapes = request::request_shapes(self.schema, |candidate| candidate == name);
        if let Some(helpers) = request::emit(&shapes, ValidatorLookup::Compiled { validator: VALIDATOR }) {
            cg.section(helpers);
        }
        Ok(cg.into_string())
    }

    fn collection(&self) -> Result<String, SynthesisError> {
        let symbols = &self.table.symbols;
        if symbols.is_empty() {
            return Err(SynthesisError::EmptyCollection);
        }

        let mut cg = Codegen::new();
        cg.section(template::DISABLE_LINT);
        cg.section(template::BANNER);
        cg.section(self.library_imports());
        cg.section(self.type_imports()?);
        cg.section(self.schema_declaration(COLLECTION_SCHEMA));
        cg.section(self.instances(Some(COLLECTION_SCHEMA)));
        cg.section(format!("export {{{}}};", symbols.join(", ")));
        cg.section(fill(template::VALIDATION_ERROR, &[("MESSAGE", template::COLLECTION_MESSAGE)]));
        cg.section(format!(
            "export type AllowedTypeNames = {};\nexport type AllowedTypes = {};",
            symbols.iter().map(|s| ts_string(s)).collect::<Vec<_>>().join(" | "),
            symbols.join(" | "),
        ));
        cg.section(self.overloaded("validate", AJV));
        if self.options.cleaning() {
            cg.section(self.overloaded("cleanAndValidate", AJV_CLEANER));
        }

        let shapes = request::request_shapes(self.schema, |name| self.table.contains(name));
        let lookup = ValidatorLookup::Registry { instance: AJV, schema: COLLECTION_SCHEMA };
        if let Some(helpers) = request::emit(&shapes, lookup) {
            cg.section(helpers);
        }
        Ok(cg.into_string())
    }

    /// ajv and ajv-formats only declare a default export, which resolves
    /// under every module setting, so only the schema import follows tsconfig.
    fn library_imports(&self) -> String {
        format!("{}\n{}", template::IMPORT_INSPECT, template::IMPORT_AJV)
    }

    /// One import per source file, files in order of first appearance.
    fn type_imports(&self) -> Result<String, SynthesisError> {
        let mut by_file: IndexMap<&str, FileImports> = IndexMap::new();
        for symbol in &self.table.symbols {
            let file = self.table
                .source_of(symbol)
                .ok_or_else(|| SynthesisError::MissingSource(symbol.clone()))?;
            let entry = by_file.entry(file).or_default();
            if !self.options.use_named_export && entry.default.is_none() && self.table.is_default_export(file, symbol) {
                entry.default = Some(symbol.as_str());
            } else {
                entry.named.push(symbol.as_str());
            }
        }
        let lines = by_file
            .iter()
            .map(|(file, imports)| {
                let specifier = ts_string(&paths::import_specifier(self.paths.project_root, self.paths.output, file));
                let named = (!imports.named.is_empty()).then(|| format!("{{{}}}", imports.named.join(", ")));
                let clause = match (imports.default, named) {
                    (Some(default), Some(named)) => format!("{default}, {named}"),
                    (Some(default), None) => default.to_string(),
                    (None, Some(named)) => named,
                    (None, None) => String::new(),
                };
                format!("import {clause} from {specifier};")
            })
            .collect::<Vec<_>>();
        Ok(lines.join("\n"))
    }

    fn schema_declaration(&self, constant: &str) -> String {
        if !self.options.separate_schema_file {
            let json = self.schema.to_stable_string();
            return fill(template::INLINE_SCHEMA, &[("SCHEMA", constant), ("JSON", &json)]);
        }
        let schema_file = paths::schema_file_for(self.paths.output);
        let specifier = paths::import_specifier(
            self.paths.project_root,
            self.paths.output,
            &schema_file.to_string_lossy(),
        );
        let form = if self.ts.has_default_interop() {
            template::IMPORT_SCHEMA_DEFAULT
        } else if self.ts.is_commonjs_style() {
            template::IMPORT_SCHEMA_REQUIRE
        } else {
            template::IMPORT_SCHEMA_NAMESPACE
        };
        fill(form, &[("SCHEMA", constant), ("PATH", &specifier)])
    }

    /// The shared instance, plus the cleaning one when enabled.
    fn instances(&self, registered: Option<&str>) -> String {
        let mut out = vec![self.instance(AJV, false, registered)];
        if self.options.cleaning() {
            out.push(self.instance(AJV_CLEANER, true, registered));
        }
        out.join("\n\n")
    }

    fn instance(&self, instance: &str, cleaning: bool, registered: Option<&str>) -> String {
        let options = to_compact_stable_string(&self.options.ajv.runtime_value(cleaning));
        let mut out = fill(
            template::DECLARE_AJV,
            &[("INSTANCE", instance), ("OPTIONS", &options), ("FORMAT_MODE", self.format_mode.as_str())],
        );
        if let Some(schema) = registered {
            out.push('\n');
            out.push_str(&fill(template::ADD_SCHEMA, &[("INSTANCE", instance), ("SCHEMA", schema)]));
        }
        out
    }

    /// One narrowing overload per symbol, the fallback, then the body.
    fn overloaded(&self, function: &str, instance: &str) -> String {
        let mut lines = self.table.symbols
            .iter()
            .map(|symbol| {
                fill(
                    template::OVERLOAD,
                    &[("FUNCTION", function), ("NAME", &ts_string(symbol)), ("TYPE", symbol)],
                )
            })
            .collect::<Vec<_>>();
        lines.push(fill(
            template::OVERLOAD,
            &[("FUNCTION", function), ("NAME", "AllowedTypeNames"), ("TYPE", "unknown")],
        ));
        lines.push(fill(
            template::COLLECTION_IMPLEMENTATION,
            &[("FUNCTION", function), ("INSTANCE", instance), ("SCHEMA", COLLECTION_SCHEMA)],
        ));
        lines.join("\n")
    }
}
