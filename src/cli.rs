//! CLI: reflection documents → validator modules
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser};
use colored::Colorize;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::codegen::{SourcePaths, synthesize};
use crate::config::{AjvOptions, FormatMode, GeneratorOptions, StrictMode, TsConfig};
use crate::error::SynthesisError;
use crate::normalize::{normalize, seal_objects};
use crate::paths;
use crate::reflect::{ReflectedTypes, SymbolTable};
use crate::schema::Document;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate ajv validator modules from reflected TypeScript types
#[derive(Parser, Debug)]
#[command(name = "json-guard", version, about)]
pub struct CommandLineInterface {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    generation: GenerationSettings,

    #[command(flatten)]
    strictness: StrictSettings,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more reflection documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// generate a single-type validator for this type (repeatable)
    #[arg(long = "type", short = 't', value_name = "NAME")]
    types: Vec<String>,

    /// one module validating every exported type (the default when no --type is given)
    #[arg(long, conflicts_with = "types")]
    collection: bool,

    /// output .ts file (defaults to `<source>.validator.ts` next to each source)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// root that import paths are computed from and writes are confined to
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// tsconfig of the consuming project (defaults to `<project-root>/tsconfig.json`)
    #[arg(long)]
    tsconfig: Option<PathBuf>,

    /// print generated modules to stdout instead of writing them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug, Clone)]
struct GenerationSettings {
    /// import types as named exports instead of default exports
    #[arg(long, default_value_t = false)]
    use_named_export: bool,

    /// emit the schema as a sibling .json module instead of inlining it
    #[arg(long, default_value_t = false)]
    separate_schema_file: bool,

    /// reject properties not declared by the type
    #[arg(long, default_value_t = false)]
    no_extra_props: bool,

    /// also emit `cleanAndValidate`, which strips unknown properties (needs --no-extra-props)
    #[arg(long, default_value_t = false)]
    generate_permissive: bool,

    /// string format checking mode passed to ajv-formats
    #[arg(long = "format", value_enum, default_value_t = FormatMode::Fast)]
    format_mode: FormatMode,

    #[arg(long, default_value_t = false)]
    coerce_types: bool,

    /// do not fill in schema defaults while validating
    #[arg(long, default_value_t = false)]
    no_default_props: bool,
}

/// ajv strict mode toggles; each one falls back to --strict-all.
#[derive(Args, Debug, Clone)]
struct StrictSettings {
    #[arg(long, value_name = "log|true|false")]
    strict_all: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict_schema: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict_numbers: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict_types: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict_tuples: Option<StrictMode>,
    #[arg(long, value_name = "log|true|false")]
    strict_required: Option<StrictMode>,
}

/// One module to synthesize and where it goes.
#[derive(Debug)]
struct Unit {
    label: String,
    /// Absolute, already checked to be inside the project root.
    output: PathBuf,
    table: SymbolTable,
    schema: Document,
    type_name: Option<String>,
}

/// Outcome of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub written: usize,
    pub failed: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Report {
    pub fn total(&self) -> usize {
        self.written + self.failed
    }
}

impl StrictSettings {
    fn resolve(&self, toggle: Option<StrictMode>) -> StrictMode {
        toggle.or(self.strict_all).unwrap_or_default()
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        let g = &self.generation;
        let s = &self.strictness;
        let ajv = AjvOptions {
            coerce_types: g.coerce_types,
            use_defaults: !g.no_default_props,
            remove_additional: false,
            strict: s.resolve(s.strict),
            strict_schema: s.resolve(s.strict_schema),
            strict_numbers: s.resolve(s.strict_numbers),
            strict_types: s.resolve(s.strict_types),
            strict_tuples: s.resolve(s.strict_tuples),
            strict_required: s.resolve(s.strict_required),
        };
        GeneratorOptions {
            use_named_export: g.use_named_export,
            separate_schema_file: g.separate_schema_file,
            ajv,
            ..GeneratorOptions::default()
        }
        .with_permissive(g.no_extra_props, g.generate_permissive)
    }

    pub fn run(&self) -> anyhow::Result<Report> {
        let settings = &self.input_settings;
        let cwd = std::env::current_dir().context("failed to read the current directory")?;
        let root = paths::absolutize(&cwd, settings.project_root.as_deref().unwrap_or(Path::new(".")));
        let tsconfig_path = match &settings.tsconfig {
            Some(path) => paths::absolutize(&cwd, path),
            None => root.join("tsconfig.json"),
        };
        let ts = TsConfig::load(&tsconfig_path)?;
        let options = self.generator_options();
        options.check(&ts, &tsconfig_path)?;
        tracing::debug!(options = ?options, root = %root.display(), "resolved generator options");

        let sources = resolve_file_path_patterns(&settings.input)?;
        let mut documents = Vec::with_capacity(sources.len());
        for source in &sources {
            let path = paths::absolutize(&cwd, source);
            let reflected = ReflectedTypes::load(&path)?;
            let reflected = if options.no_extra_props {
                ReflectedTypes { schema: seal_objects(&reflected.schema), table: reflected.table }
            } else {
                reflected
            };
            documents.push(reflected);
        }

        let units = self.plan(&documents, &root, &cwd)?;
        tracing::info!(units = units.len(), "planned validator modules");

        let results: Vec<(&Unit, Result<String, SynthesisError>)> = units
            .par_iter()
            .map(|unit| {
                let source_paths = SourcePaths { project_root: &root, output: &unit.output };
                let text = synthesize(
                    &unit.table,
                    &unit.schema,
                    source_paths,
                    &ts,
                    self.generation.format_mode,
                    &options,
                    unit.type_name.as_deref(),
                );
                (unit, text)
            })
            .collect();

        let mut report = Report::default();
        for (unit, result) in results {
            match result {
                Ok(text) => {
                    self.emit(unit, &text, &options)?;
                    report.written += 1;
                    eprintln!("{} {} → {}", "✔".green(), unit.label.as_str().bold(), display_relative(&root, &unit.output));
                }
                Err(error) => {
                    tracing::warn!(unit = %unit.label, %error, "skipping unit");
                    report.failed += 1;
                    eprintln!("{} {}: {}", "✘".red(), unit.label.as_str().bold(), error);
                }
            }
        }
        Ok(report)
    }

    /// Decide which modules to generate. Unknown types, outputs outside the
    /// project root and two units sharing one output abort here, before
    /// anything is written.
    fn plan(&self, documents: &[ReflectedTypes], root: &Path, cwd: &Path) -> anyhow::Result<Vec<Unit>> {
        let units = self.plan_units(documents, root, cwd)?;
        ensure_distinct_outputs(&units, root)?;
        Ok(units)
    }

    fn plan_units(&self, documents: &[ReflectedTypes], root: &Path, cwd: &Path) -> anyhow::Result<Vec<Unit>> {
        let settings = &self.input_settings;
        let output = match &settings.output {
            Some(path) => Some(paths::ensure_within(root, &paths::absolutize(cwd, path))?),
            None => None,
        };
        let mut units = Vec::new();

        if !(settings.collection || settings.types.is_empty()) {
            if output.is_some() && settings.types.len() > 1 {
                bail!("--output names one file but {} types were requested; drop --output or pass one --type", settings.types.len());
            }
            for name in &settings.types {
                let Some(reflected) = documents.iter().find(|d| d.table.contains(name)) else {
                    return Err(SynthesisError::UnknownType(name.clone()).into());
                };
                let schema = normalize(&reflected.for_type(name)?);
                let target = match &output {
                    Some(path) => path.clone(),
                    None => {
                        let source = reflected.table
                            .source_of(name)
                            .ok_or_else(|| SynthesisError::MissingSource(name.clone()))?;
                        paths::ensure_within(root, &paths::default_output(source))?
                    }
                };
                units.push(Unit {
                    label: name.clone(),
                    output: target,
                    table: reflected.table.clone(),
                    schema,
                    type_name: Some(name.clone()),
                });
            }
            return Ok(units);
        }

        if let Some(path) = output {
            let [reflected] = documents else {
                bail!("--output with a collection takes exactly one reflection document, got {}", documents.len());
            };
            units.push(Unit {
                label: "all types".into(),
                output: path,
                table: reflected.table.clone(),
                schema: normalize(&reflected.schema),
                type_name: None,
            });
            return Ok(units);
        }

        for reflected in documents {
            let schema = normalize(&reflected.schema);
            for file in reflected.table.files() {
                units.push(Unit {
                    label: file.to_string(),
                    output: paths::ensure_within(root, &paths::default_output(file))?,
                    table: reflected.table.restricted_to(file),
                    schema: schema.clone(),
                    type_name: None,
                });
            }
        }
        Ok(units)
    }

    fn emit(&self, unit: &Unit, text: &str, options: &GeneratorOptions) -> anyhow::Result<()> {
        let schema_file = options.separate_schema_file.then(|| paths::schema_file_for(&unit.output));
        let schema_json = format!("{}\n", unit.schema.to_stable_string());

        if self.input_settings.dry_run {
            println!("// {}\n{text}", unit.output.display());
            if let Some(schema_file) = &schema_file {
                println!("// {}\n{schema_json}", schema_file.display());
            }
            return Ok(());
        }

        write_file(&unit.output, text)?;
        tracing::info!(path = %unit.output.display(), "wrote validator module");
        if let Some(schema_file) = &schema_file {
            write_file(schema_file, &schema_json)?;
            tracing::info!(path = %schema_file.display(), "wrote schema file");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn ensure_distinct_outputs(units: &[Unit], root: &Path) -> anyhow::Result<()> {
    let mut claimed: IndexMap<&Path, &str> = IndexMap::new();
    for unit in units {
        if let Some(first) = claimed.insert(&unit.output, &unit.label) {
            bail!(
                "`{first}` and `{}` would both be written to {}; pass --collection or generate them in separate runs with --output",
                unit.label,
                display_relative(root, &unit.output)
            );
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matched nothing is almost always a typo
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
