//! Generation options and the consuming project's tsconfig.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ConfigError;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// String-format checking strictness handed to `ajv-formats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    #[default]
    Fast,
    Full,
}

/// Value of one of ajv's `strict*` toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictMode {
    Log,
    On,
    #[default]
    Off,
}

/// Options passed through verbatim to the compiled validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AjvOptions {
    pub coerce_types: bool,
    pub use_defaults: bool,
    /// Strip unknown properties; only ever applied to the cleaning instance.
    pub remove_additional: bool,
    pub strict: StrictMode,
    pub strict_schema: StrictMode,
    pub strict_numbers: StrictMode,
    pub strict_types: StrictMode,
    pub strict_tuples: StrictMode,
    pub strict_required: StrictMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    pub use_named_export: bool,
    pub separate_schema_file: bool,
    pub no_extra_props: bool,
    pub generate_permissive: bool,
    pub ajv: AjvOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    #[serde(default)]
    pub compiler_options: CompilerOptions,
}

/// The subset of `compilerOptions` that shapes the emitted imports.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub module: Option<String>,
    pub es_module_interop: Option<bool>,
    pub allow_synthetic_default_imports: Option<bool>,
    pub resolve_json_module: Option<bool>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl FormatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatMode::Fast => "fast",
            FormatMode::Full => "full",
        }
    }
}

impl StrictMode {
    pub fn to_value(self) -> Value {
        match self {
            StrictMode::Log => Value::from("log"),
            StrictMode::On => Value::Bool(true),
            StrictMode::Off => Value::Bool(false),
        }
    }
}

impl FromStr for StrictMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(StrictMode::Log),
            "true" => Ok(StrictMode::On),
            "false" => Ok(StrictMode::Off),
            other => Err(format!("expected one of `log`, `true`, `false`, found `{other}`")),
        }
    }
}

impl fmt::Display for StrictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrictMode::Log => f.write_str("log"),
            StrictMode::On => f.write_str("true"),
            StrictMode::Off => f.write_str("false"),
        }
    }
}

impl Serialize for StrictMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl Default for AjvOptions {
    fn default() -> Self {
        AjvOptions {
            coerce_types: false,
            use_defaults: true,
            remove_additional: false,
            strict: StrictMode::Off,
            strict_schema: StrictMode::Off,
            strict_numbers: StrictMode::Off,
            strict_types: StrictMode::Off,
            strict_tuples: StrictMode::Off,
            strict_required: StrictMode::Off,
        }
    }
}

impl AjvOptions {
    /// Constructor options for `new Ajv(...)`.
    ///
    /// `removeAdditional` only appears for the cleaning instance; the shared
    /// instance must keep rejecting unknown properties.
    pub fn runtime_value(&self, cleaning: bool) -> Value {
        let mut out = Map::new();
        out.insert("allErrors".into(), Value::Bool(true));
        out.insert("coerceTypes".into(), Value::Bool(self.coerce_types));
        out.insert("useDefaults".into(), Value::Bool(self.use_defaults));
        out.insert("strict".into(), self.strict.to_value());
        out.insert("strictSchema".into(), self.strict_schema.to_value());
        out.insert("strictNumbers".into(), self.strict_numbers.to_value());
        out.insert("strictTypes".into(), self.strict_types.to_value());
        out.insert("strictTuples".into(), self.strict_tuples.to_value());
        out.insert("strictRequired".into(), self.strict_required.to_value());
        if cleaning {
            out.insert("removeAdditional".into(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            use_named_export: false,
            separate_schema_file: false,
            no_extra_props: false,
            generate_permissive: false,
            ajv: AjvOptions::default(),
        }
    }
}

impl GeneratorOptions {
    /// Cleaning only makes sense when unknown properties are rejected.
    pub fn with_permissive(mut self, no_extra_props: bool, generate_permissive: bool) -> Self {
        self.no_extra_props = no_extra_props;
        self.generate_permissive = generate_permissive;
        self.ajv.remove_additional = no_extra_props && generate_permissive;
        self
    }

    pub fn cleaning(&self) -> bool {
        self.ajv.remove_additional
    }

    /// Option combinations that cannot produce a working module.
    pub fn check(&self, ts: &TsConfig, tsconfig_path: &Path) -> Result<(), ConfigError> {
        if self.separate_schema_file && !ts.resolves_json() {
            return Err(ConfigError::SchemaFileNeedsJsonModules {
                tsconfig: tsconfig_path.to_path_buf(),
            });
        }
        if self.generate_permissive && !self.no_extra_props {
            tracing::warn!("--generate-permissive has no effect without --no-extra-props");
        }
        Ok(())
    }
}

impl TsConfig {
    /// Read `tsconfig.json`; a missing file means compiler defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = match std::fs::read_to_string(path) {
            Ok(src) => src,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no tsconfig, using compiler defaults");
                return Ok(TsConfig::default());
            }
            Err(error) => {
                return Err(ConfigError::TsConfig { path: path.to_path_buf(), message: error.to_string() });
            }
        };
        Self::parse(&src).map_err(|message| ConfigError::TsConfig { path: path.to_path_buf(), message })
    }

    /// tsconfig is JSON with comments and trailing commas.
    pub fn parse(src: &str) -> Result<Self, String> {
        crate::path_de::decode_str(&strip_jsonc(src))
    }

    /// `import X from 'x'` works against CommonJS modules.
    pub fn has_default_interop(&self) -> bool {
        let o = &self.compiler_options;
        o.es_module_interop == Some(true) || o.allow_synthetic_default_imports == Some(true)
    }

    /// Module systems where `import x = require('x')` is the only reliable
    /// spelling without interop.
    pub fn is_commonjs_style(&self) -> bool {
        match self.compiler_options.module.as_deref().map(str::to_ascii_lowercase) {
            None => true,
            Some(module) => matches!(module.as_str(), "commonjs" | "umd" | "amd"),
        }
    }

    pub fn resolves_json(&self) -> bool {
        self.compiler_options.resolve_json_module == Some(true)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Drop `//` and `/* */` comments and trailing commas outside of strings.
fn strip_jsonc(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
            }
            (',', _) => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tsconfig_with_comments_and_trailing_commas() {
        let ts = TsConfig::parse(r#"{
            // editor settings
            "compilerOptions": {
                "module": "ESNext", /* modern */
                "esModuleInterop": true,
                "resolveJsonModule": true,
                "paths": { "a/*": ["src/*"], },
            },
        }"#)
        .unwrap();
        assert_eq!(ts.compiler_options.module.as_deref(), Some("ESNext"));
        assert!(ts.has_default_interop());
        assert!(ts.resolves_json());
        assert!(!ts.is_commonjs_style());
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let ts = TsConfig::parse(r#"{ "compilerOptions": { "module": "//not-a-comment" } }"#).unwrap();
        assert_eq!(ts.compiler_options.module.as_deref(), Some("//not-a-comment"));
    }

    #[test]
    fn unset_module_is_commonjs_style() {
        assert!(TsConfig::default().is_commonjs_style());
        assert!(!TsConfig::default().has_default_interop());
    }

    #[test]
    fn runtime_options_never_strip_on_the_shared_instance() {
        let options = GeneratorOptions::default().with_permissive(true, true);
        assert!(options.cleaning());
        let shared = options.ajv.runtime_value(false);
        assert!(shared.get("removeAdditional").is_none());
        assert_eq!(shared["allErrors"], json!(true));
        assert_eq!(options.ajv.runtime_value(true)["removeAdditional"], json!(true));
    }

    #[test]
    fn permissive_requires_no_extra_props() {
        assert!(!GeneratorOptions::default().with_permissive(false, true).cleaning());
    }

    #[test]
    fn separate_schema_file_needs_json_modules() {
        let options = GeneratorOptions { separate_schema_file: true, ..GeneratorOptions::default() };
        let err = options.check(&TsConfig::default(), Path::new("tsconfig.json")).unwrap_err();
        assert!(err.to_string().contains("resolveJsonModule"));
    }

    #[test]
    fn strict_mode_parses_cli_values() {
        assert_eq!("log".parse::<StrictMode>(), Ok(StrictMode::Log));
        assert_eq!("true".parse::<StrictMode>(), Ok(StrictMode::On));
        assert!("maybe".parse::<StrictMode>().is_err());
        assert_eq!(StrictMode::Log.to_value(), json!("log"));
    }
}
