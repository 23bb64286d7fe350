//! Boundary with the external type reflector.
//!
//! The reflector compiles the source files and walks their declarations; we
//! only consume what it produces: the structural schema plus the table of
//! exported symbols and the file each one comes from.
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::{ReflectionError, SynthesisError};
use crate::schema::{Document, Kind, Node, RefTarget, Schema};

/// Exported type names for one processing unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolTable {
    /// Stable order; generated code follows it.
    pub symbols: Vec<String>,
    /// Source file → type names it exports.
    #[serde(default)]
    pub symbols_by_file: IndexMap<String, Vec<String>>,
    /// Source file → the type that is the file's default export.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub default_exports: IndexMap<String, String>,
}

/// Everything the reflector produced for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectedTypes {
    pub schema: Document,
    #[serde(flatten)]
    pub table: SymbolTable,
}

impl SymbolTable {
    pub fn contains(&self, name: &str) -> bool {
        self.symbols.iter().any(|s| s == name)
    }

    /// Source file exporting `name`.
    pub fn source_of(&self, name: &str) -> Option<&str> {
        self.symbols_by_file
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(file, _)| file.as_str())
    }

    pub fn is_default_export(&self, file: &str, name: &str) -> bool {
        self.default_exports.get(file).is_some_and(|d| d == name)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.symbols_by_file.keys().map(String::as_str)
    }

    /// Only the symbols exported by `file`, in table order.
    pub fn restricted_to(&self, file: &str) -> SymbolTable {
        let symbols = self.symbols
            .iter()
            .filter(|s| self.source_of(s) == Some(file))
            .cloned()
            .collect();
        let mut symbols_by_file = IndexMap::new();
        if let Some(names) = self.symbols_by_file.get(file) {
            symbols_by_file.insert(file.to_string(), names.clone());
        }
        let mut default_exports = IndexMap::new();
        if let Some(name) = self.default_exports.get(file) {
            default_exports.insert(file.to_string(), name.clone());
        }
        SymbolTable { symbols, symbols_by_file, default_exports }
    }
}

impl ReflectedTypes {
    pub fn load(path: &Path) -> Result<Self, ReflectionError> {
        let bytes = std::fs::read(path).map_err(|source| ReflectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reflected: ReflectedTypes = crate::path_de::from_slice_with_path(&bytes, path)?;
        reflected.check()?;
        Ok(reflected)
    }

    pub fn parse(src: &str, origin: &Path) -> Result<Self, ReflectionError> {
        let reflected: ReflectedTypes = crate::path_de::from_str_with_path(src, origin)?;
        reflected.check()?;
        Ok(reflected)
    }

    /// Every exported symbol must have a definition to validate against.
    fn check(&self) -> Result<(), ReflectionError> {
        let listed = self.table.symbols.iter()
            .chain(self.table.symbols_by_file.values().flatten());
        for name in listed {
            if self.schema.definition(name).is_none() {
                return Err(ReflectionError::DanglingSymbol(name.clone()));
            }
        }
        Ok(())
    }

    /// Schema for one type: a root `$ref` plus the definitions it reaches.
    pub fn for_type(&self, name: &str) -> Result<Document, SynthesisError> {
        if !self.table.contains(name) || self.schema.definition(name).is_none() {
            return Err(SynthesisError::UnknownType(name.to_string()));
        }
        let reachable = self.schema.reachable_from(name);
        let definitions = self.schema.definitions
            .iter()
            .filter(|(k, _)| reachable.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let keywords = self.schema.root.as_node()
            .map(|n| n.keywords.clone())
            .unwrap_or_else(Map::new);
        let root = Schema::Node(Box::new(Node {
            kind: Kind::Ref(RefTarget::to(name)),
            keywords,
        }));
        Ok(Document { root, definitions })
    }

    /// The same schema, with the symbol table narrowed to one source file.
    pub fn for_file(&self, file: &str) -> ReflectedTypes {
        ReflectedTypes {
            schema: self.schema.clone(),
            table: self.table.restricted_to(file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complex() -> ReflectedTypes {
        let src = json!({
            "schema": {
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {
                    "MyEnum": { "type": "number", "enum": [0, 1, 2] },
                    "TypeA": {
                        "type": "object",
                        "properties": { "id": { "type": "number" }, "value": { "type": "string" } },
                        "required": ["id", "value"]
                    },
                    "RequestB": {
                        "type": "object",
                        "properties": { "query": { "$ref": "#/definitions/TypeA" } },
                        "required": ["query"]
                    }
                }
            },
            "symbols": ["MyEnum", "TypeA", "RequestB"],
            "symbolsByFile": {
                "src/ComplexExample.ts": ["MyEnum", "TypeA"],
                "src/Requests.ts": ["RequestB"]
            }
        });
        ReflectedTypes::parse(&src.to_string(), Path::new("complex.json")).unwrap()
    }

    #[test]
    fn projects_single_type_with_reachable_definitions() {
        let doc = complex().for_type("RequestB").unwrap();
        assert_eq!(doc.root.ref_name(), Some("RequestB"));
        assert_eq!(doc.definitions.keys().collect::<Vec<_>>(), vec!["TypeA", "RequestB"]);
        assert_eq!(
            doc.root.as_node().unwrap().keywords.get("$schema"),
            Some(&json!("http://json-schema.org/draft-07/schema#"))
        );
    }

    #[test]
    fn unknown_type_is_a_synthesis_error() {
        assert_eq!(
            complex().for_type("Nope").unwrap_err(),
            SynthesisError::UnknownType("Nope".into())
        );
    }

    #[test]
    fn restricts_symbols_to_one_file() {
        let unit = complex().for_file("src/ComplexExample.ts");
        assert_eq!(unit.table.symbols, vec!["MyEnum", "TypeA"]);
        assert_eq!(unit.table.source_of("RequestB"), None);
        assert_eq!(unit.schema.definitions.len(), 3);
    }

    #[test]
    fn dangling_symbol_is_rejected() {
        let src = json!({ "schema": { "definitions": {} }, "symbols": ["Ghost"] });
        let err = ReflectedTypes::parse(&src.to_string(), Path::new("ghost.json")).unwrap_err();
        assert!(matches!(err, ReflectionError::DanglingSymbol(name) if name == "Ghost"));
    }

    #[test]
    fn decode_errors_carry_the_json_path() {
        let src = json!({ "schema": 5, "symbols": [] });
        let err = ReflectedTypes::parse(&src.to_string(), Path::new("bad.json")).unwrap_err().to_string();
        assert!(err.contains("at JSON path schema"), "{err}");
        assert!(err.contains("found a number"), "{err}");
    }
}
