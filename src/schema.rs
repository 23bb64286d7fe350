//! Strongly-typed schema model.
//!
//! The reflector hands us draft-07 JSON. We decode it once into [`Schema`],
//! keep every keyword the pipeline does not interpret as a pass-through, and
//! encode back to JSON only when emitting code.
//!
//! Boolean schemas (`true`/`false`) are their own variant. Object accessors
//! return `None` for them; they are never treated as an empty object.
use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::error::SchemaError;

pub type Definitions = IndexMap<String, Schema>;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// `true` accepts anything, `false` accepts nothing.
    Bool(bool),
    Node(Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Kind,
    /// Keywords the pipeline does not interpret (`format`, `default`,
    /// `$schema`, ...). Emitted unchanged.
    pub keywords: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Ref(RefTarget),
    AnyOf(Vec<Schema>),
    /// A tagged union rewritten by the normalizer.
    Discriminated(DecisionChain),
    Enum { types: Vec<JsonType>, values: Vec<Value> },
    Object(ObjectShape),
    Array { items: Option<Schema> },
    /// `type` with no further structure, e.g. `"string"` or `["number", "null"]`.
    Type(Vec<JsonType>),
    Unconstrained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Object,
    Array,
}

/// `#/definitions/<name>`; `raw` is the pointer exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTarget {
    pub name: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    /// `type: "object"` was spelled out (as opposed to implied by `properties`).
    pub typed: bool,
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    pub additional: Option<Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    String,
    Number,
}

/// Ordered `(literal, variant)` arms plus the terminal variant.
///
/// `n` variants give `n - 1` arms. The terminal is the last variant, guarded
/// by an assertion that the tag is one of `literals`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionChain {
    pub property: String,
    pub tag: TagType,
    pub arms: Vec<Arm>,
    pub terminal: Schema,
    pub literals: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arm {
    pub literal: Value,
    pub schema: Schema,
}

/// A root schema together with its named definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Schema,
    pub definitions: Definitions,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

static DEFINITION_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#/definitions/(.+)$").expect("static regex")
});

impl JsonType {
    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
            JsonType::Object => "object",
            JsonType::Array => "array",
        }
    }

    fn parse(s: &str) -> Result<Self, SchemaError> {
        Ok(match s {
            "string" => JsonType::String,
            "number" => JsonType::Number,
            "integer" => JsonType::Integer,
            "boolean" => JsonType::Boolean,
            "null" => JsonType::Null,
            "object" => JsonType::Object,
            "array" => JsonType::Array,
            other => return Err(SchemaError::UnknownType(other.to_string())),
        })
    }
}

impl TagType {
    pub fn as_json_type(self) -> JsonType {
        match self {
            TagType::String => JsonType::String,
            TagType::Number => JsonType::Number,
        }
    }
}

impl RefTarget {
    pub fn to(name: impl Into<String>) -> Self {
        let name = name.into();
        let raw = format!("#/definitions/{}", encode_pointer_segment(&name));
        RefTarget { name, raw }
    }

    fn parse(raw: &str) -> Option<Self> {
        let caps = DEFINITION_REF.captures(raw)?;
        let name = decode_pointer_segment(&caps[1]);
        Some(RefTarget { name, raw: raw.to_string() })
    }
}

impl Schema {
    pub fn node(kind: Kind) -> Self {
        Schema::Node(Box::new(Node { kind, keywords: Map::new() }))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Schema::node(Kind::Ref(RefTarget::to(name)))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Schema::Node(node) => Some(node),
            Schema::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Schema::Bool(b) => Some(*b),
            Schema::Node(_) => None,
        }
    }

    pub fn kind(&self) -> Option<&Kind> {
        self.as_node().map(|n| &n.kind)
    }

    /// Object shape of this schema; `None` for booleans and non-object nodes.
    pub fn object(&self) -> Option<&ObjectShape> {
        match self.kind()? {
            Kind::Object(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn properties(&self) -> Option<&IndexMap<String, Schema>> {
        self.object().map(|o| &o.properties)
    }

    pub fn required(&self) -> Option<&[String]> {
        self.object().map(|o| o.required.as_slice())
    }

    pub fn ref_name(&self) -> Option<&str> {
        match self.kind()? {
            Kind::Ref(target) => Some(&target.name),
            _ => None,
        }
    }

    /// The sole literal of a singleton `enum` typed as one primitive.
    pub fn singleton_literal(&self) -> Option<(JsonType, &Value)> {
        match self.kind()? {
            Kind::Enum { types, values } if types.len() == 1 && values.len() == 1 => {
                Some((types[0], &values[0]))
            }
            _ => None,
        }
    }

    /// `anyOf` variants, only when the node carries no other keyword.
    pub fn bare_any_of(&self) -> Option<&[Schema]> {
        let node = self.as_node()?;
        match &node.kind {
            Kind::AnyOf(variants) if node.keywords.is_empty() => Some(variants),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::Bool(b) => Ok(Schema::Bool(*b)),
            Value::Object(map) => Node::from_map(map).map(|n| Schema::Node(Box::new(n))),
            other => Err(SchemaError::NotASchema { found: value_kind(other) }),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Schema::Bool(b) => Value::Bool(*b),
            Schema::Node(node) => node.to_value(),
        }
    }
}

impl Node {
    fn from_map(map: &Map<String, Value>) -> Result<Self, SchemaError> {
        let mut keywords = map.clone();

        if let Some(Value::String(raw)) = keywords.get("$ref") {
            if let Some(target) = RefTarget::parse(raw) {
                keywords.shift_remove("$ref");
                return Ok(Node { kind: Kind::Ref(target), keywords });
            }
        }

        if let Some(any_of) = keywords.shift_remove("anyOf") {
            let variants = schema_list(&any_of, "anyOf")?;
            return Ok(Node { kind: Kind::AnyOf(variants), keywords });
        }

        let types = match keywords.get("type") {
            None => Vec::new(),
            Some(Value::String(s)) => vec![JsonType::parse(s)?],
            Some(Value::Array(xs)) => xs
                .iter()
                .map(|x| match x {
                    Value::String(s) => JsonType::parse(s),
                    _ => Err(SchemaError::Keyword { keyword: "type", expected: "a string or an array of strings" }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(SchemaError::Keyword { keyword: "type", expected: "a string or an array of strings" });
            }
        };

        if let Some(values) = keywords.get("enum") {
            let Value::Array(values) = values else {
                return Err(SchemaError::Keyword { keyword: "enum", expected: "an array" });
            };
            let values = values.clone();
            keywords.shift_remove("enum");
            keywords.shift_remove("type");
            return Ok(Node { kind: Kind::Enum { types, values }, keywords });
        }

        let exactly = |t: JsonType| types.len() == 1 && types[0] == t;
        let implies_object = ["properties", "required", "additionalProperties"]
            .iter()
            .any(|k| keywords.contains_key(*k));

        if exactly(JsonType::Object) || (implies_object && (types.is_empty() || types.contains(&JsonType::Object))) {
            let typed = exactly(JsonType::Object);
            if typed {
                keywords.shift_remove("type");
            }
            let mut shape = ObjectShape { typed, ..ObjectShape::default() };
            if let Some(props) = keywords.shift_remove("properties") {
                let Value::Object(props) = props else {
                    return Err(SchemaError::Keyword { keyword: "properties", expected: "an object" });
                };
                for (name, value) in &props {
                    let schema = Schema::from_value(value).map_err(|e| e.within(format!("properties/{name}")))?;
                    shape.properties.insert(name.clone(), schema);
                }
            }
            if let Some(required) = keywords.shift_remove("required") {
                shape.required = string_list(&required, "required")?;
            }
            if let Some(additional) = keywords.shift_remove("additionalProperties") {
                let schema = Schema::from_value(&additional).map_err(|e| e.within("additionalProperties"))?;
                shape.additional = Some(schema);
            }
            return Ok(Node { kind: Kind::Object(shape), keywords });
        }

        if exactly(JsonType::Array) {
            keywords.shift_remove("type");
            // tuple-form `items` stays a pass-through
            let items = match keywords.get("items") {
                Some(value @ (Value::Object(_) | Value::Bool(_))) => {
                    let schema = Schema::from_value(value).map_err(|e| e.within("items"))?;
                    keywords.shift_remove("items");
                    Some(schema)
                }
                _ => None,
            };
            return Ok(Node { kind: Kind::Array { items }, keywords });
        }

        if !types.is_empty() {
            keywords.shift_remove("type");
            return Ok(Node { kind: Kind::Type(types), keywords });
        }

        Ok(Node { kind: Kind::Unconstrained, keywords })
    }

    fn to_value(&self) -> Value {
        let mut out = Map::new();
        match &self.kind {
            Kind::Ref(target) => {
                out.insert("$ref".into(), Value::from(target.raw.clone()));
            }
            Kind::AnyOf(variants) => {
                out.insert("anyOf".into(), Value::Array(variants.iter().map(Schema::to_value).collect()));
            }
            Kind::Discriminated(chain) => {
                if let Value::Object(rendered) = chain.to_value() {
                    out.extend(rendered);
                }
            }
            Kind::Enum { types, values } => {
                if let Some(ty) = types_value(types) {
                    out.insert("type".into(), ty);
                }
                out.insert("enum".into(), Value::Array(values.clone()));
            }
            Kind::Object(shape) => {
                if shape.typed {
                    out.insert("type".into(), Value::from("object"));
                }
                if !shape.properties.is_empty() {
                    let props = shape.properties.iter()
                        .map(|(k, v)| (k.clone(), v.to_value()))
                        .collect::<Map<_, _>>();
                    out.insert("properties".into(), Value::Object(props));
                }
                if !shape.required.is_empty() {
                    out.insert(
                        "required".into(),
                        Value::Array(shape.required.iter().cloned().map(Value::from).collect()),
                    );
                }
                if let Some(additional) = &shape.additional {
                    out.insert("additionalProperties".into(), additional.to_value());
                }
            }
            Kind::Array { items } => {
                out.insert("type".into(), Value::from("array"));
                if let Some(items) = items {
                    out.insert("items".into(), items.to_value());
                }
            }
            Kind::Type(types) => {
                if let Some(ty) = types_value(types) {
                    out.insert("type".into(), ty);
                }
            }
            Kind::Unconstrained => {}
        }
        for (k, v) in &self.keywords {
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Value::Object(out)
    }
}

impl DecisionChain {
    /// `{properties: {tag: {type, enum: literals}}, required: [tag]}`
    pub fn tag_assertion(&self, literals: &[Value]) -> Value {
        let mut props = Map::new();
        props.insert(
            self.property.clone(),
            json!({ "type": self.tag.as_json_type().as_str(), "enum": literals }),
        );
        json!({ "properties": props, "required": [self.property] })
    }

    /// Nested `if`/`then`/`else`, innermost first.
    pub fn to_value(&self) -> Value {
        let mut out = json!({
            "allOf": [self.tag_assertion(&self.literals), self.terminal.to_value()],
        });
        for arm in self.arms.iter().rev() {
            out = json!({
                "if": self.tag_assertion(std::slice::from_ref(&arm.literal)),
                "then": arm.schema.to_value(),
                "else": out,
            });
        }
        out
    }

    /// Variant schemas in source order, terminal last.
    pub fn variants(&self) -> impl Iterator<Item = &Schema> {
        self.arms.iter().map(|a| &a.schema).chain(std::iter::once(&self.terminal))
    }
}

impl Document {
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        let mut definitions = Definitions::new();
        let root = match value {
            Value::Object(map) => {
                let mut map = map.clone();
                if let Some(defs) = map.shift_remove("definitions") {
                    let Value::Object(defs) = defs else {
                        return Err(SchemaError::Keyword { keyword: "definitions", expected: "an object" });
                    };
                    for (name, body) in &defs {
                        let schema = Schema::from_value(body).map_err(|e| e.within(format!("definitions/{name}")))?;
                        definitions.insert(name.clone(), schema);
                    }
                }
                Schema::Node(Box::new(Node::from_map(&map)?))
            }
            other => Schema::from_value(other)?,
        };
        Ok(Document { root, definitions })
    }

    pub fn to_value(&self) -> Value {
        let mut out = self.root.to_value();
        if let Value::Object(map) = &mut out {
            if !self.definitions.is_empty() {
                let defs = self.definitions.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<_, _>>();
                map.insert("definitions".into(), Value::Object(defs));
            }
        }
        out
    }

    pub fn definition(&self, name: &str) -> Option<&Schema> {
        self.definitions.get(name)
    }

    /// Follow `$ref` chains through the definition map.
    ///
    /// Returns `None` for dangling references and reference cycles.
    pub fn resolve<'a>(&'a self, schema: &'a Schema) -> Option<&'a Schema> {
        let mut visited = HashSet::<&str>::new();
        let mut current = schema;
        while let Some(name) = current.ref_name() {
            if !visited.insert(name) {
                return None;
            }
            current = self.definitions.get(name)?;
        }
        Some(current)
    }

    /// Names of every definition reachable from `start`, `start` included,
    /// in discovery order.
    pub fn reachable_from(&self, start: &str) -> Vec<String> {
        let mut seen = IndexSet::<String>::new();
        let mut stack = vec![start.to_string()];
        while let Some(name) = stack.pop() {
            if seen.contains(&name) {
                continue;
            }
            let Some(body) = self.definitions.get(&name) else { continue };
            seen.insert(name);
            let mut refs = Vec::new();
            collect_refs(&body.to_value(), &mut refs);
            // reverse so the first reference is visited first
            stack.extend(refs.into_iter().rev());
        }
        seen.into_iter().collect()
    }

    /// Pretty JSON with keys sorted at every level.
    pub fn to_stable_string(&self) -> String {
        to_stable_string(&self.to_value())
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Schema::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Pretty JSON (two-space indent) with object keys sorted recursively.
pub fn to_stable_string(value: &Value) -> String {
    format!("{:#}", sorted(value))
}

/// Single-line JSON with object keys sorted recursively.
pub fn to_compact_stable_string(value: &Value) -> String {
    sorted(value).to_string()
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(keys.into_iter().map(|k| (k.clone(), sorted(&map[k]))).collect())
        }
        Value::Array(xs) => Value::Array(xs.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                match (k.as_str(), v) {
                    ("$ref", Value::String(raw)) => {
                        if let Some(target) = RefTarget::parse(raw) {
                            out.push(target.name);
                        }
                    }
                    _ => collect_refs(v, out),
                }
            }
        }
        Value::Array(xs) => xs.iter().for_each(|x| collect_refs(x, out)),
        _ => {}
    }
}

fn schema_list(value: &Value, keyword: &'static str) -> Result<Vec<Schema>, SchemaError> {
    let Value::Array(xs) = value else {
        return Err(SchemaError::Keyword { keyword, expected: "an array of schemas" });
    };
    xs.iter()
        .enumerate()
        .map(|(i, x)| Schema::from_value(x).map_err(|e| e.within(format!("{keyword}/{i}"))))
        .collect()
}

fn string_list(value: &Value, keyword: &'static str) -> Result<Vec<String>, SchemaError> {
    let err = || SchemaError::Keyword { keyword, expected: "an array of strings" };
    let Value::Array(xs) = value else { return Err(err()) };
    xs.iter()
        .map(|x| x.as_str().map(str::to_string).ok_or_else(err))
        .collect()
}

fn types_value(types: &[JsonType]) -> Option<Value> {
    match types {
        [] => None,
        [one] => Some(Value::from(one.as_str())),
        many => Some(Value::Array(many.iter().map(|t| Value::from(t.as_str())).collect())),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Characters `encodeURIComponent` leaves untouched are the only ones kept
/// verbatim in a `#/definitions/` segment.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// JSON-pointer unescape plus the percent-decoding the reflector applies to
/// generic type names (`Omit%3CA%2C%22b%22%3E`).
fn decode_pointer_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .replace("~1", "/")
        .replace("~0", "~")
}

fn encode_pointer_segment(name: &str) -> String {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    utf8_percent_encode(&escaped, URI_COMPONENT).to_string()
}
