use std::path::{Path, PathBuf};

use json_guard::schema::{Kind, Schema};
use json_guard::{Document, ReflectedTypes, normalize};
use serde_json::{Value, json};

fn fixture(name: &str) -> ReflectedTypes {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    ReflectedTypes::load(&path).unwrap()
}

/// Draft-07 validator over `doc` with its root pointed at `name`.
fn validator(doc: &Document, name: &str) -> jsonschema::Validator {
    let mut schema = doc.to_value();
    schema["$ref"] = json!(format!("#/definitions/{name}"));
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(&schema)
        .unwrap()
}

#[test]
fn normalize_is_idempotent_on_fixtures() {
    for name in ["example.json", "disjoint_union.json", "complex.json"] {
        let reflected = fixture(name);
        let once = normalize(&reflected.schema);
        assert_eq!(normalize(&once), once, "{name}");
    }
}

#[test]
fn never_drops_definitions() {
    for name in ["example.json", "disjoint_union.json", "complex.json"] {
        let reflected = fixture(name);
        let out = normalize(&reflected.schema);
        let before: Vec<_> = reflected.schema.definitions.keys().collect();
        let after: Vec<_> = out.definitions.keys().collect();
        assert_eq!(before, after, "{name}");
    }
}

#[test]
fn tagged_union_becomes_ordered_chain() {
    let out = normalize(&fixture("disjoint_union.json").schema);
    let Some(Kind::Discriminated(chain)) = out.definition("Value").and_then(Schema::kind) else {
        panic!("Value should be discriminated");
    };
    assert_eq!(chain.property, "kind");
    let arms: Vec<(&Value, Option<&str>)> = chain.arms
        .iter()
        .map(|arm| (&arm.literal, arm.schema.ref_name()))
        .collect();
    assert_eq!(arms, vec![(&json!(0), Some("EntityOne")), (&json!(1), Some("EntityTwo"))]);
    assert_eq!(chain.terminal.ref_name(), Some("EntityThree"));

    let rendered = out.definition("Value").unwrap().to_value();
    assert!(rendered.get("anyOf").is_none());
    assert_eq!(rendered["if"]["properties"]["kind"]["enum"], json!([0]));
    assert_eq!(rendered["else"]["if"]["properties"]["kind"]["enum"], json!([1]));
    assert_eq!(rendered["else"]["else"]["allOf"][0]["properties"]["kind"]["enum"], json!([0, 1, 2]));
}

#[test]
fn normalized_union_accepts_the_same_values() {
    let original = fixture("disjoint_union.json").schema;
    let normalized = normalize(&original);
    let before = validator(&original, "Value");
    let after = validator(&normalized, "Value");

    let samples = [
        json!({ "kind": 0, "foo": "x" }),
        json!({ "kind": 1, "bar": "y" }),
        json!({ "kind": 2, "baz": "z" }),
        json!({ "kind": 0 }),
        json!({ "kind": 0, "bar": "y" }),
        json!({ "kind": 2, "foo": "x" }),
        json!({ "kind": 3, "foo": "x" }),
        json!({ "kind": "0", "foo": "x" }),
        json!({ "foo": "x" }),
        json!({ "kind": 1, "bar": 3 }),
        json!({}),
        json!([]),
        json!(null),
        json!(5),
    ];
    for sample in &samples {
        assert_eq!(before.is_valid(sample), after.is_valid(sample), "disagreement on {sample}");
    }
}

#[test]
fn discriminated_errors_name_the_missing_field() {
    let normalized = normalize(&fixture("disjoint_union.json").schema);
    let messages: Vec<String> = validator(&normalized, "Value")
        .iter_errors(&json!({ "kind": 0 }))
        .map(|error| error.to_string())
        .collect();
    assert!(!messages.is_empty());
    assert!(messages.iter().any(|m| m.contains("foo")), "{messages:?}");
    assert!(messages.iter().all(|m| !m.contains("anyOf")), "{messages:?}");
}

#[test]
fn colliding_tags_keep_the_union() {
    let src = json!({
        "schema": {
            "definitions": {
                "A": { "type": "object", "properties": { "kind": { "type": "string", "enum": ["same"] } }, "required": ["kind"] },
                "B": { "type": "object", "properties": { "kind": { "type": "string", "enum": ["same"] } }, "required": ["kind"] },
                "U": { "anyOf": [ { "$ref": "#/definitions/A" }, { "$ref": "#/definitions/B" } ] }
            }
        },
        "symbols": ["U"],
        "symbolsByFile": { "src/U.ts": ["U"] }
    });
    let reflected = ReflectedTypes::parse(&src.to_string(), Path::new("inline.json")).unwrap();
    assert_eq!(normalize(&reflected.schema), reflected.schema);
}

#[test]
fn single_type_projection_normalizes_reachable_union() {
    let reflected = fixture("disjoint_union.json");
    let doc = normalize(&reflected.for_type("Value").unwrap());
    assert_eq!(doc.root.ref_name(), Some("Value"));
    assert!(matches!(doc.definition("Value").and_then(Schema::kind), Some(Kind::Discriminated(_))));
    assert!(doc.definition("EntityOne").is_some());
}
