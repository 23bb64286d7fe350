//! Schema normalization.
//!
//! Goal: rewrite tagged unions (`anyOf` over object variants sharing one
//! literal-valued tag) into an explicit decision chain, so validators pick the
//! variant by its tag instead of trying every branch. Pure: the input document
//! is borrowed, a new one is returned, and no definition is ever dropped.
//!
//! When no single tag qualifies the `anyOf` is kept as-is. That is a normal
//! outcome, not an error.
use serde_json::Value;

use crate::schema::{Arm, DecisionChain, Document, JsonType, Kind, Node, Schema, TagType};

/// A required property holding exactly one literal of one primitive type.
#[derive(Debug, Clone, PartialEq)]
struct Candidate<'a> {
    name: &'a str,
    tag: TagType,
    literal: &'a Value,
}

// ------------------------------- Normalize -------------------------------- //

/// Rewrite the root `anyOf` and every definition whose whole body is a bare
/// `anyOf`. Idempotent: a rewritten body is no longer an `anyOf`.
pub fn normalize(doc: &Document) -> Document {
    let root = match doc.root.as_node() {
        Some(node) => match &node.kind {
            Kind::AnyOf(variants) => match discriminate(variants, doc, "<root>") {
                Some(chain) => Schema::Node(Box::new(Node {
                    kind: Kind::Discriminated(chain),
                    keywords: node.keywords.clone(),
                })),
                None => doc.root.clone(),
            },
            _ => doc.root.clone(),
        },
        None => doc.root.clone(),
    };

    let definitions = doc.definitions
        .iter()
        .map(|(name, body)| {
            let body = body
                .bare_any_of()
                .and_then(|variants| discriminate(variants, doc, name))
                .map(|chain| Schema::node(Kind::Discriminated(chain)))
                .unwrap_or_else(|| body.clone());
            (name.clone(), body)
        })
        .collect();

    Document { root, definitions }
}

/// Build the decision chain for one variant group, if exactly one tag
/// qualifies.
fn discriminate(variants: &[Schema], doc: &Document, label: &str) -> Option<DecisionChain> {
    let (last, leading) = variants.split_last()?;

    // every variant must resolve to an object shape
    let mut resolved = Vec::with_capacity(variants.len());
    for variant in variants {
        match doc.resolve(variant) {
            Some(target) if target.object().is_some() => resolved.push(target),
            _ => {
                tracing::trace!(definition = label, "union keeps anyOf: variant is not a resolvable object");
                return None;
            }
        }
    }

    let per_variant: Vec<Vec<Candidate>> = resolved.iter().map(|v| candidates(v, doc)).collect();

    let qualifying: Vec<&str> = per_variant[0]
        .iter()
        .map(|c| c.name)
        .filter(|name| qualifies(name, &per_variant))
        .collect();

    let [property] = qualifying.as_slice() else {
        tracing::trace!(
            definition = label,
            candidates = qualifying.len(),
            "union keeps anyOf: no single discriminant"
        );
        return None;
    };

    let tagged: Vec<&Candidate> = per_variant
        .iter()
        .filter_map(|cs| cs.iter().find(|c| c.name == *property))
        .collect();
    let tag = tagged[0].tag;
    let literals: Vec<Value> = tagged.iter().map(|c| c.literal.clone()).collect();

    let arms = leading
        .iter()
        .zip(&literals)
        .map(|(schema, literal)| Arm { literal: literal.clone(), schema: schema.clone() })
        .collect();

    tracing::debug!(
        definition = label,
        discriminant = *property,
        variants = variants.len(),
        "rewrote tagged union into decision chain"
    );

    Some(DecisionChain {
        property: property.to_string(),
        tag,
        arms,
        terminal: last.clone(),
        literals,
    })
}

/// Required properties of `variant` whose schema is a string- or number-typed
/// singleton `enum`, in `required` order.
fn candidates<'a>(variant: &'a Schema, doc: &'a Document) -> Vec<Candidate<'a>> {
    let (Some(required), Some(properties)) = (variant.required(), variant.properties()) else {
        return Vec::new();
    };
    let mut out: Vec<Candidate> = Vec::new();
    for name in required.iter().map(String::as_str) {
        if out.iter().any(|c| c.name == name) {
            continue;
        }
        let Some(prop) = properties.get(name).and_then(|p| doc.resolve(p)) else { continue };
        let Some((ty, literal)) = prop.singleton_literal() else { continue };
        let tag = match ty {
            JsonType::String => TagType::String,
            JsonType::Number => TagType::Number,
            _ => continue,
        };
        out.push(Candidate { name, tag, literal });
    }
    out
}

/// Present in every variant, same primitive everywhere, literals pairwise
/// distinct.
fn qualifies(name: &str, per_variant: &[Vec<Candidate>]) -> bool {
    let mut seen: Vec<&Value> = Vec::with_capacity(per_variant.len());
    let mut first_tag = None;
    for cs in per_variant {
        let Some(c) = cs.iter().find(|c| c.name == name) else { return false };
        match first_tag {
            None => first_tag = Some(c.tag),
            Some(tag) if tag != c.tag => return false,
            Some(_) => {}
        }
        if seen.iter().any(|v| same_literal(v, c.literal)) {
            return false;
        }
        seen.push(c.literal);
    }
    true
}

/// JSON equality, with numbers compared by value (`1` == `1.0`).
fn same_literal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

// ------------------------------- Sealing --------------------------------- //

/// Forbid unknown properties on every explicitly typed object that does not
/// already state an `additionalProperties` policy.
pub fn seal_objects(doc: &Document) -> Document {
    Document {
        root: seal(&doc.root),
        definitions: doc.definitions
            .iter()
            .map(|(k, v)| (k.clone(), seal(v)))
            .collect(),
    }
}

fn seal(schema: &Schema) -> Schema {
    let Schema::Node(node) = schema else { return schema.clone() };
    let kind = match &node.kind {
        Kind::Object(shape) => {
            let mut shape = shape.clone();
            for prop in shape.properties.values_mut() {
                *prop = seal(prop);
            }
            shape.additional = match &shape.additional {
                Some(extra) => Some(seal(extra)),
                None if shape.typed => Some(Schema::Bool(false)),
                None => None,
            };
            Kind::Object(shape)
        }
        Kind::Array { items } => Kind::Array { items: items.as_ref().map(seal) },
        Kind::AnyOf(variants) => Kind::AnyOf(variants.iter().map(seal).collect()),
        Kind::Discriminated(chain) => {
            let mut chain = chain.clone();
            for arm in &mut chain.arms {
                arm.schema = seal(&arm.schema);
            }
            chain.terminal = seal(&chain.terminal);
            Kind::Discriminated(chain)
        }
        other => other.clone(),
    };
    Schema::Node(Box::new(Node { kind, keywords: node.keywords.clone() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(&value).unwrap()
    }

    fn tagged(tag: &str, literal: Value, extra: &str) -> Value {
        let ty = if literal.is_string() { "string" } else { "number" };
        json!({
            "type": "object",
            "properties": {
                tag: { "type": ty, "enum": [literal] },
                extra: { "type": "string" }
            },
            "required": [tag, extra]
        })
    }

    #[test]
    fn rewrites_definition_with_single_discriminant() {
        let input = doc(json!({
            "definitions": {
                "Value": { "anyOf": [
                    tagged("number", json!(0), "foo"),
                    tagged("number", json!(1), "bar"),
                    tagged("number", json!(2), "baz")
                ] }
            }
        }));
        let out = normalize(&input);
        let Some(Kind::Discriminated(chain)) = out.definition("Value").and_then(Schema::kind) else {
            panic!("expected a decision chain");
        };
        assert_eq!(chain.property, "number");
        assert_eq!(chain.tag, TagType::Number);
        assert_eq!(chain.arms.len(), 2);
        assert_eq!(chain.arms[0].literal, json!(0));
        assert_eq!(chain.arms[1].literal, json!(1));
        assert_eq!(chain.literals, vec![json!(0), json!(1), json!(2)]);
        assert!(chain.terminal.required().unwrap().contains(&"baz".to_string()));
    }

    #[test]
    fn resolves_reference_variants_but_keeps_refs_in_the_chain() {
        let input = doc(json!({
            "definitions": {
                "EntityOne": tagged("type", json!("TypeOne"), "foo"),
                "EntityTwo": tagged("type", json!("TypeTwo"), "bar"),
                "Entity": { "anyOf": [
                    { "$ref": "#/definitions/EntityOne" },
                    { "$ref": "#/definitions/EntityTwo" },
                    tagged("type", json!("TypeThree"), "baz")
                ] }
            }
        }));
        let out = normalize(&input);
        let Some(Kind::Discriminated(chain)) = out.definition("Entity").and_then(Schema::kind) else {
            panic!("expected a decision chain");
        };
        assert_eq!(chain.arms[0].schema.ref_name(), Some("EntityOne"));
        assert_eq!(chain.arms[1].schema.ref_name(), Some("EntityTwo"));
        assert_eq!(out.definitions.len(), input.definitions.len());
    }

    #[test]
    fn single_tagged_variant_is_a_chain_without_arms() {
        let input = doc(json!({
            "definitions": { "Only": { "anyOf": [tagged("kind", json!("a"), "foo")] } }
        }));
        let out = normalize(&input);
        let Some(Kind::Discriminated(chain)) = out.definition("Only").and_then(Schema::kind) else {
            panic!("expected a decision chain");
        };
        assert!(chain.arms.is_empty());
        assert_eq!(chain.literals, vec![json!("a")]);

        let rendered = out.definition("Only").unwrap().to_value();
        assert!(rendered.get("if").is_none());
        assert_eq!(rendered["allOf"][0]["properties"]["kind"]["enum"], json!(["a"]));
        assert_eq!(rendered["allOf"][1]["required"], json!(["kind", "foo"]));
    }

    #[test]
    fn empty_anyof_is_left_alone() {
        let input = doc(json!({ "definitions": { "Never": { "anyOf": [] } } }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn cyclic_variant_refs_fall_back_without_recursing() {
        let input = doc(json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" },
                "U": { "anyOf": [
                    { "$ref": "#/definitions/A" },
                    tagged("kind", json!("b"), "bar")
                ] }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn cyclic_tag_property_refs_are_not_candidates() {
        let variant = |literal: &str| json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": [literal] },
                "loop": { "$ref": "#/definitions/Loop" }
            },
            "required": ["kind", "loop"]
        });
        let input = doc(json!({
            "definitions": {
                "Loop": { "$ref": "#/definitions/Loop" },
                "U": { "anyOf": [variant("a"), variant("b")] }
            }
        }));
        let out = normalize(&input);
        let Some(Kind::Discriminated(chain)) = out.definition("U").and_then(Schema::kind) else {
            panic!("expected a decision chain");
        };
        assert_eq!(chain.property, "kind");
    }

    #[test]
    fn colliding_literals_fall_back() {
        let input = doc(json!({
            "definitions": {
                "U": { "anyOf": [ tagged("kind", json!("a"), "x"), tagged("kind", json!("a"), "y") ] }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn numerically_equal_literals_collide() {
        let input = doc(json!({
            "definitions": {
                "U": { "anyOf": [ tagged("kind", json!(1), "x"), tagged("kind", json!(1.0), "y") ] }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn two_equally_good_tags_fall_back() {
        let variant = |a: &str, b: i64| json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": [a] },
                "code": { "type": "number", "enum": [b] }
            },
            "required": ["kind", "code"]
        });
        let input = doc(json!({
            "definitions": { "U": { "anyOf": [variant("a", 1), variant("b", 2)] } }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn mixed_tag_types_fall_back() {
        let input = doc(json!({
            "definitions": {
                "U": { "anyOf": [ tagged("kind", json!("a"), "x"), tagged("kind", json!(1), "y") ] }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn boolean_and_primitive_variants_fall_back() {
        let input = doc(json!({
            "definitions": {
                "B": { "anyOf": [ true, tagged("kind", json!("a"), "x") ] },
                "P": { "anyOf": [ { "type": "string" }, tagged("kind", json!("a"), "x") ] },
                "D": { "anyOf": [ { "$ref": "#/definitions/Missing" }, tagged("kind", json!("a"), "x") ] }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn anyof_with_extra_keywords_is_not_bare() {
        let input = doc(json!({
            "definitions": {
                "U": {
                    "description": "kept as is",
                    "anyOf": [ tagged("kind", json!("a"), "x"), tagged("kind", json!("b"), "y") ]
                }
            }
        }));
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn root_anyof_keeps_its_keywords() {
        let input = doc(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "anyOf": [ tagged("kind", json!("a"), "x"), tagged("kind", json!("b"), "y") ]
        }));
        let out = normalize(&input);
        let node = out.root.as_node().unwrap();
        assert!(matches!(node.kind, Kind::Discriminated(_)));
        assert!(node.keywords.contains_key("$schema"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = doc(json!({
            "definitions": {
                "Value": { "anyOf": [ tagged("n", json!(0), "foo"), tagged("n", json!(1), "bar") ] },
                "Plain": { "type": "string" }
            }
        }));
        let once = normalize(&input);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn seal_closes_typed_objects_only() {
        let input = doc(json!({
            "definitions": {
                "Closed": {
                    "type": "object",
                    "properties": { "inner": { "type": "object", "properties": {} } }
                },
                "Open": { "type": "object", "additionalProperties": true },
                "Untyped": { "properties": { "a": { "type": "string" } } }
            }
        }));
        let out = seal_objects(&input);
        let closed = out.definition("Closed").unwrap().object().unwrap();
        assert_eq!(closed.additional, Some(Schema::Bool(false)));
        let inner = closed.properties.get("inner").unwrap().object().unwrap();
        assert_eq!(inner.additional, Some(Schema::Bool(false)));
        assert_eq!(out.definition("Open").unwrap().object().unwrap().additional, Some(Schema::Bool(true)));
        assert_eq!(out.definition("Untyped").unwrap().object().unwrap().additional, None);
    }
}
