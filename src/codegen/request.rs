//! Koa request helpers.
//!
//! A definition whose properties are a non-empty subset of `params`, `query`
//! and `body` describes the combined shape of an incoming request. For each
//! such definition the generated module gets a `validateKoaRequest` overload
//! that pulls those slices off a Koa context and validates them together.
use crate::schema::Document;

use super::template::{fill, ts_string};

/// Canonical slice order; generated code follows it.
pub const REQUEST_SLICES: [&str; 3] = ["params", "query", "body"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestShape {
    pub name: String,
    /// Present slices, in canonical order.
    pub slices: Vec<&'static str>,
}

/// How the helper reaches the compiled validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorLookup<'a> {
    /// Look the definition up in the shared instance by name.
    Registry { instance: &'a str, schema: &'a str },
    /// Reuse the single compiled validator of the module.
    Compiled { validator: &'a str },
}

const KOA_CONTEXT: &str = "\
export interface KoaContext {
  readonly params?: unknown;
  readonly query?: unknown;
  readonly request?: {readonly body?: unknown};
  throw(status: number, message: string): never;
}

type KoaRequestSlices = {params?: unknown; query?: unknown; body?: unknown};";

const SLICE_TABLE: &str = "\
const KOA_REQUEST_SLICES: Readonly<Record<KoaRequestTypeNames, ReadonlyArray<keyof KoaRequestSlices>>> =
  Object.freeze({
{{ROWS}}
  });";

const IMPLEMENTATION: &str = "\
export function validateKoaRequest(typeName: KoaRequestTypeNames): (context: KoaContext) => KoaRequestSlices {
  const validator = {{LOOKUP}};
  return (context: KoaContext): KoaRequestSlices => {
    const raw: KoaRequestSlices = {
      params: context.params,
      query: context.query,
      body: context.request?.body,
    };
    const slices: KoaRequestSlices = {};
    for (const slice of KOA_REQUEST_SLICES[typeName]) {
      slices[slice] = raw[slice];
    }
    if (!validator) {
      throw new Error(`No validator defined for ${typeName}`);
    }
    if (!validator(slices)) {
      const [first] = failuresOf(validator.errors);
      const where = first ? first.path.replace(/^\\//, '').replace(/\\//g, '.') : '';
      const reason = [where, first ? first.message : 'is invalid'].filter(Boolean).join(' ');
      return context.throw(400, `Invalid request: ${reason}\\n\\n${inspect(raw)}`);
    }
    return slices;
  };
}";

/// Request-shaped definitions among `exported`, in definition-map order.
pub fn request_shapes(schema: &Document, exported: impl Fn(&str) -> bool) -> Vec<RequestShape> {
    schema.definitions
        .iter()
        .filter(|(name, _)| exported(name.as_str()))
        .filter_map(|(name, body)| {
            let properties = body.properties()?;
            if properties.is_empty() || !properties.keys().all(|k| REQUEST_SLICES.contains(&k.as_str())) {
                return None;
            }
            let slices = REQUEST_SLICES
                .into_iter()
                .filter(|slice| properties.contains_key(*slice))
                .collect();
            Some(RequestShape { name: name.clone(), slices })
        })
        .collect()
}

/// The whole helper block, or `None` when nothing is request-shaped.
pub fn emit(shapes: &[RequestShape], lookup: ValidatorLookup) -> Option<String> {
    if shapes.is_empty() {
        return None;
    }
    let names = shapes.iter().map(|s| ts_string(&s.name)).collect::<Vec<_>>().join(" | ");
    let rows = shapes
        .iter()
        .map(|s| {
            let slices = s.slices.iter().map(|x| ts_string(x)).collect::<Vec<_>>().join(", ");
            format!("    {}: [{}],", ts_string(&s.name), slices)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let overloads = shapes
        .iter()
        .map(|s| {
            let fields = s.slices
                .iter()
                .map(|slice| format!("{slice}: {}['{slice}']", s.name))
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "export function validateKoaRequest(typeName: {}): (context: KoaContext) => {{{fields}}};",
                ts_string(&s.name)
            )
        })
        .chain(std::iter::once(
            "export function validateKoaRequest(typeName: KoaRequestTypeNames): (context: KoaContext) => KoaRequestSlices;"
                .to_string(),
        ))
        .collect::<Vec<_>>()
        .join("\n");
    let lookup = match lookup {
        ValidatorLookup::Registry { instance, schema } => {
            format!("{instance}.getSchema(`{schema}#/definitions/${{typeName}}`)")
        }
        ValidatorLookup::Compiled { validator } => validator.to_string(),
    };

    let sections = [
        KOA_CONTEXT.to_string(),
        format!("export type KoaRequestTypeNames = {names};"),
        fill(SLICE_TABLE, &[("ROWS", &rows)]),
        overloads,
        fill(IMPLEMENTATION, &[("LOOKUP", &lookup)]),
    ];
    Some(sections.join("\n\n"))
}
