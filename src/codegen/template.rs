//! TypeScript snippets for each section of a generated module.
//!
//! Placeholders are `{{NAME}}` and are filled by [`fill`].

pub const DISABLE_LINT: &str = "/* eslint-disable */\n// tslint:disable";

pub const BANNER: &str = "// generated by json-guard; do not edit by hand";

pub const IMPORT_INSPECT: &str = "import {inspect} from 'util';";

pub const IMPORT_AJV: &str = "\
import Ajv from 'ajv';
import addFormats from 'ajv-formats';
import type {ErrorObject} from 'ajv';";

pub const DECLARE_AJV: &str = "\
export const {{INSTANCE}} = new Ajv({{OPTIONS}});
addFormats({{INSTANCE}}, {mode: '{{FORMAT_MODE}}'});";

pub const ADD_SCHEMA: &str = "{{INSTANCE}}.addSchema({{SCHEMA}}, '{{SCHEMA}}');";

pub const INLINE_SCHEMA: &str = "export const {{SCHEMA}} = {{JSON}};";

pub const IMPORT_SCHEMA_DEFAULT: &str = "\
import {{SCHEMA}}Json from '{{PATH}}';
export const {{SCHEMA}} = {{SCHEMA}}Json;";

pub const IMPORT_SCHEMA_REQUIRE: &str = "\
import {{SCHEMA}}Json = require('{{PATH}}');
export const {{SCHEMA}} = {{SCHEMA}}Json;";

pub const IMPORT_SCHEMA_NAMESPACE: &str = "\
import * as {{SCHEMA}}Json from '{{PATH}}';
export const {{SCHEMA}} = {{SCHEMA}}Json;";

/// Runtime failure type. `{{MESSAGE}}` is an expression over `typeName`,
/// `failures` and `dump`.
pub const VALIDATION_ERROR: &str = "\
export interface ValidationFailure {
  readonly path: string;
  readonly message: string;
}

export class ValidationError extends Error {
  readonly typeName: string;
  readonly failures: ReadonlyArray<ValidationFailure>;
  readonly dump: string;

  constructor(typeName: string, failures: ValidationFailure[], value: unknown) {
    const dump = inspect(value);
    super({{MESSAGE}});
    this.name = 'ValidationError';
    this.typeName = typeName;
    this.failures = failures;
    this.dump = dump;
  }
}

function failuresOf(errors: ErrorObject[] | null | undefined): ValidationFailure[] {
  return (errors ?? [])
    .filter((error) => error.keyword !== 'if')
    .map((error) => ({path: error.instancePath, message: error.message ?? 'is invalid'}));
}";

pub const COLLECTION_MESSAGE: &str =
    "`Invalid ${typeName}: ` + failures.map((f) => `${typeName}${f.path} ${f.message}`).join(', ')";

pub const SINGLE_MESSAGE: &str =
    "failures.map((f) => `${typeName}${f.path} ${f.message}`).join('\\n') + `\\n\\n${dump}`";

pub const OVERLOAD: &str =
    "export function {{FUNCTION}}(typeName: {{NAME}}): (value: unknown) => {{TYPE}};";

pub const COLLECTION_IMPLEMENTATION: &str = "\
export function {{FUNCTION}}(typeName: AllowedTypeNames): (value: unknown) => unknown {
  const validator = {{INSTANCE}}.getSchema(`{{SCHEMA}}#/definitions/${typeName}`);
  return (value: unknown): unknown => {
    if (!validator) {
      throw new Error(`No validator defined for {{SCHEMA}}#/definitions/${typeName}`);
    }
    if (validator(value)) {
      return value;
    }
    throw new ValidationError(typeName, failuresOf(validator.errors), value);
  };
}";

pub const SINGLE_COMPILE: &str =
    "const {{VALIDATOR}} = {{INSTANCE}}.compile<{{TYPE}}>({{SCHEMA}});";

pub const SINGLE_IMPLEMENTATION: &str = "\
export {{EXPORT}}function {{FUNCTION}}(value: unknown): {{TYPE}} {
  if ({{VALIDATOR}}(value)) {
    return value;
  }
  throw new ValidationError('{{TYPE}}', failuresOf({{VALIDATOR}}.errors), value);
}";

/// Replace every `{{KEY}}` with its value.
pub fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Single-quoted TypeScript string literal.
pub fn ts_string(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n");
    format!("'{escaped}'")
}
