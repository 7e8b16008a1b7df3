//! Recursive template traversal.
//!
//! The traverser mirrors the template's topology into the output document:
//! same keys, same sequence ordering, same nesting. String leaves beginning
//! with `<` are instructions and are replaced by their evaluated result;
//! every other scalar is emitted unchanged. Fields whose instruction
//! resolves to absent are omitted — except that a resolved value equal to
//! the literal `"null"` becomes an explicit JSON null (mapping fields keep
//! the key, sequence fields append a null element).

use serde_json::{Map, Value};

use crate::error::Error;
use crate::eval::Evaluator;
use crate::model::RecordContext;

/// Marks a template string leaf as an instruction.
pub const INSTRUCTION_PREFIX: char = '<';

/// A resolved value equal to this literal becomes an explicit JSON null.
const NULL_LITERAL: &str = "null";

/// Rebuild `template` into an output document for the record in `ctx`.
pub fn traverse(
    template: &Value,
    evaluator: &Evaluator,
    ctx: &RecordContext,
) -> Result<Value, Error> {
    match template {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if let Some(produced) = produce(value, evaluator, ctx)? {
                    out.insert(key.clone(), produced);
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                if let Some(produced) = produce(item, evaluator, ctx)? {
                    out.push(produced);
                }
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve one template node: evaluate instructions, recurse into
/// containers, pass literals through. `None` means the node is omitted.
fn produce(
    node: &Value,
    evaluator: &Evaluator,
    ctx: &RecordContext,
) -> Result<Option<Value>, Error> {
    let value = match instruction_text(node) {
        Some(instruction) => match evaluator.evaluate(instruction, ctx)?.into_json() {
            Some(value) => value,
            None => return Ok(None),
        },
        None => traverse(node, evaluator, ctx)?,
    };
    if value == Value::String(NULL_LITERAL.to_string()) {
        return Ok(Some(Value::Null));
    }
    Ok(Some(value))
}

fn instruction_text(node: &Value) -> Option<&str> {
    node.as_str()?.strip_prefix(INSTRUCTION_PREFIX)
}

/// Validate every instruction in a template without touching any record.
///
/// Walks the template, parses each instruction, and compiles each regex
/// part. Returns the number of instructions checked; the first defect
/// fails with a diagnostic naming the offending instruction.
pub fn check_template(template: &Value) -> Result<usize, Error> {
    match template {
        Value::Object(map) => map.values().try_fold(0, |n, v| Ok(n + check_template(v)?)),
        Value::Array(items) => items.iter().try_fold(0, |n, v| Ok(n + check_template(v)?)),
        other => match instruction_text(other) {
            Some(instruction) => {
                check_instruction(instruction)?;
                Ok(1)
            }
            None => Ok(0),
        },
    }
}

fn check_instruction(instruction: &str) -> Result<(), Error> {
    use crate::directive::{parse_instruction, Directive};
    for directive in parse_instruction(instruction)? {
        if let Directive::Ruc {
            pattern: Some(pattern),
            ..
        } = directive
        {
            crate::eval::compile_capture(&pattern, instruction)?;
        }
    }
    Ok(())
}
