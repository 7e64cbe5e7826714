//! Argument normalization for LLM-proposed calls.
//!
//! LLMs are inconsistent about where they put things. Some wrap the
//! arguments in a copy of the call envelope, some put `reasoning` inside
//! the parameters, some do both. This pass repairs exactly these shapes,
//! in this order:
//!
//! 1. `{tool: <this tool>, parameters: {..}, reasoning?}` is unwrapped to
//!    the inner parameters, keeping the top-level `reasoning`.
//! 2. `reasoning` at both levels: the nested one is dropped.
//! 3. `reasoning` only inside `parameters`: hoisted to the top level.
//!
//! Anything that cannot be turned into a JSON object is rejected.

use serde_json::{Map, Value};
use threadclaw_core::error::ToolError;

const REASONING: &str = "reasoning";
const PARAMETERS: &str = "parameters";
const TOOL: &str = "tool";

/// Arguments that passed normalization. Always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArgs(Map<String, Value>);

impl NormalizedArgs {
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Normalize raw arguments proposed for `tool_name`.
pub fn normalize(tool_name: &str, raw: Value) -> Result<NormalizedArgs, ToolError> {
    let mut args = coerce_object(tool_name, raw)?;

    if let Some(inner) = take_envelope(tool_name, &mut args) {
        let top_reasoning = args.remove(REASONING);
        args = inner;
        if let Some(reasoning) = top_reasoning {
            args.insert(REASONING.to_string(), reasoning);
        }
    }

    let nested_reasoning = args
        .get_mut(PARAMETERS)
        .and_then(Value::as_object_mut)
        .and_then(|params| params.remove(REASONING));

    if let Some(nested) = nested_reasoning {
        args.entry(REASONING.to_string()).or_insert(nested);
    }

    Ok(NormalizedArgs(args))
}

fn coerce_object(tool_name: &str, raw: Value) -> Result<Map<String, Value>, ToolError> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(malformed(
                tool_name,
                format!("expected a JSON object, got {}", type_name(&other)),
            )),
            Err(e) => Err(malformed(tool_name, format!("arguments are not valid JSON: {e}"))),
        },
        other => Err(malformed(
            tool_name,
            format!("expected a JSON object, got {}", type_name(&other)),
        )),
    }
}

/// Remove and return the inner parameters if `args` is an envelope for
/// this tool. Single level only.
fn take_envelope(tool_name: &str, args: &mut Map<String, Value>) -> Option<Map<String, Value>> {
    let is_envelope = args.get(TOOL).and_then(Value::as_str) == Some(tool_name)
        && args.get(PARAMETERS).is_some_and(Value::is_object);
    if !is_envelope {
        return None;
    }
    match args.remove(PARAMETERS) {
        Some(Value::Object(inner)) => Some(inner),
        _ => None,
    }
}

fn malformed(tool_name: &str, reason: String) -> ToolError {
    ToolError::MalformedArguments {
        tool_name: tool_name.to_string(),
        reason,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
