// src/exec/output.rs

//! Parsing of the flow host's stdout into output variables.
//!
//! Accepted payloads:
//! - nothing at all (no outputs)
//! - a single JSON object
//! - `key=value` lines; `#` comments and blank lines are skipped

use serde_json::Value;

use crate::errors::ProcessError;
use crate::types::Variables;

pub fn parse_output(stdout: &str) -> Result<Variables, ProcessError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Variables::new());
    }

    if trimmed.starts_with('{') {
        return serde_json::from_str::<Variables>(trimmed)
            .map_err(|e| ProcessError::OutputParse(format!("invalid JSON object: {e}")));
    }

    let mut vars = Variables::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, raw)) = line.split_once('=') else {
            return Err(ProcessError::OutputParse(format!(
                "line {}: expected `key=value`, got {line:?}",
                idx + 1
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(ProcessError::OutputParse(format!(
                "line {}: empty variable name",
                idx + 1
            )));
        }

        vars.insert(key.to_string(), parse_value(raw));
    }

    Ok(vars)
}

/// Interpret a raw value: JSON when it parses as JSON, a plain string otherwise.
pub fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
