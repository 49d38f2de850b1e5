//! JSON Schema validation for command spec files.
//!
//! Spec files are validated against schemas/command_spec.schema.json before
//! they are accepted as input to the renderer or the gap analyzer.

use jsonschema::Validator;
use std::sync::OnceLock;

const COMMAND_SPEC_SCHEMA_JSON: &str = include_str!("../../../../schemas/command_spec.schema.json");

/// Compiled once; a broken embedded schema is remembered as its message.
static COMPILED_SCHEMA: OnceLock<Result<Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static Validator, String> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(COMMAND_SPEC_SCHEMA_JSON)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("Failed to compile schema: {}", e))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate a spec JSON value against the schema.
///
/// Returns every violation, each suffixed with its instance path.
pub fn validate_spec_schema(spec_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator()
        .map_err(|e| vec![e])?
        .iter_errors(spec_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
