//! JSON Schema for the configuration file.

use serde_json::Value;

use crate::config::LibraryConfig;
use crate::error::{ConfigError, Result};

/// Generate the JSON Schema for `bale.toml` / `package.json#bale`.
pub fn json_schema() -> Value {
    schemars::schema_for!(LibraryConfig).to_value()
}

/// Check a raw configuration value against the schema, collecting every violation.
///
/// Runs before figment extraction so a file with several mistakes is reported
/// in one pass instead of one serde error at a time.
pub fn validate_value(value: &Value) -> Result<()> {
    let schema = json_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| ConfigError::SchemaValidation(vec![format!("invalid schema: {e}")]))?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::SchemaValidation(errors))
    }
}
