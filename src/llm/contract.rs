//! Structured response contracts.
//!
//! A contract is the JSON schema an agent's reply must follow. The gateway
//! only checks the parts that matter for routing: the reply must be a JSON
//! object carrying every required top-level field.

use crate::types::ContractViolation;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Text shown to the user when a structured reply could not be used.
pub const FALLBACK_APOLOGY: &str =
    "Sorry, I could not produce a well-formed answer this time. Please try again.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseContract {
    pub name: String,
    pub schema: Value,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    true
}

impl ResponseContract {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// Parse a contract document. Accepts either the full
    /// `{"name", "schema", "strict"}` wrapper or a bare JSON schema, in which
    /// case `fallback_name` is used.
    pub fn from_json(text: &str, fallback_name: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| format!("contract is not valid JSON: {}", e))?;
        Self::from_value(value, fallback_name)
    }

    pub fn from_value(value: Value, fallback_name: &str) -> Result<Self, String> {
        if !value.is_object() {
            return Err("contract must be a JSON object".to_string());
        }
        if value.get("schema").map(Value::is_object).unwrap_or(false) {
            serde_json::from_value(value).map_err(|e| format!("malformed contract: {}", e))
        } else {
            Ok(Self::new(fallback_name, value))
        }
    }

    /// Required top-level fields declared by the schema.
    pub fn required_fields(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// The `json_schema` body sent to the provider.
    pub fn to_response_format(&self) -> Value {
        json!({
            "name": self.name,
            "schema": self.schema,
            "strict": self.strict,
        })
    }

    /// Parse `text` and check it against this contract.
    pub fn check(&self, text: &str) -> Result<Value, ContractViolation> {
        let value: Value = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
            self.violation(format!("reply is not valid JSON: {}", e))
        })?;

        let object = value
            .as_object()
            .ok_or_else(|| self.violation("reply is not a JSON object"))?;

        let missing: Vec<&str> = self
            .required_fields()
            .into_iter()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(self.violation(format!("missing required fields: {}", missing.join(", "))));
        }

        Ok(value)
    }

    fn violation(&self, reason: impl Into<String>) -> ContractViolation {
        ContractViolation {
            contract: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Payload that stands in for a reply that broke its contract.
pub fn fallback_payload(violation: &ContractViolation) -> Value {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(violation.to_string()));
    map.insert(
        "response".to_string(),
        Value::String(FALLBACK_APOLOGY.to_string()),
    );
    Value::Object(map)
}

/// Models sometimes wrap JSON in a markdown fence even in structured mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
