use crate::agents::Responder;
use crate::types::ContractViolation;
use serde_json::Value;

/// Field names the router may use for its retrieval queries, in priority order.
const RETRIEVAL_QUERY_FIELDS: &[&str] = &["vector_database_retrieval_queries", "retrieval_queries"];

/// What the router decided about one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Responder to hand the turn to, when the router named a known one
    pub next_agent: Option<Responder>,
    /// The name exactly as the router produced it
    pub raw_next_agent: Option<String>,
    pub user_intent: String,
    pub retrieval_queries: Vec<String>,
    pub query_category: Option<String>,
}

impl Classification {
    /// Read the routing fields out of a contract-checked router reply.
    ///
    /// Only the shape of the fields that drive routing is checked; every other
    /// field is left for the caller to display.
    pub fn parse(payload: &Value) -> Result<Self, ContractViolation> {
        let violation = |reason: String| ContractViolation {
            contract: "classification".to_string(),
            reason,
        };

        let object = payload
            .as_object()
            .ok_or_else(|| violation("classification is not a JSON object".to_string()))?;

        let raw_next_agent = match object.get("next_agent") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if name.trim().is_empty() => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                return Err(violation(format!("next_agent must be a string, got {}", other)))
            }
        };

        let user_intent = match object.get("user_intent") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(intent)) => intent.clone(),
            Some(other) => {
                return Err(violation(format!("user_intent must be a string, got {}", other)))
            }
        };

        let queries = RETRIEVAL_QUERY_FIELDS
            .iter()
            .find_map(|field| object.get(*field).filter(|v| !v.is_null()));
        let retrieval_queries = match queries {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| violation(format!("retrieval query is not a string: {}", item)))
                })
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|q| !q.trim().is_empty())
                .collect(),
            Some(other) => {
                return Err(violation(format!(
                    "retrieval queries must be an array, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            next_agent: raw_next_agent.as_deref().and_then(Responder::parse),
            raw_next_agent,
            user_intent,
            retrieval_queries,
            query_category: object
                .get("query_category")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_classification() {
        let payload = json!({
            "core_topic": "fiscal deficit",
            "user_intent": "understand the concept of fiscal deficit",
            "query_category": "concept",
            "next_agent": "Milo",
            "vector_database_retrieval_queries": ["fiscal deficit definition", "FRBM act"]
        });
        let classification = Classification::parse(&payload).unwrap();
        assert_eq!(classification.next_agent, Some(Responder::Milo));
        assert_eq!(classification.raw_next_agent.as_deref(), Some("Milo"));
        assert_eq!(classification.retrieval_queries.len(), 2);
        assert_eq!(classification.query_category.as_deref(), Some("concept"));
    }

    #[test]
    fn test_alias_field_and_missing_agent() {
        let payload = json!({
            "user_intent": "greeting",
            "retrieval_queries": ["", "  "]
        });
        let classification = Classification::parse(&payload).unwrap();
        assert_eq!(classification.next_agent, None);
        assert!(classification.retrieval_queries.is_empty());
    }

    #[test]
    fn test_unknown_agent_name_is_kept_raw() {
        let payload = json!({"user_intent": "x", "next_agent": "Mara"});
        let classification = Classification::parse(&payload).unwrap();
        assert_eq!(classification.next_agent, None);
        assert_eq!(classification.raw_next_agent.as_deref(), Some("Mara"));
    }

    #[test]
    fn test_malformed_fields() {
        assert!(Classification::parse(&json!("milo")).is_err());
        assert!(Classification::parse(&json!({"next_agent": 3})).is_err());
        assert!(Classification::parse(&json!({"retrieval_queries": "one"})).is_err());
        assert!(Classification::parse(&json!({"retrieval_queries": [1]})).is_err());
    }
}
