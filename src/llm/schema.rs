use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use super::provider::LlmError;

/// The HSDS-subset JSON schema the LLM output must conform to bit-exactly.
/// Enforced both as the OpenAI `response_format` schema and as a
/// post-hoc validation gate for every provider, including the subprocess
/// and mock ones which can't be trusted to honor a schema hint.
fn schema_json() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["organization", "services", "schedules"],
            "properties": {
                "organization": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": ["string", "null"] },
                        "website": { "type": ["string", "null"] },
                        "email": { "type": ["string", "null"] }
                    }
                },
                "location": {
                    "type": ["object", "null"],
                    "additionalProperties": false,
                    "properties": {
                        "address_line_1": { "type": ["string", "null"] },
                        "city": { "type": ["string", "null"] },
                        "state": { "type": ["string", "null"] },
                        "postal_code": { "type": ["string", "null"] },
                        "latitude": { "type": ["number", "null"] },
                        "longitude": { "type": ["number", "null"] }
                    }
                },
                "services": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": ["string", "null"] },
                            "status": { "type": ["string", "null"] }
                        }
                    }
                },
                "schedules": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "service_name": { "type": ["string", "null"] },
                            "opens_at": { "type": ["string", "null"] },
                            "closes_at": { "type": ["string", "null"] },
                            "byday": { "type": ["string", "null"] }
                        }
                    }
                }
            }
        })
    })
}

pub fn schema_value() -> &'static Value {
    schema_json()
}

/// Strips a surrounding ```` ``` ```` / ` ```json ` code fence some
/// providers wrap structured output in, despite being asked not to. A
/// no-op on output that isn't fenced.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

fn validator() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        jsonschema::validator_for(schema_json()).expect("embedded HSDS schema is valid")
    })
}

/// Validates raw provider output before it's deserialized into
/// `AlignedRecord`; unrecognised fields surface as `SchemaViolation`.
pub fn validate_aligned_json(value: &Value) -> Result<(), LlmError> {
    let v = validator();
    if v.is_valid(value) {
        Ok(())
    } else {
        let errors: Vec<String> = v.iter_errors(value).map(|e| e.to_string()).collect();
        Err(LlmError::SchemaViolation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_valid_record() {
        let value = serde_json::json!({
            "organization": { "name": "Example Pantry" },
            "location": null,
            "services": [],
            "schedules": []
        });
        assert!(validate_aligned_json(&value).is_ok());
    }

    #[test]
    fn rejects_unknown_fields() {
        let value = serde_json::json!({
            "organization": { "name": "Example Pantry", "unexpected": true },
            "location": null,
            "services": [],
            "schedules": []
        });
        assert!(validate_aligned_json(&value).is_err());
    }

    #[test]
    fn rejects_missing_organization_name() {
        let value = serde_json::json!({
            "organization": {},
            "location": null,
            "services": [],
            "schedules": []
        });
        assert!(validate_aligned_json(&value).is_err());
    }

    #[test]
    fn strips_json_fenced_code_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fenced_code_block() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_output_unchanged() {
        let raw = "{\"a\": 1}";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }
}
