use super::schema::schema_value;

/// Builds the instruction sent to every provider: the HSDS target schema
/// plus the raw scraped text to align. Built once per job rather than
/// per-provider since the instruction is provider-agnostic; providers
/// differ only in how they transmit it (HTTP body vs subprocess stdin).
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn system_instruction() -> String {
        format!(
            "You convert raw scraped text describing a food-assistance resource into \
             JSON matching this schema exactly. Do not add fields not present in the \
             schema. Use null for unknown optional fields, omit entities you cannot \
             support with the source text.\n\nSchema:\n{}",
            serde_json::to_string_pretty(schema_value()).expect("schema is always serializable")
        )
    }

    pub fn user_message(raw_text: &str) -> String {
        format!("Source text:\n\n{raw_text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_embeds_schema() {
        let instr = PromptBuilder::system_instruction();
        assert!(instr.contains("organization"));
        assert!(instr.contains("schedules"));
    }
}
