//! LLM adapter: turns raw scraped bytes into an HSDS-shaped `AlignedRecord`.
//! A trait, a registry of implementations, and a schema-driven default.

mod mock;
mod model;
mod openai;
mod prompt;
mod provider;
mod quota;
mod schema;
mod subprocess;

pub use mock::MockProvider;
pub use model::{AlignedLocation, AlignedOrganization, AlignedRecord, AlignedSchedule, AlignedService};
pub use openai::OpenAiProvider;
pub use prompt::PromptBuilder;
pub use provider::{LlmError, LlmJob, LlmProvider, Result};
pub use quota::QuotaGate;
pub use schema::validate_aligned_json;
pub use subprocess::SubprocessProvider;
