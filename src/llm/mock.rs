use std::sync::Mutex;

use async_trait::async_trait;

use super::model::AlignedRecord;
use super::provider::{LlmError, LlmJob, LlmProvider, Result};

/// Canned-response provider for tests: a queue of pre-built responses
/// consumed in order, falling back to an error once exhausted.
pub struct MockProvider {
    responses: Mutex<Vec<Result<AlignedRecord>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Result<AlignedRecord>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }

    pub fn always_returning(record: AlignedRecord) -> Self {
        Self::new(vec![Ok(record)])
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn align(&self, _job: &LlmJob) -> Result<AlignedRecord> {
        let mut responses = self.responses.lock().expect("mock provider lock poisoned");
        if responses.len() > 1 {
            responses.remove(0)
        } else if let Some(last) = responses.first() {
            match last {
                Ok(record) => Ok(record.clone()),
                Err(_) => Err(LlmError::Request("mock provider exhausted".into())),
            }
        } else {
            Err(LlmError::Request("mock provider has no responses configured".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AlignedOrganization;
    use uuid::Uuid;

    fn sample_record() -> AlignedRecord {
        AlignedRecord {
            organization: AlignedOrganization {
                name: "Example Pantry".into(),
                description: None,
                website: None,
                email: None,
            },
            location: None,
            services: vec![],
            schedules: vec![],
        }
    }

    #[tokio::test]
    async fn repeats_the_single_configured_response() {
        let provider = MockProvider::always_returning(sample_record());
        let job = LlmJob {
            job_id: Uuid::now_v7(),
            raw_bytes: b"raw".to_vec(),
            source_hint: None,
        };
        let first = provider.align(&job).await.unwrap();
        let second = provider.align(&job).await.unwrap();
        assert_eq!(first, second);
    }
}
