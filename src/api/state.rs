use std::sync::Arc;

use crate::runtime::PipelineRuntime;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<PipelineRuntime>,
}

impl AppState {
    pub fn new(runtime: Arc<PipelineRuntime>) -> Self {
        Self { runtime }
    }
}
