#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use civ_agent_core::agent::dialogue::DialogueRecorder;
use civ_agent_core::agent::harness::{DecisionPipeline, LlmClient, PipelineConfig};
use civ_agent_core::agent::retry::{RateLimited, RetryPolicy};

/// Scripted model backend: pops one queued reply per call and records every prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<anyhow::Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, raw: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(raw.into()));
    }

    pub fn rate_limit(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(RateLimited.into()));
    }

    pub fn fail(&self, msg: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete<'a>(
        &'a self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| anyhow::bail!("no llm response queued"))
        })
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

pub fn pipeline(llm: Arc<ScriptedLlm>, recorder: DialogueRecorder) -> DecisionPipeline {
    DecisionPipeline::new(
        llm,
        recorder,
        PipelineConfig {
            retry: fast_retry(),
            ..PipelineConfig::default()
        },
    )
}
