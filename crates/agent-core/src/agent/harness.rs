use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;

use super::dialogue::DialogueRecorder;
use super::observation::{Decision, EntityKey, EntityRecord};
use super::prompt::{PromptConfig, PromptInput, build_decision_prompt};
use super::retry::{RetryPolicy, query_llm};
use super::vocabulary::{ActionVocabulary, action_id};
use super::wire::{ActionSource, resolve_action};

/// Pseudo-action offered to cities when enabled: the city keeps its current production.
pub const KEEP_ACTIVITY: &str = "keep activity";
pub const CITY_CLASS: &str = "city";

pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub prompt: PromptConfig,
    pub retry: RetryPolicy,
    /// Show `move North` instead of `goto_1` to the model.
    pub readable_actions: bool,
    pub city_keep_activity: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt: PromptConfig::default(),
            retry: RetryPolicy::default(),
            readable_actions: true,
            city_keep_activity: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub key: &'a EntityKey,
    pub record: &'a EntityRecord,
    pub turn: u64,
    pub scenario_message: Option<&'a str>,
}

/// prompt -> model -> parse/fallback -> transcript, for one entity.
pub struct DecisionPipeline {
    llm: Arc<dyn LlmClient>,
    recorder: DialogueRecorder,
    cfg: PipelineConfig,
}

impl std::fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPipeline")
            .field("recorder", &self.recorder)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl DecisionPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, recorder: DialogueRecorder, cfg: PipelineConfig) -> Self {
        Self { llm, recorder, cfg }
    }

    /// Runs the full pipeline for one entity.
    ///
    /// Returns `None` only when a city chose [`KEEP_ACTIVITY`]. Malformed model output never
    /// fails; backend errors other than rate limiting do.
    pub async fn decide(
        &self,
        req: DecisionRequest<'_>,
        rng: &mut StdRng,
    ) -> anyhow::Result<Option<Decision>> {
        let vocab = if self.cfg.readable_actions {
            ActionVocabulary::readable(&req.record.available_actions)
        } else {
            ActionVocabulary::identity(&req.record.available_actions)
        };
        let mut names = vocab.names();
        let keep_activity = self.cfg.city_keep_activity && req.key.class == CITY_CLASS;
        if keep_activity {
            names.push(KEEP_ACTIVITY.to_string());
        }

        let prompt = build_decision_prompt(
            &PromptInput {
                key: req.key,
                record: req.record,
                actions: &names,
                scenario_message: req.scenario_message,
            },
            &self.cfg.prompt,
        );

        let raw = query_llm(self.llm.as_ref(), &prompt, &self.cfg.retry)
            .await
            .with_context(|| format!("query llm for {} ({})", req.record.name, req.key))?;

        let resolved = resolve_action(&raw, &names, rng)
            .with_context(|| format!("resolve action for {}", req.key))?;
        match &resolved.source {
            ActionSource::Llm { reasoning } => tracing::info!(
                entity = %req.record.name,
                action = %resolved.action_name,
                reasoning = reasoning.as_deref().unwrap_or(""),
                "agent.decision.llm"
            ),
            ActionSource::Fallback { reason } => tracing::warn!(
                entity = %req.record.name,
                action = %resolved.action_name,
                reason = %reason,
                "agent.decision.fallback"
            ),
        }

        if let Err(err) = self
            .recorder
            .record(&req.record.name, &req.key.id, req.turn, &prompt, &raw)
            .await
        {
            tracing::warn!(entity = %req.record.name, error = %format!("{err:#}"), "dialogue.record_failed");
        }

        if keep_activity && resolved.action_name == KEEP_ACTIVITY {
            return Ok(None);
        }

        let action = vocab
            .id_for(&resolved.action_name)
            .map(str::to_string)
            .unwrap_or_else(|| action_id(&resolved.action_name));
        Ok(Some(Decision::new(req.key, action)))
    }
}
