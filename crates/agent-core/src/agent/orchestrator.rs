use std::future::Future;
use std::pin::Pin;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::harness::{DecisionPipeline, DecisionRequest};
use super::memory::TurnMemory;
use super::observation::{Decision, TurnInfo};

/// What the episode driver talks to: one call, at most one decision.
///
/// `Ok(None)` means the turn's decisions are exhausted.
pub trait Agent: Send {
    fn act<'a>(
        &'a mut self,
        info: &'a TurnInfo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Decision>>> + Send + 'a>>;
}

/// Fixed seed when given, OS entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Decides one entity per call, blocking on the model each time.
#[derive(Debug)]
pub struct SerialAgent {
    pipeline: DecisionPipeline,
    memory: TurnMemory,
    rng: StdRng,
}

impl SerialAgent {
    pub fn new(pipeline: DecisionPipeline, seed: Option<u64>) -> Self {
        Self {
            pipeline,
            memory: TurnMemory::default(),
            rng: seeded_rng(seed),
        }
    }

    pub fn memory(&self) -> &TurnMemory {
        &self.memory
    }

    pub async fn next_decision(&mut self, info: &TurnInfo) -> anyhow::Result<Option<Decision>> {
        if self.memory.observe_turn(info.turn) {
            tracing::debug!(turn = info.turn, "agent.turn_started");
        }

        let scenario_message = info.llm_info.message();
        for (key, record) in info.llm_info.entities() {
            if self.memory.is_decided(&key) || !record.has_actions() {
                continue;
            }

            let decision = self
                .pipeline
                .decide(
                    DecisionRequest {
                        key: &key,
                        record,
                        turn: info.turn,
                        scenario_message,
                    },
                    &mut self.rng,
                )
                .await?;
            self.memory.mark_decided(key);

            // A city keeping its activity is settled for the turn; keep scanning.
            if decision.is_some() {
                return Ok(decision);
            }
        }

        tracing::debug!(turn = info.turn, decided = self.memory.decided_len(), "agent.turn_exhausted");
        Ok(None)
    }
}

impl Agent for SerialAgent {
    fn act<'a>(
        &'a mut self,
        info: &'a TurnInfo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Decision>>> + Send + 'a>> {
        Box::pin(self.next_decision(info))
    }
}
