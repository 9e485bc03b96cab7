use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::harness::{DecisionPipeline, DecisionRequest};
use super::memory::TurnMemory;
use super::observation::{Decision, TurnInfo};
use super::orchestrator::{Agent, seeded_rng};

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Decides every entity of a turn in one concurrent burst, then hands the results out one per
/// call.
///
/// At most `max_concurrency` model calls are in flight at once. The batch is fully joined
/// before the first decision of it is returned.
#[derive(Debug)]
pub struct ParallelAgent {
    pipeline: Arc<DecisionPipeline>,
    memory: TurnMemory,
    rng: StdRng,
    max_concurrency: usize,
    pending: VecDeque<Decision>,
}

impl ParallelAgent {
    pub fn new(pipeline: DecisionPipeline, max_concurrency: usize, seed: Option<u64>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            memory: TurnMemory::default(),
            rng: seeded_rng(seed),
            max_concurrency: max_concurrency.max(1),
            pending: VecDeque::new(),
        }
    }

    pub fn memory(&self) -> &TurnMemory {
        &self.memory
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Runs the pipeline for every undecided entity with actions and queues the results.
    ///
    /// Returns the number of decisions queued. The first worker error is returned after every
    /// worker finished.
    pub async fn make_decisions(&mut self, info: &TurnInfo) -> anyhow::Result<usize> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<Decision>();
        let mut workers = JoinSet::new();
        let scenario_message = info.llm_info.message().map(str::to_string);

        for (key, record) in info.llm_info.entities() {
            if !record.has_actions() || !self.memory.mark_decided(key.clone()) {
                continue;
            }

            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            let record = record.clone();
            let scenario_message = scenario_message.clone();
            let turn = info.turn;
            let mut rng = StdRng::seed_from_u64(self.rng.next_u64());

            workers.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .context("decision worker pool closed")?;
                let decision = pipeline
                    .decide(
                        DecisionRequest {
                            key: &key,
                            record: &record,
                            turn,
                            scenario_message: scenario_message.as_deref(),
                        },
                        &mut rng,
                    )
                    .await?;
                if let Some(decision) = decision {
                    // The receiver outlives every worker.
                    let _ = tx.send(decision);
                }
                anyhow::Ok(())
            });
        }
        drop(tx);

        let spawned = workers.len();
        let mut first_err: Option<anyhow::Error> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined
                .context("decision worker panicked")
                .and_then(|res| res);
            if let Err(err) = outcome {
                tracing::error!(error = %format!("{err:#}"), "agent.worker_failed");
                first_err.get_or_insert(err);
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        let mut queued = 0;
        while let Ok(decision) = rx.try_recv() {
            self.pending.push_back(decision);
            queued += 1;
        }
        tracing::info!(
            turn = info.turn,
            workers = spawned,
            decisions = queued,
            "agent.batch_complete"
        );
        Ok(queued)
    }

    pub async fn next_decision(&mut self, info: &TurnInfo) -> anyhow::Result<Option<Decision>> {
        if self.memory.observe_turn(info.turn) {
            self.pending.clear();
        }
        // Entities that appeared since the last burst get their own burst.
        if self.pending.is_empty() {
            self.make_decisions(info).await?;
        }
        Ok(self.pending.pop_front())
    }
}

impl Agent for ParallelAgent {
    fn act<'a>(
        &'a mut self,
        info: &'a TurnInfo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Decision>>> + Send + 'a>> {
        Box::pin(self.next_decision(info))
    }
}
