use anyhow::Context;
use serde::Serialize;

use super::dialogue::DialogueRecorder;
use super::game_api::{Environment, Reset};
use super::orchestrator::Agent;

#[derive(Debug, Clone, Default)]
pub struct EpisodeConfig {
    /// Stop (as truncated) after this many environment steps.
    pub max_steps: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub steps: u64,
    pub last_turn: u64,
    pub total_reward: f64,
    /// Steps that carried an action rather than an end-of-turn `None`.
    pub decisions: u64,
    pub terminated: bool,
    pub truncated: bool,
    pub game_results: serde_json::Value,
}

/// Plays one episode: fresh transcript dir, reset, act/step until done, close.
///
/// Any failure is logged and returned; the episode is not resumed.
pub async fn run_episode(
    env: &dyn Environment,
    agent: &mut dyn Agent,
    recorder: &DialogueRecorder,
    cfg: &EpisodeConfig,
) -> anyhow::Result<EpisodeSummary> {
    match drive(env, agent, recorder, cfg).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "episode.error");
            Err(err)
        }
    }
}

async fn drive(
    env: &dyn Environment,
    agent: &mut dyn Agent,
    recorder: &DialogueRecorder,
    cfg: &EpisodeConfig,
) -> anyhow::Result<EpisodeSummary> {
    recorder.start_new_run().await?;

    let Reset { mut info, .. } = env.reset().await.context("environment reset")?;
    let mut summary = EpisodeSummary {
        last_turn: info.turn,
        ..EpisodeSummary::default()
    };
    tracing::info!(turn = info.turn, "episode.started");

    loop {
        let decision = agent.act(&info).await?;
        if decision.is_some() {
            summary.decisions += 1;
        }

        let outcome = env.step(decision).await.context("environment step")?;
        summary.steps += 1;
        summary.total_reward += outcome.reward;
        summary.last_turn = outcome.info.turn;
        tracing::info!(
            step = summary.steps,
            turn = outcome.info.turn,
            reward = outcome.reward,
            terminated = outcome.terminated,
            truncated = outcome.truncated,
            "episode.step"
        );
        info = outcome.info;

        if outcome.terminated || outcome.truncated {
            summary.terminated = outcome.terminated;
            summary.truncated = outcome.truncated;
            break;
        }
        if let Some(max_steps) = cfg.max_steps
            && summary.steps >= max_steps
        {
            tracing::warn!(max_steps, "episode.step_cap_reached");
            summary.truncated = true;
            break;
        }
    }

    summary.game_results = env.game_results().await.context("fetch game results")?;
    env.close().await.context("environment close")?;
    tracing::info!(
        steps = summary.steps,
        turn = summary.last_turn,
        decisions = summary.decisions,
        "episode.finished"
    );
    Ok(summary)
}
