//! Per-entity decision making: observation model, prompt, model call, action resolution, and the
//! serial/parallel agents the episode driver talks to.
//!
//! The pipeline for one entity lives in [`harness`]; [`orchestrator`] and [`parallel`] decide
//! which entities go through it and when.

pub mod dialogue;
pub mod episode;
pub mod game_api;
pub mod harness;
pub mod memory;
pub mod observation;
pub mod orchestrator;
pub mod parallel;
pub mod prompt;
pub mod retry;
pub mod vocabulary;
pub mod wire;

pub use episode::{EpisodeConfig, EpisodeSummary, run_episode};
pub use game_api::{Environment, Reset, StepOutcome};
pub use harness::{DecisionPipeline, LlmClient, PipelineConfig};
pub use observation::{Decision, EntityKey, EntityRecord, LlmInfo, TurnInfo};
pub use orchestrator::{Agent, SerialAgent};
pub use parallel::ParallelAgent;
pub use retry::{RateLimited, RetryPolicy};
pub use wire::{ActionChoice, ChoiceParseError, parse_action_choice};
