use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::observation::{Decision, TurnInfo};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Reset {
    #[serde(default)]
    pub observations: serde_json::Value,
    pub info: TurnInfo,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StepOutcome {
    #[serde(default)]
    pub observations: serde_json::Value,
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub terminated: bool,
    #[serde(default)]
    pub truncated: bool,
    pub info: TurnInfo,
}

/// Boundary the episode driver uses to reach the game.
///
/// `step(None)` tells the environment the agent has nothing more to do this turn.
pub trait Environment: Send + Sync {
    fn reset<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Reset>> + Send + 'a>>;

    fn step<'a>(
        &'a self,
        action: Option<Decision>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StepOutcome>> + Send + 'a>>;

    fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn game_results<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send + 'a>>;
}
