use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use civ_agent_core::agent::episode::run_episode;
use civ_agent_core::agent::game_api::{Environment, Reset, StepOutcome};
use civ_agent_core::agent::harness::{DecisionPipeline, LlmClient};
use civ_agent_core::agent::observation::Decision;
use civ_agent_core::agent::orchestrator::{Agent, SerialAgent};
use civ_agent_core::agent::parallel::ParallelAgent;
use civ_agent_core::config::{AgentConfig, AgentMode};
use civ_agent_core::llm::{ChatConfig, build_http_client, query_chat_completion};

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Environment bridge reached over a JSON-lines control connection.
struct RemoteEnvironment {
    conn: Mutex<ControlConn>,
}

impl RemoteEnvironment {
    async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect control port {addr}"))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Mutex::new(ControlConn {
                reader: BufReader::new(read),
                writer: write,
            }),
        })
    }

    /// One request line, one reply line. Replies without `"ok": true` are errors carrying the
    /// bridge's `error` text when it sent one.
    async fn request(&self, req: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let op = req["op"].as_str().unwrap_or("request").to_string();
        let reply = {
            let mut conn = self.conn.lock().await;
            conn.writer
                .write_all(format!("{req}\n").as_bytes())
                .await
                .with_context(|| format!("send {op}"))?;
            conn.writer.flush().await.ok();

            let mut line = String::new();
            let n = conn
                .reader
                .read_line(&mut line)
                .await
                .with_context(|| format!("read {op} reply"))?;
            if n == 0 {
                anyhow::bail!("environment bridge closed the connection during {op}");
            }
            line
        };

        let v: serde_json::Value = serde_json::from_str(reply.trim())
            .with_context(|| format!("{op} reply is not json"))?;
        if v["ok"].as_bool() != Some(true) {
            let reason = v["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string());
            anyhow::bail!("{op} failed: {reason}");
        }
        Ok(v)
    }

    fn decision_to_wire(decision: Option<&Decision>) -> serde_json::Value {
        match decision {
            Some(d) => json!([d.entity_class, d.entity_id, d.action_name]),
            None => serde_json::Value::Null,
        }
    }
}

impl Environment for RemoteEnvironment {
    fn reset<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Reset>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request(json!({ "op": "reset" })).await?;
            serde_json::from_value(v).context("decode reset")
        })
    }

    fn step<'a>(
        &'a self,
        action: Option<Decision>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StepOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let wire = Self::decision_to_wire(action.as_ref());
            let v = self.request(json!({ "op": "step", "action": wire })).await?;
            serde_json::from_value(v).context("decode step")
        })
    }

    fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.request(json!({ "op": "close" })).await?;
            Ok(())
        })
    }

    fn game_results<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request(json!({ "op": "game_results" })).await?;
            Ok(v.get("results").cloned().unwrap_or(serde_json::Value::Null))
        })
    }
}

struct RunnerLlm {
    http: reqwest::Client,
    cfg: ChatConfig,
}

impl LlmClient for RunnerLlm {
    fn complete<'a>(
        &'a self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { query_chat_completion(&self.http, &prompt, &self.cfg).await })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("civ_agent_core=info,civ_agent_runner=info")),
        )
        .init();

    let cfg = AgentConfig::load()?;
    let api_key = cfg.llm.resolve_api_key()?;
    let llm = RunnerLlm {
        http: build_http_client(cfg.llm.timeout())?,
        cfg: ChatConfig {
            endpoint: cfg.llm.endpoint.clone(),
            model: cfg.llm.model.clone(),
            api_key,
        },
    };
    tracing::info!(
        model = %cfg.llm.model,
        mode = ?cfg.agent.mode,
        control_addr = %cfg.environment.control_addr,
        "runner.starting"
    );

    let recorder = cfg.agent.recorder();
    let pipeline = DecisionPipeline::new(Arc::new(llm), recorder.clone(), cfg.pipeline_config());
    let seed = cfg.debug.agent_seed();
    let mut agent: Box<dyn Agent> = match cfg.agent.mode {
        AgentMode::Serial => Box::new(SerialAgent::new(pipeline, seed)),
        AgentMode::Parallel => Box::new(ParallelAgent::new(
            pipeline,
            cfg.agent.max_concurrency,
            seed,
        )),
    };

    let env = RemoteEnvironment::connect(&cfg.environment.control_addr).await?;
    let summary = run_episode(&env, agent.as_mut(), &recorder, &cfg.episode_config()).await?;

    tracing::info!(
        steps = summary.steps,
        turn = summary.last_turn,
        total_reward = summary.total_reward,
        "runner.finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary.game_results)?);
    Ok(())
}
