use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};

/// Writes one plain-text transcript per prompt/response exchange.
///
/// Transcripts are diagnostic output only; nothing in the process reads them back.
#[derive(Debug, Clone)]
pub struct DialogueRecorder {
    dir: PathBuf,
    enabled: bool,
}

impl DialogueRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
        }
    }

    /// A recorder that never touches the filesystem.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Deletes every transcript of a previous run and recreates an empty directory.
    pub async fn start_new_run(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("clear dialogue dir {}", self.dir.display()));
            }
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create dialogue dir {}", self.dir.display()))?;
        tracing::info!(dir = %self.dir.display(), "dialogue.run_started");
        Ok(())
    }

    /// Writes `<entity>_<id>_Turn<turn>_<timestamp>.txt`. Returns `None` when recording is
    /// disabled.
    pub async fn record(
        &self,
        entity_name: &str,
        entity_id: &str,
        turn: u64,
        prompt: &str,
        response: &str,
    ) -> anyhow::Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create dialogue dir {}", self.dir.display()))?;

        let path = self
            .dir
            .join(transcript_file_name(entity_name, entity_id, turn, Local::now()));
        tokio::fs::write(&path, transcript_body(prompt, response))
            .await
            .with_context(|| format!("write transcript {}", path.display()))?;
        tracing::debug!(path = %path.display(), "dialogue.recorded");
        Ok(Some(path))
    }
}

/// Same-named entities (three "Warriors" in one turn) are told apart by id.
pub fn transcript_file_name(
    entity_name: &str,
    entity_id: &str,
    turn: u64,
    at: DateTime<Local>,
) -> String {
    format!(
        "{}_{}_Turn{turn}_{}.txt",
        path_safe(entity_name),
        path_safe(entity_id),
        at.format("%Y%m%d_%H%M%S")
    )
}

fn path_safe(part: &str) -> String {
    part.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

fn transcript_body(prompt: &str, response: &str) -> String {
    format!("Prompt:\n{prompt}\n\nLLM Output:\n{response}")
}
