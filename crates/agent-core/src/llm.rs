use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::agent::retry::RateLimited;

/// Config for an OpenAI/Mistral-style `POST /v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatConfig {
    /// Full endpoint URL, e.g. `https://api.mistral.ai/v1/chat/completions`.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

pub fn build_http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("build llm http client")
}

/// Sends a single user message and returns the first choice's content.
///
/// HTTP 429 surfaces as [`RateLimited`] so the caller can back off.
pub async fn query_chat_completion(
    http: &Client,
    prompt: &str,
    cfg: &ChatConfig,
) -> anyhow::Result<String> {
    let request = ChatRequest {
        model: &cfg.model,
        messages: [ChatMessage {
            role: "user",
            content: prompt,
        }],
    };

    let res = http
        .post(&cfg.endpoint)
        .bearer_auth(&cfg.api_key)
        .json(&request)
        .send()
        .await
        .context("llm request failed")?;

    let status = res.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RateLimited.into());
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("llm non-2xx response: {status}: {}", body.trim());
    }

    let res = res
        .json::<ChatResponse>()
        .await
        .context("llm response decode failed")?;
    let choice = res
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("llm response has no choices"))?;
    Ok(choice.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP response and hands back the request body it saw.
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            let mut content_length = 0usize;
            let mut auth = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                if lower.starts_with("authorization:") {
                    auth = line.to_string();
                }
            }
            let mut req_body = vec![0u8; content_length];
            reader.read_exact(&mut req_body).await.unwrap();

            let resp = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            reader.get_mut().write_all(resp.as_bytes()).await.unwrap();
            reader.get_mut().shutdown().await.ok();
            format!("{auth}\n{}", String::from_utf8(req_body).unwrap())
        });
        (format!("http://{addr}/v1/chat/completions"), handle)
    }

    fn cfg(endpoint: String) -> ChatConfig {
        ChatConfig {
            endpoint,
            model: "mistral-large-latest".to_string(),
            api_key: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn returns_first_choice_content() -> anyhow::Result<()> {
        let (endpoint, server) = one_shot_server(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"action_name\":\"fortify\"}"}}]}"#,
        )
        .await;
        let http = build_http_client(Duration::from_secs(5))?;

        let out = query_chat_completion(&http, "pick one", &cfg(endpoint)).await?;
        assert_eq!(out, "{\"action_name\":\"fortify\"}");

        let seen = server.await?;
        assert!(seen.contains("Bearer secret"));
        let (_, body) = seen.split_once('\n').unwrap();
        let body: serde_json::Value = serde_json::from_str(body)?;
        assert_eq!(body["model"], "mistral-large-latest");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "pick one");
        Ok(())
    }

    #[tokio::test]
    async fn status_429_is_rate_limited() -> anyhow::Result<()> {
        let (endpoint, server) =
            one_shot_server("429 Too Many Requests", r#"{"message":"slow down"}"#).await;
        let http = build_http_client(Duration::from_secs(5))?;

        let err = query_chat_completion(&http, "p", &cfg(endpoint))
            .await
            .unwrap_err();
        assert!(err.is::<RateLimited>());
        server.await?;
        Ok(())
    }

    #[tokio::test]
    async fn other_errors_are_not_rate_limits() -> anyhow::Result<()> {
        let (endpoint, server) =
            one_shot_server("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let http = build_http_client(Duration::from_secs(5))?;

        let err = query_chat_completion(&http, "p", &cfg(endpoint))
            .await
            .unwrap_err();
        assert!(!err.is::<RateLimited>());
        assert!(err.to_string().contains("500"));
        server.await?;
        Ok(())
    }

    #[test]
    fn debug_redacts_key() {
        let shown = format!("{:?}", cfg("http://x".to_string()));
        assert!(!shown.contains("secret"));
    }
}
