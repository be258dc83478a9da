//! Minimal OpenAI-compatible chat-completions client.
//!
//! Both AI collaborators speak this wire format: OpenAI for extraction and
//! Perplexity for analysis.

use anyhow::{anyhow, bail, Result};
use reqwest::Client;
use serde_json::{json, Value};

/// Parameters for one chat-completions request.
pub struct ChatRequest<'a> {
    pub endpoint: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// First choice's message content and the reported total token usage.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub total_tokens: i64,
}

pub async fn complete(client: &Client, req: &ChatRequest<'_>) -> Result<ChatReply> {
    let body = json!({
        "model": req.model,
        "messages": [
            {"role": "system", "content": req.system},
            {"role": "user", "content": req.user},
        ],
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
    });

    let resp = client
        .post(req.endpoint)
        .header("Authorization", format!("Bearer {}", req.api_key))
        .header("Accept", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        bail!("API error {}: {}", status, body_text);
    }

    let json: Value = resp.json().await?;
    parse_reply(&json)
}

pub fn parse_reply(json: &Value) -> Result<ChatReply> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("No analysis results returned"))?;

    let total_tokens = json
        .pointer("/usage/total_tokens")
        .and_then(|t| t.as_i64())
        .unwrap_or(0);

    Ok(ChatReply {
        content: content.trim().to_string(),
        total_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello \n"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let reply = parse_reply(&json).unwrap();
        assert_eq!(reply.content, "hello");
        assert_eq!(reply.total_tokens, 15);
    }

    #[test]
    fn test_parse_reply_without_choices() {
        assert!(parse_reply(&json!({"choices": []})).is_err());
        let reply = parse_reply(&json!({"choices": [{"message": {"content": "x"}}]})).unwrap();
        assert_eq!(reply.total_tokens, 0);
    }
}
