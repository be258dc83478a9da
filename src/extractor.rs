//! Structured text extraction through an OpenAI chat model.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::chat::{self, ChatRequest};
use crate::config::ExtractionConfig;
use crate::models::{ExtractionMetadata, PageMetadata};
use crate::traits::{Extraction, TextExtractor};

const SYSTEM_PROMPT: &str = "You are an expert at extracting meaningful content from web pages for fact-checking.

Structure the output in exactly these sections:

1. METADATA (always first):
   - Website Domain: [from the metadata or page]
   - Article Title: [from the title or main heading]
   - Author: [or 'None' if not found]
   - Publication Date: [or 'Not found']

2. KEY CLAIMS AND FACTS:
   - Major claims as numbered points, aiming for 3-5 verifiable claims
   - Keep numbers, statistics, quotes and data points
   - Preserve the exact wording of key claims

3. SUPPORTING CONTEXT:
   - Relevant background and cited sources

Use clear headers and numbered lists.";

pub struct OpenAiExtractor {
    client: Client,
    config: ExtractionConfig,
}

impl OpenAiExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

pub fn user_prompt(cleaned: &str, metadata: &PageMetadata) -> String {
    format!(
        "Extract and structure content from this page.\n\n\
         Known metadata:\n\
         - Domain: {}\n\
         - Title: {}\n\
         - Author: {}\n\
         - Publication Date: {}\n\n\
         CONTENT:\n{}",
        if metadata.domain.is_empty() { "Unknown" } else { metadata.domain.as_str() },
        metadata.title.as_deref().unwrap_or("Not found"),
        metadata.author.as_deref().unwrap_or("None"),
        metadata.publication_date.as_deref().unwrap_or("Not found"),
        cleaned,
    )
}

#[async_trait]
impl TextExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        cleaned: &str,
        metadata: &PageMetadata,
        api_key: &str,
    ) -> Result<Extraction> {
        let user = user_prompt(cleaned, metadata);
        let reply = chat::complete(
            &self.client,
            &ChatRequest {
                endpoint: &self.config.endpoint,
                api_key,
                model: &self.config.model,
                system: SYSTEM_PROMPT,
                user: &user,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        )
        .await
        .context("OpenAI extraction failed")?;

        Ok(Extraction {
            text: reply.content,
            metadata: ExtractionMetadata {
                tokens_used: reply.total_tokens,
                model: self.config.model.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_fills_missing_metadata() {
        let meta = PageMetadata {
            domain: "example.org".into(),
            title: Some("A title".into()),
            ..PageMetadata::default()
        };
        let prompt = user_prompt("body text", &meta);
        assert!(prompt.contains("- Domain: example.org"));
        assert!(prompt.contains("- Title: A title"));
        assert!(prompt.contains("- Author: None"));
        assert!(prompt.contains("- Publication Date: Not found"));
        assert!(prompt.ends_with("body text"));
    }
}
