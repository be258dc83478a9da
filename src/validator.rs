//! URL validity check: format, scheme, and a HEAD existence probe.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::traits::{UrlCheck, UrlValidator};

pub struct HttpUrlValidator {
    client: Client,
}

impl HttpUrlValidator {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.validate_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

/// Offline half of validation. Returns the parsed URL or the rejection.
pub fn check_format(url: &str) -> Result<Url, UrlCheck> {
    let parsed = Url::parse(url.trim()).map_err(|_| {
        UrlCheck::invalid("Invalid URL format. Please include http:// or https://")
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(UrlCheck::invalid(
                "Only HTTP and HTTPS protocols are supported",
            ))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UrlCheck::invalid(
            "Invalid URL format. Please include http:// or https://",
        ));
    }

    Ok(parsed)
}

#[async_trait]
impl UrlValidator for HttpUrlValidator {
    async fn validate(&self, url: &str) -> UrlCheck {
        let parsed = match check_format(url) {
            Ok(parsed) => parsed,
            Err(rejection) => return rejection,
        };

        match self.client.head(parsed).send().await {
            Ok(resp) if resp.status().as_u16() >= 400 => UrlCheck::invalid(format!(
                "URL is not accessible (Status code: {})",
                resp.status().as_u16()
            )),
            Ok(_) => UrlCheck::ok(),
            Err(e) => UrlCheck::invalid(format!("Cannot access URL: {}", e)),
        }
    }
}
