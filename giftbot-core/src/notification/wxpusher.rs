use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::Error;
use super::Notifier;

pub const WXPUSHER_SEND_URL: &str = "https://wxpusher.zjiecode.com/api/send/message";
const WXPUSHER_SUCCESS_CODE: i64 = 1000;
const WXPUSHER_MAX_ATTEMPTS: u32 = 3;
/// HTML content type.
const WXPUSHER_CONTENT_TYPE: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WxPusherConfig {
    pub app_token: String,
    pub uid: String,
}

impl WxPusherConfig {
    pub fn is_configured(&self) -> bool {
        !self.app_token.trim().is_empty() && !self.uid.trim().is_empty()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    app_token: &'a str,
    content: &'a str,
    summary: &'a str,
    title: &'a str,
    content_type: i64,
    uids: Vec<&'a str>,
    verify_pay: bool,
    verify_pay_type: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendMessageResponse {
    code: i64,
    msg: String,
    success: bool,
}

pub struct WxPusherNotifier {
    client: reqwest::Client,
    config: WxPusherConfig,
    url: String,
    retry_backoff: Duration,
}

impl WxPusherNotifier {
    pub fn new(client: reqwest::Client, config: WxPusherConfig) -> Result<Self, Error> {
        if !config.is_configured() {
            return Err(Error::Config("wxpusher requires app_token and uid".into()));
        }
        Ok(Self {
            client,
            config,
            url: WXPUSHER_SEND_URL.to_string(),
            retry_backoff: Duration::from_secs(1),
        })
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Base delay between attempts; attempt `n` waits `n` times this.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    async fn send_once(&self, body: &SendMessageRequest<'_>) -> Result<String, Error> {
        let resp = self.client.post(&self.url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::ExternalApi(format!("wxpusher HTTP {} => {}", status, text)));
        }

        let parsed: SendMessageResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ExternalApi(format!("wxpusher response decode: {}", e)))?;
        if parsed.code != WXPUSHER_SUCCESS_CODE {
            return Err(Error::ExternalApi(format!(
                "wxpusher rejected message: {} (code {}, success {})",
                parsed.msg, parsed.code, parsed.success
            )));
        }
        Ok(parsed.msg)
    }
}

#[async_trait]
impl Notifier for WxPusherNotifier {
    fn channel(&self) -> &str {
        "wxpusher"
    }

    async fn send(&self, title: &str, summary: &str, content: &str) -> Result<String, Error> {
        let body = SendMessageRequest {
            app_token: &self.config.app_token,
            content,
            summary,
            title,
            content_type: WXPUSHER_CONTENT_TYPE,
            uids: vec![self.config.uid.as_str()],
            verify_pay: false,
            verify_pay_type: 0,
        };

        let mut last_err = Error::Internal("wxpusher send never attempted".into());
        for attempt in 1..=WXPUSHER_MAX_ATTEMPTS {
            match self.send_once(&body).await {
                Ok(msg) => {
                    info!("wxpusher delivered '{}' on attempt {}", title, attempt);
                    return Ok(msg);
                }
                Err(e) => {
                    warn!("wxpusher attempt {}/{} failed: {}", attempt, WXPUSHER_MAX_ATTEMPTS, e);
                    last_err = e;
                    if attempt < WXPUSHER_MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_is_rejected() {
        let cfg = WxPusherConfig { app_token: "AT_x".into(), uid: String::new() };
        assert!(matches!(WxPusherNotifier::new(reqwest::Client::new(), cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let body = SendMessageRequest {
            app_token: "AT_x",
            content: "c",
            summary: "s",
            title: "t",
            content_type: WXPUSHER_CONTENT_TYPE,
            uids: vec!["UID_1"],
            verify_pay: false,
            verify_pay_type: 0,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["appToken"], "AT_x");
        assert_eq!(v["contentType"], 2);
        assert_eq!(v["uids"][0], "UID_1");
        assert_eq!(v["verifyPay"], false);
        assert_eq!(v["verifyPayType"], 0);
    }
}
