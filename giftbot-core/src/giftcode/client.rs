use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::http::HttpClient;
use crate::utils::time::current_epoch_millis;
use crate::Error;
use super::signing::{signed_form, DEFAULT_SIGN_SECRET};

pub const DEFAULT_API_BASE: &str = "https://wjdr-giftcode-api.campfiregames.cn/api";
pub const DEFAULT_REFERER: &str = "https://wjdr-giftcode.centurygames.cn/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// Connection settings for the gift-code backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameApiConfig {
    pub api_base: String,
    pub sign_secret: String,
    pub referer: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for GameApiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            sign_secret: DEFAULT_SIGN_SECRET.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// The `{code, msg, err_code, data}` wrapper every endpoint answers with.
/// `code == 0` means success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEnvelope {
    pub code: i64,
    pub msg: String,
    /// Sometimes a number, sometimes a string, sometimes absent.
    pub err_code: serde_json::Value,
    /// `[]` on most errors, an object on success.
    pub data: serde_json::Value,
}

impl ApiEnvelope {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Decode `data`, treating `null`, `[]` and `{}` as absent.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        let empty = match &self.data {
            serde_json::Value::Null => true,
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::Object(o) => o.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(None);
        }
        let parsed = serde_json::from_value(self.data.clone())
            .map_err(|e| Error::ExternalApi(format!("unexpected data payload: {}", e)))?;
        Ok(Some(parsed))
    }
}

/// Redemption results are handed back verbatim for the engine to interpret.
pub type RedeemResponse = ApiEnvelope;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerData {
    pub fid: i64,
    pub nickname: String,
    /// Kingdom (server) id.
    pub kid: i64,
    pub avatar_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaData {
    /// Base64 image, usually with a `data:image/...;base64,` prefix.
    pub img: String,
}

/// The three game backend calls a player session needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Nonzero envelope code is `ExternalApi`; a missing payload is `Validation`.
    async fn player_info(&self, player_id: &str) -> Result<PlayerData, Error>;
    async fn captcha(&self, player_id: &str) -> Result<CaptchaData, Error>;
    async fn redeem(&self, player_id: &str, code: &str, captcha_code: &str) -> Result<RedeemResponse, Error>;
}

/// Signs every call with the shared secret and posts it as a browser-looking form.
pub struct GameApiClient {
    http: Arc<dyn HttpClient>,
    config: GameApiConfig,
}

impl GameApiClient {
    pub fn new(http: Arc<dyn HttpClient>, config: GameApiConfig) -> Self {
        Self { http, config }
    }

    /// POST signed `params` to `<api_base>/<path>` and decode the body as `T`.
    /// No retries here; transport, non-2xx and decode failures are `ExternalApi`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        params: BTreeMap<String, String>,
    ) -> Result<T, Error> {
        let url = format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let form: Vec<(String, String)> = signed_form(params, &self.config.sign_secret)
            .into_iter()
            .collect();
        let headers = [
            ("User-Agent", self.config.user_agent.as_str()),
            ("Referer", self.config.referer.as_str()),
            ("Accept", "application/json, text/plain, */*"),
        ];

        debug!("POST {} ({} params)", url, form.len());
        let resp = self.http.post_form(&url, &headers, &form).await?;
        if !resp.is_success() {
            return Err(Error::ExternalApi(format!(
                "request failed with status {} : {}",
                resp.status, resp.body
            )));
        }

        serde_json::from_str(&resp.body)
            .map_err(|e| Error::ExternalApi(format!("decode '{}' response: {}", path, e)))
    }

    fn base_params(player_id: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("fid".to_string(), player_id.to_string());
        params.insert("time".to_string(), current_epoch_millis().to_string());
        params
    }
}

#[async_trait]
impl GameApi for GameApiClient {
    async fn player_info(&self, player_id: &str) -> Result<PlayerData, Error> {
        let envelope: ApiEnvelope = self.send("player", Self::base_params(player_id)).await?;
        if !envelope.is_success() {
            return Err(Error::ExternalApi(format!(
                "player info for {} failed: {} (code {})",
                player_id, envelope.msg, envelope.code
            )));
        }
        envelope
            .data_as::<PlayerData>()?
            .ok_or_else(|| Error::Validation(format!("player info for {} returned no player payload", player_id)))
    }

    async fn captcha(&self, player_id: &str) -> Result<CaptchaData, Error> {
        let mut params = Self::base_params(player_id);
        params.insert("init".to_string(), "0".to_string());

        let envelope: ApiEnvelope = self.send("captcha", params).await?;
        if !envelope.is_success() {
            return Err(Error::ExternalApi(format!(
                "captcha for {} failed: {} (code {}, err_code {})",
                player_id, envelope.msg, envelope.code, envelope.err_code
            )));
        }
        envelope
            .data_as::<CaptchaData>()?
            .ok_or_else(|| Error::Validation(format!("captcha for {} returned no image", player_id)))
    }

    async fn redeem(&self, player_id: &str, code: &str, captcha_code: &str) -> Result<RedeemResponse, Error> {
        let mut params = Self::base_params(player_id);
        params.insert("cdk".to_string(), code.to_string());
        params.insert("captcha_code".to_string(), captcha_code.to_string());
        self.send("gift_code", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::http::HttpResponse;

    /// Records every request and answers with a fixed response.
    struct CannedHttp {
        response: Result<HttpResponse, String>,
        seen: Mutex<Vec<(String, Vec<(String, String)>, Vec<(String, String)>)>>,
    }

    impl CannedHttp {
        fn ok(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(HttpResponse { status, body: body.to_string() }),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn post_form(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            form: &[(String, String)],
        ) -> Result<HttpResponse, Error> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                form.to_vec(),
            ));
            self.response.clone().map_err(Error::ExternalApi)
        }
    }

    fn form_value(form: &[(String, String)], key: &str) -> Option<String> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[tokio::test]
    async fn test_player_info_signs_and_decodes() -> Result<(), Error> {
        let http = CannedHttp::ok(
            200,
            r#"{"code":0,"msg":"success","err_code":"","data":{"fid":366184723,"nickname":"Frost","kid":1234,"avatar_image":"https://a/b.png"}}"#,
        );
        let client = GameApiClient::new(http.clone(), GameApiConfig::default());

        let data = client.player_info("366184723").await?;
        assert_eq!(data.nickname, "Frost");
        assert_eq!(data.kid, 1234);

        let seen = http.seen.lock().unwrap();
        let (url, headers, form) = &seen[0];
        assert_eq!(url, "https://wjdr-giftcode-api.campfiregames.cn/api/player");
        assert!(headers.iter().any(|(k, v)| k == "Referer" && v == DEFAULT_REFERER));
        assert!(headers.iter().any(|(k, _)| k == "User-Agent"));
        assert_eq!(form_value(form, "fid").as_deref(), Some("366184723"));

        // the sign covers exactly the other params
        let mut unsigned: BTreeMap<String, String> = form.iter().cloned().collect();
        let sign = unsigned.remove("sign").expect("sign param");
        assert_eq!(sign, crate::giftcode::signing::sign_params(&unsigned, DEFAULT_SIGN_SECRET));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_2xx_is_external_api_error_with_body() {
        let http = CannedHttp::ok(502, "bad gateway");
        let client = GameApiClient::new(http, GameApiConfig::default());
        match client.player_info("1").await {
            Err(Error::ExternalApi(msg)) => {
                assert!(msg.contains("502"));
                assert!(msg.contains("bad gateway"));
            }
            other => panic!("expected ExternalApi, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_external_api_error() {
        let http = CannedHttp::ok(200, "<html>captcha wall</html>");
        let client = GameApiClient::new(http, GameApiConfig::default());
        assert!(matches!(client.captcha("1").await, Err(Error::ExternalApi(_))));
    }

    #[tokio::test]
    async fn test_player_info_without_payload_is_validation_error() {
        let http = CannedHttp::ok(200, r#"{"code":0,"msg":"success","data":[]}"#);
        let client = GameApiClient::new(http, GameApiConfig::default());
        assert!(matches!(client.player_info("1").await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_captcha_nonzero_code_is_error() {
        let http = CannedHttp::ok(200, r#"{"code":1,"msg":"CAPTCHA GET TOO FREQUENT.","err_code":40101,"data":[]}"#);
        let client = GameApiClient::new(http, GameApiConfig::default());
        match client.captcha("1").await {
            Err(Error::ExternalApi(msg)) => assert!(msg.contains("TOO FREQUENT")),
            other => panic!("expected ExternalApi, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redeem_returns_envelope_verbatim() -> Result<(), Error> {
        let http = CannedHttp::ok(200, r#"{"code":1,"msg":"RECEIVED.","err_code":40008,"data":[]}"#);
        let client = GameApiClient::new(http.clone(), GameApiConfig::default());

        let resp = client.redeem("366184723", "VIP888", "x7k2").await?;
        assert_eq!(resp.code, 1);
        assert_eq!(resp.msg, "RECEIVED.");

        let seen = http.seen.lock().unwrap();
        let (url, _, form) = &seen[0];
        assert!(url.ends_with("/api/gift_code"));
        assert_eq!(form_value(form, "cdk").as_deref(), Some("VIP888"));
        assert_eq!(form_value(form, "captcha_code").as_deref(), Some("x7k2"));
        assert!(form_value(form, "time").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let http = Arc::new(CannedHttp {
            response: Err("connection reset".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let client = GameApiClient::new(http, GameApiConfig::default());
        assert!(matches!(client.redeem("1", "C", "x").await, Err(Error::ExternalApi(_))));
    }
}
