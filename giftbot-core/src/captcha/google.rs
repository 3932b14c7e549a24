use std::time::{Duration, Instant};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use crate::Error;
use super::{decode_image, first_line, OcrProvider};

const VISION_ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh the access token this long before Google says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields we need from a service-account key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnnotateResponse {
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateImageResponse {
    text_annotations: Vec<TextAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextAnnotation {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionStatus {
    code: i64,
    message: String,
}

/// Google Cloud Vision `TEXT_DETECTION`, authenticated with a service account.
pub struct GoogleVisionProvider {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    annotate_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleVisionProvider {
    pub fn new(client: reqwest::Client, credentials_json: &str) -> Result<Self, Error> {
        if credentials_json.trim().is_empty() {
            return Err(Error::Config("google OCR requires credentials_json".into()));
        }
        let key: ServiceAccountKey = serde_json::from_str(credentials_json)
            .map_err(|e| Error::Config(format!("google credentials_json: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("google private_key: {}", e)))?;

        info!("Google Vision OCR using service account {}", key.client_email);
        Ok(Self {
            client,
            key,
            encoding_key,
            annotate_url: VISION_ANNOTATE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Annotate against `url`. The token endpoint comes from the key's `token_uri`.
    pub fn with_annotate_url(mut self, url: &str) -> Self {
        self.annotate_url = url.to_string();
        self
    }

    async fn access_token(&self) -> Result<String, Error> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: VISION_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Captcha(format!("google assertion signing: {}", e)))?;

        let resp = self.client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Captcha(format!("google token HTTP {} => {}", status, text)));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ExternalApi(format!("google token decode: {}", e)))?;
        let lifetime = Duration::from_secs(token.expires_in.max(60));
        debug!("google access token refreshed, valid for {:?}", lifetime);

        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl OcrProvider for GoogleVisionProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn solve(&self, image_base64: &str) -> Result<String, Error> {
        let bytes = decode_image(image_base64)?;
        let token = self.access_token().await?;

        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(&bytes) },
                "features": [{ "type": "TEXT_DETECTION" }],
            }]
        });

        let resp = self.client
            .post(&self.annotate_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Captcha(format!("google OCR HTTP {} => {}", status, text)));
        }

        let parsed: AnnotateResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ExternalApi(format!("google OCR response decode: {}", e)))?;
        let first = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(err) = first.error {
            return Err(Error::Captcha(format!("google OCR error {} {}", err.code, err.message)));
        }

        let detected = first.text_annotations
            .first()
            .map(|a| first_line(&a.description))
            .unwrap_or_default();
        debug!("google OCR recognized '{}'", detected);
        if detected.is_empty() {
            return Err(Error::Captcha("google OCR detected no text".into()));
        }
        Ok(detected)
    }
}
