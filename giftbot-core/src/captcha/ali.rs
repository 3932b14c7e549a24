use std::collections::BTreeMap;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;
use crate::Error;
use super::{decode_image, first_line, hmac_sha256, sha256_hex, OcrProvider};

const ALI_OCR_HOST: &str = "ocr-api.cn-hangzhou.aliyuncs.com";
const ALI_OCR_ACTION: &str = "RecognizeHandwriting";
const ALI_OCR_VERSION: &str = "2021-07-07";
const ALI_SIGN_ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// Alibaba Cloud OCR (`RecognizeHandwriting`), signed with ACS3-HMAC-SHA256.
pub struct AliOcrProvider {
    client: reqwest::Client,
    access_key_id: String,
    access_key_secret: String,
    host: String,
    endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AliResponse {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    /// JSON-encoded recognition payload.
    #[serde(rename = "Data")]
    data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AliRecognition {
    content: String,
}

impl AliOcrProvider {
    pub fn new(client: reqwest::Client, access_key_id: &str, access_key_secret: &str) -> Result<Self, Error> {
        if access_key_id.trim().is_empty() || access_key_secret.trim().is_empty() {
            return Err(Error::Config("ali OCR requires access_key and secret_key".into()));
        }
        Ok(Self {
            client,
            access_key_id: access_key_id.trim().to_string(),
            access_key_secret: access_key_secret.trim().to_string(),
            host: ALI_OCR_HOST.to_string(),
            endpoint: format!("https://{}/", ALI_OCR_HOST),
        })
    }

    /// Send requests to `url` instead of the public endpoint. The signed host stays the same.
    pub fn with_endpoint(mut self, url: &str) -> Self {
        self.endpoint = url.to_string();
        self
    }

    /// Headers that take part in the signature, lowercase keys.
    fn signed_headers(&self, payload_hash: &str, date: &str, nonce: &str) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/octet-stream".to_string());
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-acs-action".to_string(), ALI_OCR_ACTION.to_string());
        headers.insert("x-acs-content-sha256".to_string(), payload_hash.to_string());
        headers.insert("x-acs-date".to_string(), date.to_string());
        headers.insert("x-acs-signature-nonce".to_string(), nonce.to_string());
        headers.insert("x-acs-version".to_string(), ALI_OCR_VERSION.to_string());
        headers
    }
}

/// ACS3 `Authorization` value for a POST to `/` with no query string.
pub fn acs3_authorization(
    access_key_id: &str,
    access_key_secret: &str,
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> Result<String, Error> {
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "POST\n/\n\n{}\n{}\n{}",
        canonical_headers, signed_headers, payload_hash
    );
    let string_to_sign = format!("{}\n{}", ALI_SIGN_ALGORITHM, sha256_hex(canonical_request.as_bytes()));
    let signature = hex::encode(hmac_sha256(access_key_secret.as_bytes(), string_to_sign.as_bytes())?);

    Ok(format!(
        "{} Credential={},SignedHeaders={},Signature={}",
        ALI_SIGN_ALGORITHM, access_key_id, signed_headers, signature
    ))
}

#[async_trait]
impl OcrProvider for AliOcrProvider {
    fn name(&self) -> &str {
        "ali"
    }

    async fn solve(&self, image_base64: &str) -> Result<String, Error> {
        let body = decode_image(image_base64)?;
        let payload_hash = sha256_hex(&body);
        let date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = Uuid::new_v4().simple().to_string();

        let headers = self.signed_headers(&payload_hash, &date, &nonce);
        let authorization = acs3_authorization(&self.access_key_id, &self.access_key_secret, &headers, &payload_hash)?;

        let mut request = self.client
            .post(&self.endpoint)
            .header("Authorization", authorization)
            .body(body);
        for (k, v) in &headers {
            request = request.header(k.as_str(), v.as_str());
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Captcha(format!("ali OCR HTTP {} => {}", status, text)));
        }

        let parsed: AliResponse = serde_json::from_str(&text)
            .map_err(|e| Error::ExternalApi(format!("ali OCR response decode: {}", e)))?;
        if let Some(code) = parsed.code.filter(|c| !c.is_empty()) {
            return Err(Error::Captcha(format!(
                "ali OCR error {} {}",
                code,
                parsed.message.unwrap_or_default()
            )));
        }

        let data = parsed.data.unwrap_or_default();
        let recognition: AliRecognition = serde_json::from_str(&data)
            .map_err(|e| Error::ExternalApi(format!("ali OCR data decode: {}", e)))?;

        let text = first_line(&recognition.content);
        debug!("ali OCR recognized '{}'", text);
        if text.is_empty() {
            return Err(Error::Captcha("ali OCR detected no text".into()));
        }
        Ok(text)
    }
}
