use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use crate::Error;
use super::{decode_image, first_line, hmac_sha256, sha256_hex, strip_data_url_prefix, OcrProvider};

const TC_OCR_HOST: &str = "ocr.tencentcloudapi.com";
const TC_OCR_SERVICE: &str = "ocr";
const TC_OCR_ACTION: &str = "GeneralAccurateOCR";
const TC_OCR_VERSION: &str = "2018-11-19";
const TC_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Tencent Cloud OCR (`GeneralAccurateOCR`), signed with TC3-HMAC-SHA256.
pub struct TencentOcrProvider {
    client: reqwest::Client,
    secret_id: String,
    secret_key: String,
    region: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TcEnvelope {
    #[serde(rename = "Response")]
    response: TcResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TcResponse {
    #[serde(rename = "TextDetections")]
    text_detections: Vec<TcTextDetection>,
    #[serde(rename = "Error")]
    error: Option<TcError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TcTextDetection {
    #[serde(rename = "DetectedText")]
    detected_text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TcError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
}

impl TencentOcrProvider {
    pub fn new(client: reqwest::Client, secret_id: &str, secret_key: &str, region: &str) -> Result<Self, Error> {
        if secret_id.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(Error::Config("tencent OCR requires access_key and secret_key".into()));
        }
        Ok(Self {
            client,
            secret_id: secret_id.trim().to_string(),
            secret_key: secret_key.trim().to_string(),
            region: region.trim().to_string(),
            endpoint: format!("https://{}/", TC_OCR_HOST),
        })
    }

    /// Send requests to `url` instead of the public endpoint. The signed host stays the same.
    pub fn with_endpoint(mut self, url: &str) -> Self {
        self.endpoint = url.to_string();
        self
    }
}

/// TC3 `Authorization` value for a JSON POST issued at `timestamp` (unix seconds).
pub fn tc3_authorization(
    secret_id: &str,
    secret_key: &str,
    payload: &str,
    timestamp: i64,
) -> Result<String, Error> {
    let date = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| Error::Captcha(format!("invalid signing timestamp {}", timestamp)))?
        .format("%Y-%m-%d")
        .to_string();

    // 1) canonical request
    let signed_headers = "content-type;host;x-tc-action";
    let canonical_headers = format!(
        "content-type:{}\nhost:{}\nx-tc-action:{}\n",
        TC_CONTENT_TYPE,
        TC_OCR_HOST,
        TC_OCR_ACTION.to_lowercase()
    );
    let canonical_request = format!(
        "POST\n/\n\n{}\n{}\n{}",
        canonical_headers,
        signed_headers,
        sha256_hex(payload.as_bytes())
    );

    // 2) string to sign
    let scope = format!("{}/{}/tc3_request", date, TC_OCR_SERVICE);
    let string_to_sign = format!(
        "TC3-HMAC-SHA256\n{}\n{}\n{}",
        timestamp,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    // 3) derived key chain
    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), date.as_bytes())?;
    let secret_service = hmac_sha256(&secret_date, TC_OCR_SERVICE.as_bytes())?;
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "TC3-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        secret_id, scope, signed_headers, signature
    ))
}

#[async_trait]
impl OcrProvider for TencentOcrProvider {
    fn name(&self) -> &str {
        "tencent"
    }

    async fn solve(&self, image_base64: &str) -> Result<String, Error> {
        // validate the payload even though Tencent takes base64 directly
        decode_image(image_base64)?;
        let payload = json!({ "ImageBase64": strip_data_url_prefix(image_base64).trim() }).to_string();

        let timestamp = Utc::now().timestamp();
        let authorization = tc3_authorization(&self.secret_id, &self.secret_key, &payload, timestamp)?;

        let mut request = self.client
            .post(&self.endpoint)
            .header("Authorization", authorization)
            .header("Content-Type", TC_CONTENT_TYPE)
            .header("Host", TC_OCR_HOST)
            .header("X-TC-Action", TC_OCR_ACTION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", TC_OCR_VERSION);
        if !self.region.is_empty() {
            request = request.header("X-TC-Region", self.region.as_str());
        }

        let resp = request.body(payload).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Captcha(format!("tencent OCR HTTP {} => {}", status, text)));
        }

        let envelope: TcEnvelope = serde_json::from_str(&text)
            .map_err(|e| Error::ExternalApi(format!("tencent OCR response decode: {}", e)))?;
        if let Some(err) = envelope.response.error {
            return Err(Error::Captcha(format!("tencent OCR error {} {}", err.code, err.message)));
        }

        let detected = envelope.response.text_detections
            .first()
            .map(|d| first_line(&d.detected_text))
            .unwrap_or_default();
        debug!("tencent OCR recognized '{}'", detected);
        if detected.is_empty() {
            return Err(Error::Captcha("tencent OCR detected no text".into()));
        }
        Ok(detected)
    }
}
