//! OCR backends that turn a base64 captcha image into text, and the
//! round-robin pool that spreads load across them.

pub mod pool;
pub mod ali;
pub mod tencent;
pub mod google;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::Error;

pub use pool::OcrPool;
pub use ali::AliOcrProvider;
pub use tencent::TencentOcrProvider;
pub use google::GoogleVisionProvider;

/// One vendor OCR backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize the text in `image_base64` (a data-URL prefix is allowed).
    /// Returns the first non-empty line; zero detections is a `Captcha` error.
    async fn solve(&self, image_base64: &str) -> Result<String, Error>;
}

/// One entry of `captcha.providers` in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrProviderConfig {
    /// `ali`, `tencent` or `google`.
    #[serde(rename = "type")]
    pub kind: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub credentials_json: String,
}

/// Drop everything up to and including the first `,` (the `data:image/...;base64,` part).
pub fn strip_data_url_prefix(image: &str) -> &str {
    match image.find(',') {
        Some(idx) => &image[idx + 1..],
        None => image,
    }
}

pub fn decode_image(image_base64: &str) -> Result<Vec<u8>, Error> {
    STANDARD
        .decode(strip_data_url_prefix(image_base64).trim())
        .map_err(|e| Error::Captcha(format!("invalid base64 image: {}", e)))
}

pub fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::Captcha(format!("hmac key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_url_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url_prefix("QUJD"), "QUJD");
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        assert_eq!(decode_image("data:image/png;base64,QUJD").unwrap(), b"ABC".to_vec());
        let err = decode_image("data:image/png;base64,%%%").unwrap_err();
        assert!(matches!(err, Error::Captcha(_)));
    }

    #[test]
    fn test_first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  x7k2 \nsecond"), "x7k2");
        assert_eq!(first_line("   \n"), "");
    }
}
