//! HTTP client abstraction for outbound form posts.
//!
//! The game API client talks to the network only through [`HttpClient`], so tests
//! can substitute canned responses without a real server. [`DefaultHttpClient`]
//! wraps `reqwest`.
//!
//! Non-2xx statuses are returned as-is inside [`HttpResponse`]; callers decide how
//! to classify them. Only transport failures surface as `Err`.

use async_trait::async_trait;
use crate::Error;

/// Status code and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded` with the given extra headers.
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        form: &[(String, String)],
    ) -> Result<HttpResponse, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        form: &[(String, String)],
    ) -> Result<HttpResponse, Error> {
        let mut request = self.client.post(url).form(form);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
