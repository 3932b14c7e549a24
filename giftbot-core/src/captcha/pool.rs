use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use crate::Error;
use super::{AliOcrProvider, GoogleVisionProvider, OcrProvider, OcrProviderConfig, TencentOcrProvider};

/// Fixed set of interchangeable OCR providers handed out in strict rotation.
///
/// The rotation index is the only state shared between concurrent redemption
/// attempts, so it is a lock-free atomic counter.
pub struct OcrPool {
    providers: Vec<Arc<dyn OcrProvider>>,
    next: AtomicUsize,
}

impl OcrPool {
    pub fn new(providers: Vec<Arc<dyn OcrProvider>>) -> Result<Self, Error> {
        if providers.is_empty() {
            return Err(Error::Config("no OCR provider could be constructed".into()));
        }
        Ok(Self {
            providers,
            next: AtomicUsize::new(0),
        })
    }

    /// Build every configured provider, skipping the ones whose credentials are
    /// missing or malformed. Fails if none survive.
    pub fn from_configs(configs: &[OcrProviderConfig], client: reqwest::Client) -> Result<Self, Error> {
        let mut providers: Vec<Arc<dyn OcrProvider>> = Vec::new();

        for (idx, cfg) in configs.iter().enumerate() {
            let built: Result<Arc<dyn OcrProvider>, Error> = match cfg.kind.to_ascii_lowercase().as_str() {
                "ali" | "aliyun" => AliOcrProvider::new(client.clone(), &cfg.access_key, &cfg.secret_key)
                    .map(|p| Arc::new(p) as Arc<dyn OcrProvider>),
                "tencent" | "tc" => TencentOcrProvider::new(client.clone(), &cfg.access_key, &cfg.secret_key, &cfg.region)
                    .map(|p| Arc::new(p) as Arc<dyn OcrProvider>),
                "google" => GoogleVisionProvider::new(client.clone(), &cfg.credentials_json)
                    .map(|p| Arc::new(p) as Arc<dyn OcrProvider>),
                other => Err(Error::Config(format!("unknown OCR provider type '{}'", other))),
            };

            match built {
                Ok(provider) => {
                    info!("OCR provider #{} ready: {}", idx, provider.name());
                    providers.push(provider);
                }
                Err(e) => warn!("Skipping OCR provider #{} ({}): {}", idx, cfg.kind, e),
            }
        }

        Self::new(providers)
    }

    /// Next provider in rotation. Never blocks; wraps after the last one.
    pub fn get(&self) -> &Arc<dyn OcrProvider> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        &self.providers[idx]
    }

    pub async fn solve(&self, image_base64: &str) -> Result<String, Error> {
        self.get().solve(image_base64).await
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}
