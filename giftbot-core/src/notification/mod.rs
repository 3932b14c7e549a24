//! Outbound alert channels.

pub mod wxpusher;

use async_trait::async_trait;
use crate::Error;

pub use wxpusher::{WxPusherConfig, WxPusherNotifier};

/// A channel that can deliver a human-readable alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name stored with every notification record.
    fn channel(&self) -> &str;

    /// Deliver the message. `Ok` carries the channel's own result text.
    async fn send(&self, title: &str, summary: &str, content: &str) -> Result<String, Error>;
}
