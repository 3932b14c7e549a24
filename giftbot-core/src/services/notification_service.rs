use std::sync::Arc;
use chrono::Utc;
use tracing::{error, info};
use giftbot_common::models::{NotificationRecord, NotificationStatus};
use giftbot_common::traits::repository_traits::NotificationRepository;
use crate::notification::Notifier;
use crate::Error;

/// Sends through one channel and keeps an append-only log of every attempt.
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, repo: Arc<dyn NotificationRepository>) -> Self {
        Self { notifier, repo }
    }

    /// Deliver and record. A failed delivery is still recorded (status `failed`)
    /// and then returned as the error.
    pub async fn send_and_save(&self, title: &str, summary: &str, content: &str) -> Result<(), Error> {
        let sent = self.notifier.send(title, summary, content).await;

        let (status, result) = match &sent {
            Ok(msg) => (NotificationStatus::Success, msg.clone()),
            Err(e) => (NotificationStatus::Failed, e.to_string()),
        };
        let record = NotificationRecord {
            id: 0,
            channel: self.notifier.channel().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            result,
            status,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.save_notification(&record).await {
            error!("Failed to save {} notification '{}': {}", record.channel, title, e);
            sent?;
            return Err(e);
        }

        match sent {
            Ok(_) => {
                info!("Notification '{}' sent via {}", title, record.channel);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
