//! Notification port — per-user in-app notifications.

use std::future::Future;

use homestead_domain::error::HomesteadError;
use homestead_domain::notification::NotificationLevel;

/// Delivers a notification to one user's inbox.
pub trait Notifier {
    fn notify(
        &self,
        owner: &str,
        title: &str,
        body: &str,
        level: NotificationLevel,
    ) -> impl Future<Output = Result<(), HomesteadError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn notify(
        &self,
        owner: &str,
        title: &str,
        body: &str,
        level: NotificationLevel,
    ) -> impl Future<Output = Result<(), HomesteadError>> + Send {
        (**self).notify(owner, title, body, level)
    }
}
