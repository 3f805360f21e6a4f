//! Fan-out of notifications to configured channels.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channels::{Notification, NotificationChannel, NotificationResult};

/// Sends each notification through every configured channel.
///
/// Channel failures are logged and reported in the results; one broken
/// channel never stops the others.
#[derive(Debug, Default)]
pub struct AlertDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher with no channels.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Adds a channel, builder style.
    #[must_use]
    pub fn with_channel(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.add_channel(channel);
        self
    }

    /// Adds a notification channel.
    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        debug!(channel = %channel.name(), "added notification channel");
        self.channels.push(channel);
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channels are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Sends `notification` through every channel, collecting one
    /// result per channel.
    pub fn dispatch(&self, notification: &Notification) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            match channel.send(notification) {
                Ok(result) => {
                    if !result.success {
                        warn!(
                            channel = %result.channel,
                            message = ?result.message,
                            "notification failed"
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    warn!(channel = %channel.name(), error = %e, "notification error");
                    results.push(NotificationResult::failure(channel.name(), e.to_string()));
                }
            }
        }
        results
    }

    /// Dispatches on a background task so the caller never waits on a
    /// slow channel.
    pub fn dispatch_detached(
        self: Arc<Self>,
        notification: Notification,
    ) -> JoinHandle<Vec<NotificationResult>> {
        tokio::spawn(async move { self.dispatch(&notification) })
    }
}
