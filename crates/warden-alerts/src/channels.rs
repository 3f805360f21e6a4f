//! Notification channels for detection alerts.
//!
//! This module provides the [`NotificationChannel`] trait and
//! implementations for delivering detection alerts via email and
//! carrier MMS gateways. The transports are placeholders that log the
//! outgoing message; wiring in an SMTP client swaps out one function
//! per channel.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NotificationError, Result};

/// A detection alert to be sent through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Host whose camera produced the image.
    pub hostname: String,
    /// Alert classes detected in the image.
    pub classes: Vec<String>,
    /// Where the image was stored.
    pub image_path: PathBuf,
    /// When the image was received.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates a notification for one stored image.
    #[must_use]
    pub fn new(
        hostname: impl Into<String>,
        classes: Vec<String>,
        image_path: impl Into<PathBuf>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            classes,
            image_path: image_path.into(),
            timestamp,
        }
    }

    /// The detected classes joined for display.
    #[must_use]
    pub fn class_list(&self) -> String {
        self.classes.join(", ")
    }

    /// The message body shared by all channels.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "At {} {}, we received an image from {} with the following detected classes: {}",
            self.timestamp.format("%Y-%m-%d"),
            self.timestamp.format("%Hh%Mm%Ss"),
            self.hostname,
            self.class_list()
        )
    }

    /// The stored image path.
    #[must_use]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Result of sending a notification.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Whether the notification was sent successfully.
    pub success: bool,
    /// The channel that processed this notification.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
        }
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// Trait for notification channels.
///
/// Implement this trait to deliver detection alerts via a different
/// protocol or service.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends a notification through this channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::Transport`] if the notification
    /// cannot be sent.
    fn send(&self, notification: &Notification) -> Result<NotificationResult>;

    /// Returns true if this channel is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Resolves a carrier name to its MMS email gateway domain.
///
/// Carrier names are matched case-insensitively.
///
/// # Errors
///
/// Returns [`NotificationError::UnknownCarrier`] for carriers without a
/// known gateway.
pub fn carrier_gateway(carrier: &str) -> Result<&'static str> {
    match carrier.to_lowercase().as_str() {
        "verizon" => Ok("vzwpix.com"),
        "tmobile" => Ok("tmomail.net"),
        "sprint" => Ok("pm.sprint.com"),
        "at&t" => Ok("mms.att.net"),
        "boost" => Ok("myboostmobile.com"),
        "cricket" => Ok("mms.cricketwireless.net"),
        "uscellular" => Ok("mms.uscc.net"),
        other => Err(NotificationError::UnknownCarrier {
            carrier: other.to_string(),
        }),
    }
}

/// A phone number plus the carrier that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MmsRecipient {
    /// The phone number, digits only.
    pub number: String,
    /// The carrier name, e.g. `verizon`.
    pub carrier: String,
}

impl MmsRecipient {
    /// Creates a recipient.
    #[must_use]
    pub fn new(number: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            carrier: carrier.into(),
        }
    }

    /// The gateway email address for this recipient.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::UnknownCarrier`] if the carrier has
    /// no known gateway.
    pub fn address(&self) -> Result<String> {
        let gateway = carrier_gateway(&self.carrier)?;
        Ok(format!("{}@{}", self.number, gateway))
    }
}

/// Placeholder email notification channel.
///
/// Logs outgoing email notifications instead of actually sending them.
/// A real deployment would swap the log call for an SMTP client.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    name: String,
    sender: String,
    recipients: Vec<String>,
    enabled: bool,
}

impl EmailChannel {
    /// Creates a new email channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::NoRecipients`] if `recipients` is
    /// empty.
    pub fn new(
        name: impl Into<String>,
        sender: impl Into<String>,
        recipients: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients { channel: name });
        }

        Ok(Self {
            name,
            sender: sender.into(),
            recipients,
            enabled: true,
        })
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the recipient addresses.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Formats the email subject line.
    #[must_use]
    pub fn subject(&self, notification: &Notification) -> String {
        format!(
            "Warden ({}): new {} detection",
            notification.hostname,
            notification.class_list()
        )
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        // Placeholder transport. A real implementation would build a
        // MIME message with the image attached and hand it to an SMTP
        // client here.
        info!(
            channel = %self.name(),
            to = ?self.recipients,
            from = %self.sender,
            subject = %self.subject(notification),
            image = %notification.image_path.display(),
            "would send email notification"
        );
        debug!(body = %notification.body(), "email body");

        Ok(NotificationResult::success(self.name())
            .with_message("email notification placeholder"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Placeholder MMS notification channel.
///
/// Delivers text alerts by emailing each recipient's carrier MMS
/// gateway, the `{number}@{gateway}` trick. The transport is a
/// placeholder that logs the outgoing message.
#[derive(Debug, Clone)]
pub struct SmsGatewayChannel {
    name: String,
    sender: String,
    recipients: Vec<MmsRecipient>,
    addresses: Vec<String>,
    enabled: bool,
}

impl SmsGatewayChannel {
    /// Creates a new MMS gateway channel, resolving every recipient's
    /// gateway address up front.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::NoRecipients`] if `recipients` is
    /// empty, or [`NotificationError::UnknownCarrier`] if any recipient
    /// names a carrier without a known gateway.
    pub fn new(
        name: impl Into<String>,
        sender: impl Into<String>,
        recipients: Vec<MmsRecipient>,
    ) -> Result<Self> {
        let name = name.into();
        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients { channel: name });
        }
        let addresses = recipients
            .iter()
            .map(MmsRecipient::address)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            sender: sender.into(),
            recipients,
            addresses,
            enabled: true,
        })
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the configured recipients.
    #[must_use]
    pub fn recipients(&self) -> &[MmsRecipient] {
        &self.recipients
    }

    /// Returns the resolved gateway addresses.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Formats the MMS subject line.
    #[must_use]
    pub fn subject(&self, notification: &Notification) -> String {
        format!("New Warden image from {}", notification.hostname)
    }
}

impl NotificationChannel for SmsGatewayChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name())
                .with_message("channel disabled, notification skipped"));
        }

        for address in &self.addresses {
            info!(
                channel = %self.name(),
                to = %address,
                from = %self.sender,
                subject = %self.subject(notification),
                image = %notification.image_path.display(),
                "would send MMS notification"
            );
        }
        debug!(body = %notification.body(), "MMS body");

        Ok(NotificationResult::success(self.name())
            .with_message("MMS notification placeholder"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A channel that logs detection alerts for debugging.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
    enabled: bool,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
        }

        warn!(
            host = %notification.hostname,
            classes = ?notification.classes,
            image = %notification.image_path.display(),
            "detection alert"
        );

        Ok(NotificationResult::success(self.name()).with_message("logged to tracing"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
