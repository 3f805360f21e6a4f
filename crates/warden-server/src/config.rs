//! Server configuration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use warden_alerts::{AlertDispatcher, EmailChannel, LogChannel, MmsRecipient, SmsGatewayChannel};

/// Default seconds a host waits between alert notifications.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Default port camera hosts connect to.
pub const DEFAULT_BIND_PORT: u16 = 8888;

/// Default directory runs are recorded under.
pub const DEFAULT_RECORD_ROOT: &str = "saved_images";

/// Notification transport settings.
///
/// With no sender or recipients configured, alerts are still logged but
/// nothing is delivered externally.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    /// Address notifications are sent from.
    pub sender: Option<String>,
    /// Plain email recipients.
    pub email_recipients: Vec<String>,
    /// Phone-number/carrier pairs reached over carrier MMS gateways.
    pub mms_recipients: Vec<MmsRecipient>,
}

impl NotificationConfig {
    /// Create an empty notification configuration (log-only alerts).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sender: None,
            email_recipients: Vec::new(),
            mms_recipients: Vec::new(),
        }
    }

    /// Set the sending address.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Add an email recipient.
    #[must_use]
    pub fn with_email_recipient(mut self, address: impl Into<String>) -> Self {
        self.email_recipients.push(address.into());
        self
    }

    /// Add an MMS recipient.
    #[must_use]
    pub fn with_mms_recipient(mut self, recipient: MmsRecipient) -> Self {
        self.mms_recipients.push(recipient);
        self
    }

    /// Build the alert dispatcher these settings describe.
    ///
    /// A log channel is always attached, so alert decisions stay visible
    /// even without transport credentials. Email and MMS channels are
    /// added only when a sender and at least one recipient exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an MMS recipient names a carrier without a
    /// known gateway.
    pub fn build_dispatcher(&self) -> warden_alerts::Result<AlertDispatcher> {
        let mut dispatcher = AlertDispatcher::new().with_channel(Box::new(LogChannel::default()));

        if let Some(sender) = &self.sender {
            if !self.email_recipients.is_empty() {
                dispatcher.add_channel(Box::new(EmailChannel::new(
                    "email",
                    sender.clone(),
                    self.email_recipients.clone(),
                )?));
            }
            if !self.mms_recipients.is_empty() {
                dispatcher.add_channel(Box::new(SmsGatewayChannel::new(
                    "mms",
                    sender.clone(),
                    self.mms_recipients.clone(),
                )?));
            }
        }

        Ok(dispatcher)
    }
}

/// Configuration for the ingest server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to.
    pub bind_addr: SocketAddr,
    /// Directory runs are recorded under, one subdirectory per host.
    pub record_root: PathBuf,
    /// Classes that trigger a notification when detected.
    pub alert_classes: Vec<String>,
    /// Minimum time between notifications for one host.
    pub cooldown: Duration,
    /// Recover prior runs at startup and announce them downstream.
    pub continue_run: bool,
    /// Notification transport settings.
    pub notifications: NotificationConfig,
}

impl ServerConfig {
    /// Create a new server configuration with the specified bind address
    /// and record root.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, record_root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            record_root: record_root.into(),
            alert_classes: Vec::new(),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            continue_run: false,
            notifications: NotificationConfig::new(),
        }
    }

    /// Set the classes that trigger notifications.
    #[must_use]
    pub fn with_alert_classes(mut self, classes: Vec<String>) -> Self {
        self.alert_classes = classes;
        self
    }

    /// Set the notification cooldown.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set whether prior runs are recovered at startup.
    #[must_use]
    pub const fn with_continue_run(mut self, continue_run: bool) -> Self {
        self.continue_run = continue_run;
        self
    }

    /// Set the notification transport settings.
    #[must_use]
    pub fn with_notifications(mut self, notifications: NotificationConfig) -> Self {
        self.notifications = notifications;
        self
    }

    /// The record root as a path.
    #[must_use]
    pub fn record_root(&self) -> &Path {
        &self.record_root
    }

    /// The cooldown as a signed chrono duration, for timestamp math.
    #[must_use]
    pub fn cooldown_delta(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.cooldown.as_secs()).unwrap_or(i64::MAX))
    }

    /// The configuration snapshot echoed into every run summary.
    ///
    /// Keys are uppercase to match the summary file's other fields.
    /// Transport credentials are deliberately left out.
    #[must_use]
    pub fn summary_echo(&self) -> BTreeMap<String, serde_yaml::Value> {
        let mut echo = BTreeMap::new();
        echo.insert(
            "BIND_ADDRESS".to_string(),
            serde_yaml::Value::String(self.bind_addr.to_string()),
        );
        echo.insert(
            "RECORD_FOLDER".to_string(),
            serde_yaml::Value::String(self.record_root.display().to_string()),
        );
        echo.insert(
            "ALERT_CLASSES".to_string(),
            serde_yaml::Value::Sequence(
                self.alert_classes
                    .iter()
                    .map(|class| serde_yaml::Value::String(class.clone()))
                    .collect(),
            ),
        );
        echo.insert(
            "COOLDOWN_TIME".to_string(),
            serde_yaml::Value::Number(serde_yaml::Number::from(self.cooldown.as_secs())),
        );
        echo.insert(
            "CONTINUE_RUN".to_string(),
            serde_yaml::Value::Bool(self.continue_run),
        );
        echo
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(([0, 0, 0, 0], DEFAULT_BIND_PORT).into(), DEFAULT_RECORD_ROOT)
    }
}
