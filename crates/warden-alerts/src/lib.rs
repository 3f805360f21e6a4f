//! Detection alert throttling and notification channels for warden.
//!
//! `warden-alerts` decides when a stored image deserves a human's
//! attention and delivers the message. Detection classes pass through a
//! per-host [`CooldownGate`]; when the gate opens, an
//! [`AlertDispatcher`] fans the notification out to every configured
//! [`NotificationChannel`].
//!
//! # Features
//!
//! - **Cooldown Gate**: alert at most once per cooldown window, per host
//! - **Email Channel**: placeholder SMTP delivery to a recipient list
//! - **MMS Gateway Channel**: text alerts via carrier email gateways
//! - **Custom Channels**: implement [`NotificationChannel`] for new
//!   transports
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use warden_alerts::{
//!     AlertDispatcher, CooldownGate, GateDecision, LogChannel, Notification,
//! };
//!
//! let dispatcher = AlertDispatcher::new().with_channel(Box::new(LogChannel::default()));
//! let mut gate = CooldownGate::new(vec!["lion".to_string()], Duration::seconds(60));
//!
//! let detected = vec!["lion".to_string(), "zebra".to_string()];
//! let now = Utc::now();
//! if let GateDecision::Send(classes) = gate.offer(&detected, now) {
//!     let notification = Notification::new("cam-north", classes, "/data/img.jpeg", now);
//!     let results = dispatcher.dispatch(&notification);
//!     assert!(results.iter().all(|r| r.success));
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod dispatch;
pub mod error;
pub mod throttle;

// Re-export main types at crate root
pub use channels::{
    carrier_gateway, EmailChannel, LogChannel, MmsRecipient, Notification, NotificationChannel,
    NotificationResult, SmsGatewayChannel,
};
pub use dispatch::AlertDispatcher;
pub use error::{NotificationError, Result};
pub use throttle::{CooldownGate, GateDecision, SkipReason};
