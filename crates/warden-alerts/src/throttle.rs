//! Cooldown gating for detection alerts.
//!
//! Hosts upload images in bursts, and an animal loitering in front of a
//! camera would otherwise page someone once per frame. The
//! [`CooldownGate`] keeps per-host alert state: it triggers only when an
//! alert class is detected, and after a send it stays closed until the
//! cooldown elapses.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// The outcome of offering one image's detections to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Send a notification for these alert classes.
    Send(Vec<String>),
    /// No notification this time.
    Skip(SkipReason),
}

impl GateDecision {
    /// Returns true for [`GateDecision::Send`].
    #[must_use]
    pub const fn is_send(&self) -> bool {
        matches!(self, Self::Send(_))
    }
}

/// Why the gate declined to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// None of the detected classes is an alert class.
    NoAlertClasses,
    /// An alert went out recently and the cooldown has not elapsed.
    CoolingDown,
}

/// Per-host alert throttle.
///
/// The gate is owned by a single host session and mutated on every
/// image, so it needs no interior locking.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    alert_classes: Vec<String>,
    cooldown: Duration,
    last_alert: Option<DateTime<Utc>>,
}

impl CooldownGate {
    /// Creates a gate that alerts on `alert_classes` at most once per
    /// `cooldown`.
    #[must_use]
    pub const fn new(alert_classes: Vec<String>, cooldown: Duration) -> Self {
        Self {
            alert_classes,
            cooldown,
            last_alert: None,
        }
    }

    /// The classes that trigger an alert.
    #[must_use]
    pub fn alert_classes(&self) -> &[String] {
        &self.alert_classes
    }

    /// The configured cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// When the last alert was sent, if any.
    #[must_use]
    pub const fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    /// Offers one image's detected classes to the gate.
    ///
    /// Returns [`GateDecision::Send`] with the detected alert classes
    /// (in first-detected order, deduplicated) when at least one alert
    /// class was detected and the cooldown has elapsed; the first alert
    /// always passes. On a send the cooldown restarts at `now`. Skipped
    /// offers never touch the cooldown clock.
    pub fn offer(&mut self, detected: &[String], now: DateTime<Utc>) -> GateDecision {
        let triggered = self.triggered_classes(detected);
        if triggered.is_empty() {
            return GateDecision::Skip(SkipReason::NoAlertClasses);
        }

        if let Some(last) = self.last_alert {
            if now - last < self.cooldown {
                debug!(
                    classes = ?triggered,
                    since_last = %(now - last),
                    "alert suppressed, cooling down"
                );
                return GateDecision::Skip(SkipReason::CoolingDown);
            }
        }

        self.last_alert = Some(now);
        GateDecision::Send(triggered)
    }

    /// The detected classes that are alert classes, deduplicated in
    /// first-detected order.
    fn triggered_classes(&self, detected: &[String]) -> Vec<String> {
        let mut triggered: Vec<String> = Vec::new();
        for class in detected {
            if self.alert_classes.contains(class) && !triggered.contains(class) {
                triggered.push(class.clone());
            }
        }
        triggered
    }
}
