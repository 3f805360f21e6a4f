//! Per-connection host sessions.
//!
//! A [`HostSession`] is born from a completed handshake and owns
//! everything one connected host touches: its run store, its alert
//! gate, and the event sink to the dashboard. The connection task
//! drives it alone, so none of this state needs locking.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};
use warden_alerts::{AlertDispatcher, CooldownGate, GateDecision, Notification};
use warden_proto::{
    decode_payload, filtered_labels, DashboardEvent, DetectionBox, HeaderTag, ProtocolError,
};
use warden_store::{timestamp, RunStore};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Accumulates handshake fields until the host signals it is done.
///
/// Fields may arrive in any order; each one overwrites any earlier
/// value for the same header.
#[derive(Debug)]
pub struct Handshake {
    hostname: Option<String>,
    continue_run: Option<bool>,
    filter_classes: Option<Vec<String>>,
}

impl Handshake {
    /// Creates an empty handshake.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hostname: None,
            continue_run: None,
            filter_classes: None,
        }
    }

    /// Absorbs one handshake field from its header and body frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedHeader`] for headers that are
    /// not handshake fields, or a payload error if the body does not
    /// decode to the field's type.
    pub fn absorb(&mut self, header: HeaderTag, body: &[u8]) -> Result<(), ProtocolError> {
        match header {
            HeaderTag::Hostname => self.hostname = Some(decode_payload(body)?),
            HeaderTag::ContinueRun => self.continue_run = Some(decode_payload(body)?),
            HeaderTag::Classes => self.filter_classes = Some(decode_payload(body)?),
            other => return Err(ProtocolError::UnexpectedHeader { header: other }),
        }
        Ok(())
    }

    /// Consumes the handshake, checking every field arrived.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::IncompleteHandshake`] naming the first
    /// field that never arrived, or [`ProtocolError::InvalidHostname`]
    /// if the declared hostname cannot name the host's run directory.
    pub fn finish(self) -> Result<SessionSettings, ProtocolError> {
        let hostname = self.hostname.ok_or(ProtocolError::IncompleteHandshake {
            missing: "HOSTNAME",
        })?;
        let continue_run = self.continue_run.ok_or(ProtocolError::IncompleteHandshake {
            missing: "CONTINUE_RUN",
        })?;
        let filter_classes = self.filter_classes.ok_or(ProtocolError::IncompleteHandshake {
            missing: "CLASSES",
        })?;

        if !valid_hostname(&hostname) {
            return Err(ProtocolError::InvalidHostname { hostname });
        }

        Ok(SessionSettings {
            hostname,
            continue_run,
            filter_classes,
        })
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// A hostname must stay a single path component under the record root.
/// Separators, dot segments, and empty names would escape the per-host
/// layout.
fn valid_hostname(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// What a host declared about itself during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// The host's unique name.
    pub hostname: String,
    /// Whether the host asked to continue its prior run.
    pub continue_run: bool,
    /// Classes the host records. Ignored when continuing a run, which
    /// recovers the list from the prior summary instead.
    pub filter_classes: Vec<String>,
}

/// How a session's run directory was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A fresh run directory was created.
    New,
    /// The host's most recent run was resumed.
    Continue,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// One connected host's live state.
#[derive(Debug)]
pub struct HostSession {
    store: RunStore,
    gate: CooldownGate,
    dispatcher: Arc<AlertDispatcher>,
    events: mpsc::UnboundedSender<DashboardEvent>,
}

impl HostSession {
    /// Activates a session from completed handshake settings.
    ///
    /// Resolves the run store (new directory, or the host's most recent
    /// one), announces the session downstream with an initialize event,
    /// and records the connection as a liveness signal.
    ///
    /// # Errors
    ///
    /// Returns a store error if the run directory cannot be created, or
    /// if continuation was requested and the host has no prior run.
    /// Either aborts the connection.
    pub fn activate(
        config: &ServerConfig,
        dispatcher: Arc<AlertDispatcher>,
        events: mpsc::UnboundedSender<DashboardEvent>,
        settings: SessionSettings,
        now: DateTime<Utc>,
    ) -> ServerResult<Self> {
        let store = if settings.continue_run {
            RunStore::resume(&config.record_root, &settings.hostname)?
        } else {
            RunStore::create(
                &config.record_root,
                &settings.hostname,
                settings.filter_classes,
                config.summary_echo(),
                now,
            )?
        };

        let gate = CooldownGate::new(config.alert_classes.clone(), config.cooldown_delta());
        let mut session = Self {
            store,
            gate,
            dispatcher,
            events,
        };

        session.emit(DashboardEvent::initialize(
            session.store.hostname(),
            session.store.filter_classes().to_vec(),
            session.store.image_log_path(),
            now,
        ));
        session.store.touch_heartbeat(now)?;

        info!(
            host = %session.store.hostname(),
            mode = %session.run_mode(),
            dir = %session.store.session_dir().display(),
            "session active"
        );
        Ok(session)
    }

    /// Processes one image message: detection boxes plus image bytes.
    ///
    /// Stores the image and its sidecar, appends to the image log,
    /// announces the image downstream, offers the detections to the
    /// alert gate, and records the upload as a liveness signal. Alert
    /// delivery runs on a detached task and can never stall or fail
    /// ingestion.
    ///
    /// # Errors
    ///
    /// Returns a store error if any write fails. The connection closes
    /// rather than risk silently dropping later images.
    pub fn handle_image(
        &mut self,
        boxes: &[DetectionBox],
        image: &[u8],
        now: DateTime<Utc>,
    ) -> ServerResult<()> {
        let labels = filtered_labels(boxes, self.store.filter_classes());
        let stored = self.store.append_image(image, &labels, boxes, now)?;

        self.emit(DashboardEvent::image(
            self.store.hostname(),
            stored.image_path.clone(),
            labels.clone(),
            now,
        ));

        match self.gate.offer(&labels, now) {
            GateDecision::Send(classes) => {
                info!(
                    host = %self.store.hostname(),
                    classes = ?classes,
                    image = %stored.image_path.display(),
                    "alert triggered"
                );
                if !self.dispatcher.is_empty() {
                    let notification =
                        Notification::new(self.store.hostname(), classes, stored.image_path, now);
                    drop(Arc::clone(&self.dispatcher).dispatch_detached(notification));
                }
            }
            GateDecision::Skip(reason) => {
                debug!(host = %self.store.hostname(), reason = ?reason, "no alert");
            }
        }

        self.store.touch_heartbeat(now)?;
        Ok(())
    }

    /// Processes one liveness signal carrying the host's own clock.
    ///
    /// The reported timestamp is forwarded downstream and written to the
    /// heartbeat file as-is; a clock too far out of range to represent
    /// falls back to server time.
    ///
    /// # Errors
    ///
    /// Returns a store error if the heartbeat write fails.
    pub fn handle_heartbeat(&mut self, unix_seconds: f64) -> ServerResult<()> {
        let reported = timestamp::from_unix_seconds(unix_seconds).unwrap_or_else(Utc::now);
        self.emit(DashboardEvent::connection(self.store.hostname(), reported));
        self.store.touch_heartbeat(reported)?;
        Ok(())
    }

    /// The host this session belongs to.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.store.hostname()
    }

    /// Whether this session created a run or resumed one.
    #[must_use]
    pub const fn run_mode(&self) -> RunMode {
        if self.store.is_continuation() {
            RunMode::Continue
        } else {
            RunMode::New
        }
    }

    /// The session's run store.
    #[must_use]
    pub const fn store(&self) -> &RunStore {
        &self.store
    }

    /// Pushes an event downstream, best-effort.
    fn emit(&self, event: DashboardEvent) {
        if self.events.send(event).is_err() {
            debug!(host = %self.store.hostname(), "dashboard receiver gone, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use chrono::Duration;
    use proptest::prelude::*;
    use tempfile::TempDir;
    use test_case::test_case;
    use warden_alerts::{NotificationChannel, NotificationResult};
    use warden_proto::encode_payload;
    use warden_store::Heartbeat;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_685_628_573_521).expect("valid timestamp")
    }

    fn test_config(root: &TempDir) -> ServerConfig {
        ServerConfig::new(([127, 0, 0, 1], 0).into(), root.path())
            .with_alert_classes(vec!["lion".to_string()])
            .with_cooldown(StdDuration::from_secs(60))
    }

    fn settings(hostname: &str, continue_run: bool) -> SessionSettings {
        SessionSettings {
            hostname: hostname.to_string(),
            continue_run,
            filter_classes: vec!["lion".to_string(), "cheetah".to_string()],
        }
    }

    fn activate(
        config: &ServerConfig,
        dispatcher: AlertDispatcher,
        settings: SessionSettings,
    ) -> (HostSession, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = HostSession::activate(config, Arc::new(dispatcher), tx, settings, fixed_now())
            .expect("activation must succeed");
        (session, rx)
    }

    fn lion_box() -> DetectionBox {
        DetectionBox::new("lion", 0.93, [10, 20, 200, 150])
    }

    /// Captures every notification that reaches it.
    #[derive(Debug, Default)]
    struct RecordingChannel {
        sent: Arc<Mutex<Vec<Notification>>>,
    }

    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&self, notification: &Notification) -> warden_alerts::Result<NotificationResult> {
            self.sent.lock().expect("lock").push(notification.clone());
            Ok(NotificationResult::success("recording"))
        }
    }

    // ==================== Handshake Tests ====================

    #[test]
    fn test_handshake_absorbs_fields_in_any_order() {
        let mut handshake = Handshake::new();
        handshake
            .absorb(
                HeaderTag::Classes,
                &encode_payload(&vec!["lion".to_string()]).unwrap(),
            )
            .unwrap();
        handshake
            .absorb(HeaderTag::ContinueRun, &encode_payload(&false).unwrap())
            .unwrap();
        handshake
            .absorb(
                HeaderTag::Hostname,
                &encode_payload(&"cam-north".to_string()).unwrap(),
            )
            .unwrap();

        let settings = handshake.finish().expect("complete handshake");
        assert_eq!(settings.hostname, "cam-north");
        assert!(!settings.continue_run);
        assert_eq!(settings.filter_classes, vec!["lion"]);
    }

    #[test]
    fn test_handshake_last_value_wins() {
        let mut handshake = Handshake::new();
        handshake
            .absorb(
                HeaderTag::Hostname,
                &encode_payload(&"cam-old".to_string()).unwrap(),
            )
            .unwrap();
        handshake
            .absorb(
                HeaderTag::Hostname,
                &encode_payload(&"cam-new".to_string()).unwrap(),
            )
            .unwrap();
        handshake
            .absorb(HeaderTag::ContinueRun, &encode_payload(&false).unwrap())
            .unwrap();
        handshake
            .absorb(
                HeaderTag::Classes,
                &encode_payload(&Vec::<String>::new()).unwrap(),
            )
            .unwrap();

        let settings = handshake.finish().expect("complete handshake");
        assert_eq!(settings.hostname, "cam-new");
    }

    #[test]
    fn test_handshake_rejects_non_handshake_headers() {
        let mut handshake = Handshake::new();
        let err = handshake
            .absorb(HeaderTag::Image, b"{}")
            .expect_err("image header is not a handshake field");

        assert!(matches!(
            err,
            ProtocolError::UnexpectedHeader {
                header: HeaderTag::Image
            }
        ));
    }

    #[test]
    fn test_handshake_rejects_malformed_body() {
        let mut handshake = Handshake::new();
        let err = handshake
            .absorb(HeaderTag::ContinueRun, b"not json")
            .expect_err("body must decode to a bool");

        assert!(matches!(err, ProtocolError::Payload(_)));
    }

    #[test_case(false, true, true => "HOSTNAME"; "missing hostname")]
    #[test_case(true, false, true => "CONTINUE_RUN"; "missing continue run")]
    #[test_case(true, true, false => "CLASSES"; "missing classes")]
    fn test_incomplete_handshake_names_first_missing_field(
        hostname: bool,
        continue_run: bool,
        classes: bool,
    ) -> &'static str {
        let mut handshake = Handshake::new();
        if hostname {
            handshake
                .absorb(
                    HeaderTag::Hostname,
                    &encode_payload(&"cam-north".to_string()).unwrap(),
                )
                .unwrap();
        }
        if continue_run {
            handshake
                .absorb(HeaderTag::ContinueRun, &encode_payload(&true).unwrap())
                .unwrap();
        }
        if classes {
            handshake
                .absorb(
                    HeaderTag::Classes,
                    &encode_payload(&Vec::<String>::new()).unwrap(),
                )
                .unwrap();
        }

        match handshake.finish() {
            Err(ProtocolError::IncompleteHandshake { missing }) => missing,
            other => panic!("expected incomplete handshake, got {other:?}"),
        }
    }

    fn complete_handshake(hostname: &str) -> Handshake {
        let mut handshake = Handshake::new();
        handshake
            .absorb(
                HeaderTag::Hostname,
                &encode_payload(&hostname.to_string()).unwrap(),
            )
            .unwrap();
        handshake
            .absorb(HeaderTag::ContinueRun, &encode_payload(&false).unwrap())
            .unwrap();
        handshake
            .absorb(
                HeaderTag::Classes,
                &encode_payload(&Vec::<String>::new()).unwrap(),
            )
            .unwrap();
        handshake
    }

    #[test_case("../escape" ; "leading dot dot")]
    #[test_case("nested/../up" ; "embedded slash")]
    #[test_case("cam\\north" ; "backslash")]
    #[test_case(".." ; "bare dot dot")]
    #[test_case("." ; "bare dot")]
    #[test_case("" ; "empty")]
    fn test_handshake_rejects_unusable_hostname(hostname: &str) {
        let err = complete_handshake(hostname)
            .finish()
            .expect_err("hostname must not escape the record root");

        assert!(matches!(err, ProtocolError::InvalidHostname { .. }));
    }

    #[test]
    fn test_handshake_accepts_dotted_hostname() {
        let settings = complete_handshake("cam.north-01")
            .finish()
            .expect("interior dots are ordinary name characters");

        assert_eq!(settings.hostname, "cam.north-01");
    }

    // ==================== Activation Tests ====================

    #[test]
    fn test_activate_new_run_lays_out_directory_and_announces() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (session, mut rx) = activate(&config, AlertDispatcher::new(), settings("cam-north", false));

        assert_eq!(session.hostname(), "cam-north");
        assert_eq!(session.run_mode(), RunMode::New);
        assert!(session.store().image_log_path().exists());
        assert!(session.store().summary_path().exists());
        assert!(session.store().heartbeat_path().exists());

        let event = rx.try_recv().expect("initialize event");
        assert!(event.is_initialize());
        assert_eq!(event.hostname(), "cam-north");
        match event {
            DashboardEvent::Initialize {
                filter_classes,
                image_log_path,
                ..
            } => {
                assert_eq!(filter_classes, vec!["lion", "cheetah"]);
                assert_eq!(image_log_path, session.store().image_log_path());
            }
            other => panic!("expected initialize, got {other:?}"),
        }
    }

    #[test]
    fn test_activate_writes_initial_heartbeat() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (session, _rx) = activate(&config, AlertDispatcher::new(), settings("cam-north", false));

        let heartbeat = Heartbeat::read(session.store().heartbeat_path()).unwrap();
        assert!((heartbeat.unix_seconds - 1_685_628_573.521).abs() < 1e-3);
    }

    #[test]
    fn test_activate_continue_without_prior_run_fails() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = HostSession::activate(
            &config,
            Arc::new(AlertDispatcher::new()),
            tx,
            settings("cam-north", true),
            fixed_now(),
        )
        .expect_err("no prior run to continue");

        assert!(err.to_string().contains("no prior run"));
    }

    #[test]
    fn test_activate_continue_recovers_prior_classes() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (first, _rx) = activate(&config, AlertDispatcher::new(), settings("cam-north", false));
        let first_dir = first.store().session_dir().to_path_buf();
        drop(first);

        // The reconnecting host declares different classes; the summary wins.
        let mut resumed = settings("cam-north", true);
        resumed.filter_classes = vec!["zebra".to_string()];
        let (second, mut rx) = activate(&config, AlertDispatcher::new(), resumed);

        assert_eq!(second.run_mode(), RunMode::Continue);
        assert_eq!(second.store().session_dir(), first_dir);
        assert_eq!(second.store().filter_classes(), ["lion", "cheetah"]);

        let event = rx.try_recv().expect("initialize event");
        match event {
            DashboardEvent::Initialize { filter_classes, .. } => {
                assert_eq!(filter_classes, vec!["lion", "cheetah"]);
            }
            other => panic!("expected initialize, got {other:?}"),
        }
    }

    // ==================== Image Tests ====================

    #[test]
    fn test_handle_image_stores_and_announces() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (mut session, mut rx) =
            activate(&config, AlertDispatcher::new(), settings("cam-north", false));
        let _initialize = rx.try_recv().expect("initialize event");

        let boxes = vec![lion_box(), DetectionBox::new("rock", 0.4, [0, 0, 5, 5])];
        let image_time = fixed_now() + Duration::seconds(5);
        session
            .handle_image(&boxes, b"jpeg bytes", image_time)
            .expect("image must store");

        let event = rx.try_recv().expect("image event");
        match event {
            DashboardEvent::Image {
                hostname,
                image_path,
                labels,
                timestamp,
            } => {
                assert_eq!(hostname, "cam-north");
                assert_eq!(labels, vec!["lion"]);
                assert_eq!(timestamp, image_time);
                assert!(image_path.exists());
                assert_eq!(std::fs::read(&image_path).unwrap(), b"jpeg bytes");
            }
            other => panic!("expected image event, got {other:?}"),
        }
    }

    #[test]
    fn test_handle_image_touches_heartbeat() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (mut session, _rx) =
            activate(&config, AlertDispatcher::new(), settings("cam-north", false));

        let image_time = fixed_now() + Duration::seconds(42);
        session
            .handle_image(&[lion_box()], b"jpeg bytes", image_time)
            .expect("image must store");

        let heartbeat = Heartbeat::read(session.store().heartbeat_path()).unwrap();
        assert!((heartbeat.unix_seconds - 1_685_628_615.521).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_handle_image_alerts_once_per_cooldown() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let channel = RecordingChannel::default();
        let sent = Arc::clone(&channel.sent);
        let dispatcher = AlertDispatcher::new().with_channel(Box::new(channel));
        let (mut session, _rx) = activate(&config, dispatcher, settings("cam-north", false));

        let start = fixed_now();
        for offset in [0, 30, 90] {
            session
                .handle_image(&[lion_box()], b"jpeg bytes", start + Duration::seconds(offset))
                .expect("image must store");
        }
        // Let the detached delivery tasks run.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        let notifications = sent.lock().expect("lock");
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].timestamp, start);
        assert_eq!(notifications[1].timestamp, start + Duration::seconds(90));
        assert_eq!(notifications[0].classes, vec!["lion"]);
    }

    #[tokio::test]
    async fn test_handle_image_ignores_non_alert_classes() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let channel = RecordingChannel::default();
        let sent = Arc::clone(&channel.sent);
        let dispatcher = AlertDispatcher::new().with_channel(Box::new(channel));
        let (mut session, _rx) = activate(&config, dispatcher, settings("cam-north", false));

        let boxes = vec![DetectionBox::new("cheetah", 0.9, [0, 0, 10, 10])];
        session
            .handle_image(&boxes, b"jpeg bytes", fixed_now())
            .expect("image must store");
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert!(sent.lock().expect("lock").is_empty());
    }

    // ==================== Heartbeat Tests ====================

    #[test]
    fn test_handle_heartbeat_uses_client_clock() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (mut session, mut rx) =
            activate(&config, AlertDispatcher::new(), settings("cam-north", false));
        let _initialize = rx.try_recv().expect("initialize event");

        session
            .handle_heartbeat(1_685_630_000.25)
            .expect("heartbeat must store");

        let event = rx.try_recv().expect("connection event");
        match event {
            DashboardEvent::Connection {
                hostname,
                timestamp,
            } => {
                assert_eq!(hostname, "cam-north");
                assert!((timestamp::unix_seconds(timestamp) - 1_685_630_000.25).abs() < 1e-3);
            }
            other => panic!("expected connection event, got {other:?}"),
        }

        let heartbeat = Heartbeat::read(session.store().heartbeat_path()).unwrap();
        assert!((heartbeat.unix_seconds - 1_685_630_000.25).abs() < 1e-3);
    }

    #[test]
    fn test_events_dropped_without_receiver() {
        let root = TempDir::new().unwrap();
        let config = test_config(&root);
        let (mut session, rx) =
            activate(&config, AlertDispatcher::new(), settings("cam-north", false));
        drop(rx);

        // Ingestion keeps going even with nobody listening.
        session
            .handle_image(&[lion_box()], b"jpeg bytes", fixed_now() + Duration::seconds(1))
            .expect("image must store");
        session
            .handle_heartbeat(1_685_630_000.0)
            .expect("heartbeat must store");
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_handshake_field_order_never_matters(
            hostname in "[a-z][a-z0-9-]{0,15}",
            continue_run in proptest::bool::ANY,
            classes in proptest::collection::vec("[a-z]{1,8}", 0..4),
            order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        ) {
            let mut handshake = Handshake::new();
            for field in order {
                match field {
                    0 => handshake
                        .absorb(HeaderTag::Hostname, &encode_payload(&hostname).unwrap())
                        .unwrap(),
                    1 => handshake
                        .absorb(HeaderTag::ContinueRun, &encode_payload(&continue_run).unwrap())
                        .unwrap(),
                    _ => handshake
                        .absorb(HeaderTag::Classes, &encode_payload(&classes).unwrap())
                        .unwrap(),
                }
            }

            let settings = handshake.finish().expect("all fields arrived");
            prop_assert_eq!(settings.hostname, hostname);
            prop_assert_eq!(settings.continue_run, continue_run);
            prop_assert_eq!(settings.filter_classes, classes);
        }
    }
}
