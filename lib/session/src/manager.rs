//! The session manager.
//!
//! Owns the single transport connection and drives the status machine:
//!
//! ```text
//! Disconnected --initialize--> Connecting --Challenge--> AwaitingScan
//!                                   |                        |
//!                                   +---------Open-----------+--> Connected
//! any --Closed--> Disconnected --(supervisor)--> initialize again
//! ```
//!
//! Each connection's events are consumed by their own task. A close is
//! handed to a supervisor task, which decides between a plain reconnect and
//! discarding the session credentials:
//!
//! - `LoggedOut` always discards them and does not count as an attempt.
//! - Any other close counts. Reaching `max_reconnect_attempts` discards the
//!   credentials and starts counting again.
//! - `Open` resets the count.
//!
//! With the credentials gone, the next connect starts from fresh
//! credentials and the transport issues a new challenge.

use crate::config::ReconnectConfig;
use crate::dispatch::{ChallengeRenderer, Dispatcher, LogChallengeRenderer};
use crate::error::SessionError;
use crate::handle::SessionHandle;
use crate::transport::{
    CloseReason, Connection, ConnectionUpdate, InboundMessage, Link, Transport, TransportEvent,
};
use async_trait::async_trait;
use rootcause::Report;
use satu_core::{ConnectionId, ConnectionStatus, Payload};
use satu_credential_store::{AuthState, CredentialStore};
use satu_delivery::{
    DeliveryConfig, DeliveryQueue, MessageSender, MetricsCollector, SendError, SessionMetrics,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Everything a [`SessionManager`] is built from.
pub struct SessionParts {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn CredentialStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub renderer: Arc<dyn ChallengeRenderer>,
    pub delivery: DeliveryConfig,
    pub reconnect: ReconnectConfig,
}

impl SessionParts {
    /// Parts with the log renderer and default limits.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            transport,
            store,
            dispatcher,
            renderer: Arc::new(LogChallengeRenderer),
            delivery: DeliveryConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Messages for the supervisor task.
#[derive(Debug)]
enum Control {
    /// A connection closed.
    Closed {
        connection: ConnectionId,
        reason: CloseReason,
    },
    /// A connect attempt failed before producing a connection.
    ConnectFailed { reason: String },
}

/// The connection currently in use.
struct ActiveLink {
    id: ConnectionId,
    /// `None` once the connection has reported itself closed.
    link: Option<Arc<dyn Link>>,
}

/// Routes queue sends to whichever link is current.
#[derive(Default)]
struct LinkSlot {
    active: Mutex<Option<ActiveLink>>,
}

impl LinkSlot {
    fn install(&self, id: ConnectionId, link: Arc<dyn Link>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveLink {
            id,
            link: Some(link),
        });
    }

    fn take(&self) -> Option<ActiveLink> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| active.id == id)
    }

    /// Stops routing sends to connection `id`.
    fn detach(&self, id: ConnectionId) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_mut().filter(|current| current.id == id) {
            current.link = None;
        }
    }

    fn link(&self) -> Option<Arc<dyn Link>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|active| active.link.clone())
    }
}

#[async_trait]
impl MessageSender for LinkSlot {
    async fn send(&self, destination: &str, payload: &Payload) -> Result<(), SendError> {
        let link = self.link().ok_or(SendError::NotConnected)?;
        link.send(destination, payload).await
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    dispatcher: Arc<dyn Dispatcher>,
    renderer: Arc<dyn ChallengeRenderer>,
    reconnect: ReconnectConfig,
    queue: DeliveryQueue,
    metrics: Arc<MetricsCollector>,
    links: Arc<LinkSlot>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Held while connecting; keeps the outcome of the last attempt.
    init_lock: tokio::sync::Mutex<Option<Result<(), SessionError>>>,
    reconnect_attempts: AtomicU32,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: Mutex<Option<mpsc::UnboundedReceiver<Control>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

/// Keeps one transport connection alive.
///
/// Cloning shares the manager.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Builds a manager. Nothing connects until [`Self::start`].
    #[must_use]
    pub fn new(parts: SessionParts) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let links = Arc::new(LinkSlot::default());
        let queue = DeliveryQueue::new(parts.delivery, links.clone(), Arc::clone(&metrics));
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                transport: parts.transport,
                store: parts.store,
                dispatcher: parts.dispatcher,
                renderer: parts.renderer,
                reconnect: parts.reconnect,
                queue,
                metrics,
                links,
                status_tx,
                init_lock: tokio::sync::Mutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                control_tx,
                control_rx: Mutex::new(Some(control_rx)),
                supervisor: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Starts the supervisor and opens the first connection.
    ///
    /// A failed connect is retried in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored credentials cannot be read.
    pub async fn start(&self) -> Result<(), Report<SessionError>> {
        self.shared.ensure_supervisor();
        match self.shared.open().await {
            Ok(()) => Ok(()),
            Err(SessionError::Transport { reason }) => {
                warn!(%reason, "initial connect failed, retrying in background");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a new connection, replacing the current one.
    ///
    /// If another call is already connecting, waits for it instead of
    /// starting a second attempt and returns its outcome. A transport
    /// failure is also retried in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be loaded or the transport
    /// fails to connect.
    pub async fn initialize(&self) -> Result<(), Report<SessionError>> {
        self.shared.ensure_supervisor();
        self.shared.open().await?;
        Ok(())
    }

    /// Reconnects if, and only if, the session is disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconnect fails.
    pub async fn reconnect(&self) -> Result<(), Report<SessionError>> {
        if self.status() != ConnectionStatus::Disconnected {
            debug!(status = %self.status(), "reconnect ignored, session is not disconnected");
            return Ok(());
        }
        self.initialize().await
    }

    /// Stops the session: closes the queue, the connection and the
    /// supervisor. Messages still waiting fail with `Closed`.
    pub async fn shutdown(&self) {
        self.shared.shut_down.store(true, Ordering::SeqCst);
        self.shared.queue.close();

        let supervisor = self
            .shared
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = supervisor {
            task.abort();
        }

        // Wait out a connect in progress so its link is closed too.
        let _guard = self.shared.init_lock.lock().await;
        if let Some(active) = self.shared.links.take() {
            if let Some(link) = active.link {
                link.close().await;
            }
        }
        self.shared.set_status(ConnectionStatus::Disconnected);
        info!("session shut down");
    }

    /// A handle for sending and observing the session.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.shared.handle()
    }

    /// The current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status_tx.borrow()
    }

    /// Subscribes to status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// A snapshot of the session metrics.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        self.shared.metrics.snapshot()
    }

    /// Recoverable closes since the last successful open or rotation.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }
}

impl Shared {
    fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.queue.clone(),
            self.status_tx.subscribe(),
            Arc::clone(&self.metrics),
        )
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status_tx.send_replace(status);
        self.metrics.set_status(status);
        if previous != status {
            info!(from = %previous, to = %status, "connection status changed");
        }
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Starts the supervisor unless it already runs or has run.
    fn ensure_supervisor(self: &Arc<Self>) {
        if self.is_shut_down() {
            return;
        }
        let control_rx = self
            .control_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(control_rx) = control_rx else {
            return;
        };

        let shared = Arc::clone(self);
        let task = tokio::spawn(async move { shared.supervise(control_rx).await });
        *self.supervisor.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Single-flight connect.
    ///
    /// Callers arriving while an attempt runs wait for it and get its
    /// outcome. A transport failure is handed to the supervisor for retry.
    #[instrument(skip(self))]
    async fn open(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut outcome = match self.init_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("connect already in progress, waiting for it");
                let joined = self.init_lock.lock().await;
                return joined.clone().unwrap_or(Ok(()));
            }
        };

        if self.is_shut_down() {
            *outcome = Some(Err(SessionError::ShutDown));
            return Err(SessionError::ShutDown);
        }

        let result = self.connect().await;
        if let Err(SessionError::Transport { reason }) = &result {
            self.metrics.record_error(reason.clone());
            // Nothing listens once the supervisor has stopped.
            let _ = self.control_tx.send(Control::ConnectFailed {
                reason: reason.clone(),
            });
        }
        *outcome = Some(result.clone());
        result
    }

    async fn connect(self: &Arc<Self>) -> Result<(), SessionError> {
        if let Some(previous) = self.links.take() {
            debug!(connection = %previous.id, "closing previous connection");
            if let Some(link) = previous.link {
                link.close().await;
            }
        }

        self.set_status(ConnectionStatus::Connecting);

        let transport = Arc::clone(&self.transport);
        let auth = match AuthState::load(Arc::clone(&self.store), move || {
            transport.initial_credentials()
        })
        .await
        {
            Ok(auth) => auth,
            Err(e) => {
                self.set_status(ConnectionStatus::Disconnected);
                return Err(SessionError::CredentialStorage {
                    reason: e.to_string(),
                });
            }
        };

        let Connection { link, events } = match self.transport.connect(auth).await {
            Ok(connection) => connection,
            Err(e) => {
                self.set_status(ConnectionStatus::Disconnected);
                return Err(SessionError::Transport {
                    reason: e.to_string(),
                });
            }
        };

        let id = ConnectionId::new();
        self.links.install(id, link);
        info!(connection = %id, "transport connection opened");

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.consume_events(id, events).await });
        Ok(())
    }

    async fn consume_events(
        self: Arc<Self>,
        id: ConnectionId,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if !self.links.is_current(id) {
                debug!(connection = %id, "connection superseded, dropping its events");
                return;
            }

            match event {
                TransportEvent::Connection(ConnectionUpdate::Closed(reason)) => {
                    self.on_closed(id, reason);
                    return;
                }
                TransportEvent::Connection(update) => self.on_update(update),
                TransportEvent::Message(message) => self.on_message(message),
                TransportEvent::CredentialsUpdated(credentials) => {
                    self.on_credentials(credentials).await;
                }
            }
        }

        if self.links.is_current(id) {
            self.on_closed(
                id,
                CloseReason::Other {
                    code: None,
                    message: "event stream ended".to_string(),
                },
            );
        }
    }

    fn on_update(&self, update: ConnectionUpdate) {
        match update {
            ConnectionUpdate::Connecting => self.set_status(ConnectionStatus::Connecting),
            ConnectionUpdate::Challenge(code) => {
                self.set_status(ConnectionStatus::AwaitingScan);
                self.renderer.render(&code);
            }
            ConnectionUpdate::Open => {
                self.reconnect_attempts.store(0, Ordering::SeqCst);
                self.set_status(ConnectionStatus::Connected);
            }
            ConnectionUpdate::Closed(_) => {}
        }
    }

    fn on_closed(&self, id: ConnectionId, reason: CloseReason) {
        self.links.detach(id);
        self.set_status(ConnectionStatus::Disconnected);
        warn!(connection = %id, %reason, "connection closed");

        // Nothing listens once the supervisor has stopped.
        let _ = self.control_tx.send(Control::Closed {
            connection: id,
            reason,
        });
    }

    fn on_message(&self, message: InboundMessage) {
        if message.from_me || !message.live {
            trace!(id = %message.id, "ignoring own or historical message");
            return;
        }

        self.metrics.record_received();
        debug!(id = %message.id, chat = %message.chat, "message received");

        let dispatcher = Arc::clone(&self.dispatcher);
        let session = self.handle();
        tokio::spawn(async move { dispatcher.dispatch(session, message).await });
    }

    async fn on_credentials(&self, credentials: Payload) {
        match AuthState::save_credentials(self.store.as_ref(), &credentials).await {
            Ok(()) => debug!("session credentials saved"),
            Err(e) => {
                error!(error = %e, "failed to save session credentials");
                self.metrics
                    .record_error(format!("failed to save session credentials: {e}"));
            }
        }
    }

    async fn supervise(self: Arc<Self>, mut control_rx: mpsc::UnboundedReceiver<Control>) {
        while let Some(control) = control_rx.recv().await {
            let reason = match control {
                Control::Closed { connection, reason } => {
                    if !self.links.is_current(connection) {
                        debug!(%connection, "ignoring close of superseded connection");
                        continue;
                    }
                    reason
                }
                Control::ConnectFailed { reason } => {
                    tokio::time::sleep(self.reconnect.reconnect_delay()).await;
                    if *self.status_tx.borrow() != ConnectionStatus::Disconnected {
                        debug!("connected again meanwhile, skipping retry");
                        continue;
                    }
                    CloseReason::Other {
                        code: None,
                        message: reason,
                    }
                }
            };

            if let Err(e) = self.recover(reason).await {
                error!(error = %e, "session cannot recover, supervisor stopping");
                self.metrics.record_error(e.to_string());
                self.set_status(ConnectionStatus::Disconnected);
                return;
            }
        }
    }

    /// Applies the close policy and reconnects.
    ///
    /// A failed connect comes back as its own `ConnectFailed` message.
    async fn recover(self: &Arc<Self>, reason: CloseReason) -> Result<(), SessionError> {
        if self.is_shut_down() {
            return Ok(());
        }

        self.apply_close_policy(&reason).await?;

        match self.open().await {
            Ok(()) | Err(SessionError::ShutDown) => Ok(()),
            Err(SessionError::Transport { reason: failure }) => {
                warn!(
                    error = %failure,
                    delay_ms = self.reconnect.reconnect_delay_ms,
                    "reconnect failed, retrying"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_close_policy(&self, reason: &CloseReason) -> Result<(), SessionError> {
        let max = self.reconnect.max_reconnect_attempts;

        match reason {
            CloseReason::LoggedOut => {
                warn!("logged out, discarding session credentials");
                self.discard_credentials().await?;
            }
            CloseReason::Other { .. } => {
                let attempt = self.reconnect_attempts.load(Ordering::SeqCst) + 1;
                if attempt >= max {
                    warn!(
                        attempt,
                        max, "reconnect limit reached, rotating session credentials"
                    );
                    self.discard_credentials().await?;
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                } else {
                    self.reconnect_attempts.store(attempt, Ordering::SeqCst);
                    info!(attempt, max, %reason, "reconnecting");
                }
            }
        }
        Ok(())
    }

    async fn discard_credentials(&self) -> Result<(), SessionError> {
        AuthState::clear_session(self.store.as_ref())
            .await
            .map_err(|e| SessionError::CredentialStorage {
                reason: e.to_string(),
            })
    }
}
