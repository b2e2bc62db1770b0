//! Connection lifecycle management.
//!
//! A single driver task owns the transport session: it connects, pumps the
//! inbound event stream, and classifies every close. Recoverable closes
//! schedule a reconnect after a fixed delay, forever; a terminal logout
//! deletes the credential document and ends the driver without another
//! attempt. Because the driver is the only place that connects, the
//! reconnect path is single-flight by construction.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use otpgate_core::{
    CanonicalMessage, ConnectionState, CredentialStore, Credentials, MessageKey, NormalizeOutcome,
    OutboundPayload, RawMessage, SendOptions, Transport, TransportEvent, TransportHandle,
    TransportSession, jid, normalize,
};
use otpgate_framework::Dispatcher;

use crate::config::GatewayConfig;

/// Published connectivity state of the messaging link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Whether a session is currently open.
    pub connected: bool,
    /// When the current session opened.
    pub since: Option<SystemTime>,
    /// Bare number of the connected account.
    pub identity: Option<String>,
}

/// Read-only view of the link: the latest status plus the live send handle.
///
/// Cheap to clone; handed to the HTTP surface so it never touches the
/// manager itself.
#[derive(Clone)]
pub struct Link {
    status: watch::Receiver<LinkStatus>,
    handle: Arc<RwLock<Option<Arc<dyn TransportHandle>>>>,
}

impl Link {
    /// Snapshot of the current status.
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    /// The live send handle, while a session is open.
    pub fn handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.handle.read().clone()
    }

    /// A standalone link with a fixed status and handle.
    pub fn fixed(status: LinkStatus, handle: Option<Arc<dyn TransportHandle>>) -> Self {
        let (tx, rx) = watch::channel(status);
        // The receiver keeps serving the last value after the sender drops.
        drop(tx);
        Self {
            status: rx,
            handle: Arc::new(RwLock::new(handle)),
        }
    }
}

/// How a pumped session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Recoverable close; reconnect after the configured delay.
    Retry,
    /// Logged out; credentials are invalid and must not be reused.
    Terminal,
}

/// Drives the transport session and routes its events.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    credential_store: Arc<dyn CredentialStore>,
    dispatcher: Arc<Dispatcher>,
    config: GatewayConfig,
    status_tx: watch::Sender<LinkStatus>,
    status_rx: watch::Receiver<LinkStatus>,
    handle_slot: Arc<RwLock<Option<Arc<dyn TransportHandle>>>>,
    latest_credentials: Mutex<Option<Credentials>>,
}

impl ConnectionManager {
    /// Creates a manager over a transport and dispatcher.
    pub fn new(
        transport: Arc<dyn Transport>,
        credential_store: Arc<dyn CredentialStore>,
        dispatcher: Arc<Dispatcher>,
        config: GatewayConfig,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        Self {
            transport,
            credential_store,
            dispatcher,
            config,
            status_tx,
            status_rx,
            handle_slot: Arc::new(RwLock::new(None)),
            latest_credentials: Mutex::new(None),
        }
    }

    /// Subscribes to connectivity changes.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    /// A cloneable read-only view of the link.
    pub fn link(&self) -> Link {
        Link {
            status: self.status_rx.clone(),
            handle: Arc::clone(&self.handle_slot),
        }
    }

    /// The live send handle, while a session is open.
    pub fn current_handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.handle_slot.read().clone()
    }

    /// Runs the connection loop until a terminal logout.
    ///
    /// Recoverable failures (connect errors and non-terminal closes) retry
    /// forever with a fixed delay between attempts.
    pub async fn run(self: Arc<Self>, credentials: Credentials) {
        *self.latest_credentials.lock() = Some(credentials);

        loop {
            let credentials = match self.latest_credentials.lock().clone() {
                Some(c) => c,
                None => {
                    error!("No credentials available, stopping connection loop");
                    return;
                }
            };

            info!("Connecting to messaging transport");
            let session = match self.transport.connect(credentials).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, delay_secs = self.config.reconnect_delay_secs,
                        "Connect failed, retrying");
                    tokio::time::sleep(self.config.reconnect_delay()).await;
                    continue;
                }
            };

            let end = self.pump(session).await;
            *self.handle_slot.write() = None;
            self.status_tx.send_replace(LinkStatus::default());

            match end {
                SessionEnd::Terminal => {
                    warn!("Logged out by the network, deleting credentials");
                    if let Err(e) = self.credential_store.delete().await {
                        error!(error = %e, "Failed to delete credential document");
                    }
                    info!("Session cleared, pair the device again and restart");
                    return;
                }
                SessionEnd::Retry => {
                    info!(
                        delay_secs = self.config.reconnect_delay_secs,
                        "Connection closed, reconnecting"
                    );
                    tokio::time::sleep(self.config.reconnect_delay()).await;
                }
            }
        }
    }

    /// Pumps one session's event stream to completion.
    async fn pump(&self, mut session: TransportSession) -> SessionEnd {
        let handle = Arc::clone(&session.handle);
        *self.handle_slot.write() = Some(Arc::clone(&handle));

        while let Some(event) = session.events.recv().await {
            match event {
                TransportEvent::ConnectionUpdate(update) => {
                    if let Some(qr) = &update.qr {
                        info!(code = %qr, "Pair by scanning the login code");
                    }
                    match update.state {
                        ConnectionState::Connecting => debug!("Transport connecting"),
                        ConnectionState::Open => self.on_open(&handle).await,
                        ConnectionState::Close => {
                            let terminal = update
                                .close_reason
                                .as_ref()
                                .is_some_and(|r| r.is_terminal());
                            warn!(reason = ?update.close_reason, terminal, "Connection closed");
                            return if terminal {
                                SessionEnd::Terminal
                            } else {
                                SessionEnd::Retry
                            };
                        }
                    }
                }
                TransportEvent::CredentialsUpdate(credentials) => {
                    if let Err(e) = self.credential_store.persist(&credentials).await {
                        error!(error = %e, "Failed to persist rotated credentials");
                    }
                    *self.latest_credentials.lock() = Some(credentials);
                }
                TransportEvent::Message(raw) => {
                    self.on_message(*raw, &handle);
                }
            }
        }

        // Stream ended without an explicit close event.
        debug!("Event stream ended");
        SessionEnd::Retry
    }

    async fn on_open(&self, handle: &Arc<dyn TransportHandle>) {
        let identity = handle.identity();
        let number = jid::bare_number(&identity).to_string();
        info!(account = %number, "Messaging link connected");

        self.status_tx.send_replace(LinkStatus {
            connected: true,
            since: Some(SystemTime::now()),
            identity: Some(number),
        });

        self.notify_operator(handle).await;
    }

    /// Sends the startup notice to the gateway's own conversation.
    async fn notify_operator(&self, handle: &Arc<dyn TransportHandle>) {
        let policy = self.dispatcher.policy();
        let text = format!(
            "✅ OTP GATEWAY CONNECTED SUCCESSFULLY\n\nPrefix: {}\nMode: {:?}\nStatus Read: {}",
            policy.prefix, policy.mode, self.config.auto_view_status
        );
        let own_jid = jid::normalize_identity(&handle.identity());
        if let Err(e) = handle
            .send(&own_jid, OutboundPayload::text(text), SendOptions::default())
            .await
        {
            warn!(error = %e, "Failed to send startup notice");
        }
    }

    /// Normalizes one raw message and routes the outcome.
    fn on_message(&self, raw: RawMessage, handle: &Arc<dyn TransportHandle>) {
        let outcome = normalize(&raw, &handle.identity(), self.config.auto_view_status);
        match outcome {
            NormalizeOutcome::Message(message) => self.spawn_dispatch(message, handle),
            NormalizeOutcome::StatusSideEffect(key) => self.spawn_status_view(key, handle),
            NormalizeOutcome::Skip => {}
        }
    }

    fn spawn_dispatch(&self, message: CanonicalMessage, handle: &Arc<dyn TransportHandle>) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = Arc::clone(handle);
        tokio::spawn(async move {
            let summary = dispatcher.dispatch(message, handle).await;
            debug!(?summary, "Message dispatched");
        });
    }

    /// Marks a status post read and reacts to it.
    fn spawn_status_view(&self, key: MessageKey, handle: &Arc<dyn TransportHandle>) {
        let handle = Arc::clone(handle);
        let emoji = self.config.status_react_emoji.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.read_messages(std::slice::from_ref(&key)).await {
                debug!(error = %e, "Failed to mark status read");
                return;
            }

            let own_jid = jid::normalize_identity(&handle.identity());
            let mut recipients = Vec::new();
            if let Some(participant) = &key.participant {
                recipients.push(participant.clone());
            }
            recipients.push(own_jid);

            let options = SendOptions {
                status_jid_list: recipients,
                ..Default::default()
            };
            let payload = OutboundPayload::Reaction {
                emoji,
                key: key.clone(),
            };
            if let Err(e) = handle.send(jid::STATUS_BROADCAST, payload, options).await {
                debug!(error = %e, "Failed to react to status");
            }
        });
    }
}
