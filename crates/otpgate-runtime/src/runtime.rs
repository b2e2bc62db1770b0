//! Gateway orchestration.
//!
//! The [`Gateway`] wires the crates together: it resolves session
//! credentials, starts the connection driver and the HTTP surface, and
//! runs until a shutdown signal or a terminal logout.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};

use otpgate_core::{CredentialStore, Transport};
use otpgate_framework::{DispatchPolicy, Dispatcher, HandlerRegistry, HandlerSpec};
use otpgate_otp::{MemoryOtpStore, OtpEngine, OtpStore};

use crate::config::GatewayConfig;
use crate::connection::ConnectionManager;
use crate::error::RuntimeResult;
use crate::http::{self, AppState};
use crate::logging;
use crate::session::{FileCredentialStore, SessionResolver};

/// The assembled gateway.
///
/// # Example
///
/// ```rust,ignore
/// let config = ConfigLoader::new().load()?;
/// let gateway = Gateway::new(config, transport, default_handlers())?;
/// gateway.run().await?;
/// ```
pub struct Gateway {
    config: GatewayConfig,
    manager: Arc<ConnectionManager>,
    resolver: SessionResolver,
    engine: Arc<OtpEngine>,
}

impl Gateway {
    /// Builds a gateway from configuration, a transport and the handler
    /// registration list.
    ///
    /// Initializes logging as a side effect; registration fails on
    /// duplicate handler patterns.
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        handlers: Vec<HandlerSpec>,
    ) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let registry = Arc::new(HandlerRegistry::build(handlers)?);
        info!(handlers = registry.len(), "Handlers registered");

        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            DispatchPolicy {
                prefix: config.prefix.clone(),
                mode: config.mode,
                owner_numbers: config.owner_numbers.clone(),
                sudo_numbers: config.sudo_numbers.clone(),
            },
        ));

        let credential_store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config.session.dir));
        let resolver = SessionResolver::new(config.session.clone(), Arc::clone(&credential_store));

        let engine = Arc::new(OtpEngine::new(
            Arc::new(MemoryOtpStore::new()) as Arc<dyn OtpStore>,
            config.otp.to_policy(),
        ));

        let manager = Arc::new(ConnectionManager::new(
            transport,
            credential_store,
            dispatcher,
            config.clone(),
        ));

        Ok(Self {
            config,
            manager,
            resolver,
            engine,
        })
    }

    /// The OTP engine.
    pub fn engine(&self) -> &Arc<OtpEngine> {
        &self.engine
    }

    /// The connection manager.
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Runs the gateway until shutdown.
    ///
    /// Starts the HTTP surface, then resolves credentials and drives the
    /// connection loop. A resolution failure is fatal to transport bring-up
    /// only: the HTTP surface keeps serving and status queries report a
    /// disconnected gateway. Returns on Ctrl+C / SIGTERM, when the HTTP
    /// listener fails, or after a terminal logout ends the driver.
    pub async fn run(&self) -> RuntimeResult<()> {
        let state = Arc::new(AppState {
            engine: Arc::clone(&self.engine),
            link: self.manager.link(),
        });
        let http_task = tokio::spawn(http::serve(
            state,
            self.config.http.host.clone(),
            self.config.http.port,
        ));

        let credentials = match self.resolver.resolve(&self.config.session_id).await {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                error!(
                    error = %e,
                    "Session resolution failed, serving HTTP without a transport session"
                );
                None
            }
        };

        let manager = Arc::clone(&self.manager);
        let driver_task = tokio::spawn(async move {
            match credentials {
                Some(credentials) => manager.run(credentials).await,
                // No session to drive; the HTTP surface stays up so status
                // queries report the disconnected state.
                None => std::future::pending().await,
            }
        });

        info!("Gateway is running. Press Ctrl+C to stop.");

        tokio::select! {
            _ = wait_for_shutdown() => {}
            result = http_task => {
                match result {
                    Ok(Err(e)) => error!(error = %e, "HTTP surface failed"),
                    Err(e) => error!(error = %e, "HTTP task panicked"),
                    Ok(Ok(())) => {}
                }
            }
            result = driver_task => {
                if let Err(e) = result {
                    error!(error = %e, "Connection driver panicked");
                } else {
                    warn!("Connection driver ended, pair the device again");
                }
            }
        }

        if let Some(handle) = self.manager.current_handle() {
            handle.disconnect().await;
        }

        info!("Gateway stopped");
        Ok(())
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down");
    }
}
