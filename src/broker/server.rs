//! Broker listener and lifecycle
//!
//! The broker moves through `Stopped -> Starting -> Running -> Stopping ->
//! Stopped`. `start` binds the listener and runs the accept loop until
//! `stop` is called; shutdown stops accepting, signals every connection
//! handler, and waits out a grace period before aborting stragglers. Queued
//! messages are never dropped by `stop`; they become unreachable only when
//! the process exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::broker::connection;
use crate::broker::router::Router;
use crate::config::Settings;
use crate::utils::error::{Error, Result};

/// Interval between pending-request expiry sweeps.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// The top-level broker: owns the router (and through it all queues),
/// accepts connections, and spawns one handler task per connection.
pub struct Broker {
    settings: Settings,
    router: Arc<Router>,
    state: watch::Sender<BrokerState>,
    shutdown: watch::Sender<bool>,
}

impl Broker {
    pub fn new(settings: Settings) -> Self {
        let router = Arc::new(Router::new(
            Duration::from_secs(settings.broker.request_ttl_secs),
            settings.broker.multicast_prefix.clone(),
        ));
        let (state, _) = watch::channel(BrokerState::Stopped);
        let (shutdown, _) = watch::channel(false);

        Self {
            settings,
            router,
            state,
            shutdown,
        }
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    pub fn state(&self) -> BrokerState {
        *self.state.borrow()
    }

    /// A receiver observing lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<BrokerState> {
        self.state.subscribe()
    }

    /// Asks a running broker to shut down. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Binds the listener and runs the accept loop until `stop` is called.
    /// Fails with a bind error if the address is in use or unavailable.
    pub async fn start(&self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.settings.server.host, self.settings.server.port
        );
        let _ = self.state.send(BrokerState::Starting);

        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let _ = self.state.send(BrokerState::Stopped);
                return Err(Error::Bind { addr, source });
            }
        };
        info!("listening on {addr}");
        let _ = self.state.send(BrokerState::Running);

        let expiry = tokio::spawn(Router::run_expiry_loop(
            self.router.clone(),
            EXPIRY_SWEEP_INTERVAL,
        ));

        let mut handlers = JoinSet::new();
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            // Reap finished handlers so the set tracks live
                            // connections only.
                            while handlers.try_join_next().is_some() {}

                            if handlers.len() >= self.settings.broker.max_connections {
                                warn!("refusing connection from {peer}: connection limit reached");
                                drop(stream);
                                continue;
                            }
                            debug!("accepted connection from {peer}");
                            handlers.spawn(connection::run(
                                stream,
                                self.router.clone(),
                                self.shutdown.subscribe(),
                            ));
                        }
                        Err(e) => warn!("accept failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = self.state.send(BrokerState::Stopping);
        drop(listener);
        expiry.abort();

        let grace = Duration::from_secs(self.settings.broker.shutdown_grace_secs);
        let drained = tokio::time::timeout(grace, async {
            while handlers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("shutdown grace period elapsed, aborting remaining connections");
            handlers.shutdown().await;
        }

        let _ = self.state.send(BrokerState::Stopped);
        info!("broker stopped");
        Ok(())
    }
}
