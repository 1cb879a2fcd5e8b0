//! Connection readiness state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use dhpcache_core::traits::logger::CacheLogger;

use crate::transport::ConnectionEvent;

/// Whether the replicated backend may use its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// No usable connection yet, or it was lost.
    #[default]
    NotReady,
    /// The connection is established.
    Ready,
}

impl Readiness {
    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer, multi-reader readiness flag driven by connection events.
///
/// Only [`ReadinessTracker::apply`] changes the state. Transitions:
///
/// | event                         | effect          |
/// |-------------------------------|-----------------|
/// | `Connected`                   | -> `Ready`      |
/// | `Reconnecting`/`Disconnected` | -> `NotReady`   |
/// | `ConnectFailed`               | unchanged, warn |
/// | `Error`                       | unchanged, error|
#[derive(Debug)]
pub struct ReadinessTracker {
    state: watch::Sender<Readiness>,
    endpoint: String,
    logger: Arc<dyn CacheLogger>,
}

impl ReadinessTracker {
    /// Create a tracker in the `NotReady` state.
    pub fn new(endpoint: impl Into<String>, logger: Arc<dyn CacheLogger>) -> Self {
        let (state, _) = watch::channel(Readiness::NotReady);
        Self {
            state,
            endpoint: endpoint.into(),
            logger,
        }
    }

    /// Current state.
    pub fn current(&self) -> Readiness {
        *self.state.borrow()
    }

    /// Whether the state is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.current() == Readiness::Ready
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.state.subscribe()
    }

    /// Wait until `Ready`, up to `timeout`. Returns whether it became ready.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == Readiness::Ready)).await,
            Ok(Ok(_))
        )
    }

    /// Apply a connection event, returning the resulting state.
    pub fn apply(&self, event: &ConnectionEvent) -> Readiness {
        match event {
            ConnectionEvent::Connected => {
                self.logger.info("Connected to remote cache");
                self.state.send_replace(Readiness::Ready);
            }
            ConnectionEvent::ConnectFailed { reason } => {
                self.logger
                    .warn(&format!("Could not connect to remote cache: {reason}"));
            }
            ConnectionEvent::Reconnecting { reason } => {
                self.logger.warn(&format!(
                    "Connection to remote cache lost ({reason}). Reconnecting..."
                ));
                self.state.send_replace(Readiness::NotReady);
            }
            ConnectionEvent::Disconnected { reason } => {
                self.logger
                    .warn(&format!("Connection to remote cache closed ({reason})"));
                self.state.send_replace(Readiness::NotReady);
            }
            ConnectionEvent::Error { reason } => {
                self.logger.error(&format!(
                    "Remote cache error at {}: {reason}",
                    self.endpoint
                ));
            }
        }
        self.current()
    }
}
