//! Service worker instances and their lifecycle state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use url::Url;

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceWorkerState {
    /// Initial state, script parsed.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced or install failed).
    Redundant,
}

/// A service worker instance.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    /// Unique ID.
    pub id: ServiceWorkerId,

    /// Script URL.
    pub script_url: Url,

    /// Current state.
    pub state: ServiceWorkerState,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl ServiceWorker {
    /// Create a new service worker.
    pub fn new(script_url: Url) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            script_url,
            state: ServiceWorkerState::Parsed,
            state_changed_at: Instant::now(),
        }
    }

    /// Set state.
    pub fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }

    /// Activating or activated; the states in which a worker may claim clients.
    pub fn can_control(&self) -> bool {
        matches!(
            self.state,
            ServiceWorkerState::Activating | ServiceWorkerState::Activated
        )
    }

    /// Check if redundant.
    pub fn is_redundant(&self) -> bool {
        self.state == ServiceWorkerState::Redundant
    }
}
