//! # Relay Service Worker
//!
//! A passthrough service worker and the minimal host that drives it.
//!
//! ## Features
//!
//! - **Passthrough worker**: skip-wait on install, claim on activate,
//!   forward every fetch unchanged
//! - **Lifecycle**: install, activate, fetch events with lifetime extension
//! - **Clients**: controlled pages and claim
//! - **Fetch routing**: navigation by scope, subresources by controller
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerContainer
//!     │
//!     ├── ServiceWorkerRegistration (per scope)
//!     │       ├── installing
//!     │       ├── waiting
//!     │       └── active
//!     │
//!     ├── Clients ── controller: ServiceWorkerId
//!     │
//!     └── RunningWorker
//!             ├── ServiceWorkerHandler (e.g. PassthroughWorker)
//!             └── WorkerGlobalScope ──► Fetch (network)
//! ```

use relay_common::RelayError;
use thiserror::Error;

pub mod client;
pub mod container;
pub mod event;
pub mod passthrough;
pub mod registration;
pub mod scope;
pub mod worker;

pub use client::{Client, Clients};
pub use container::{ServiceWorkerContainer, ServiceWorkerEvent};
pub use event::{ExtendableEvent, FetchEvent, LifecycleEventKind, ServiceWorkerHandler};
pub use passthrough::PassthroughWorker;
pub use registration::{RegistrationOptions, ServiceWorkerRegistration};
pub use scope::{GlobalScope, WorkerGlobalScope};
pub use worker::{ServiceWorker, ServiceWorkerId, ServiceWorkerState};

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerError {
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<ServiceWorkerError> for RelayError {
    fn from(err: ServiceWorkerError) -> Self {
        RelayError::lifecycle_with_source("service worker", err)
    }
}
