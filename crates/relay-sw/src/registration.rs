//! Registrations: one scope, up to three worker slots.

use url::Url;

use crate::worker::{ServiceWorker, ServiceWorkerId, ServiceWorkerState};
use crate::ServiceWorkerError;

/// Options for service worker registration.
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    /// Scope URL. Defaults to the directory of the script.
    pub scope: Option<String>,
}

impl RegistrationOptions {
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }
}

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<ServiceWorker>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<ServiceWorker>,

    /// Active worker.
    pub active: Option<ServiceWorker>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    /// Get the active worker.
    pub fn get_active(&self) -> Option<&ServiceWorker> {
        self.active.as_ref()
    }

    /// Whether no slot holds a worker.
    pub fn is_empty(&self) -> bool {
        self.installing.is_none() && self.waiting.is_none() && self.active.is_none()
    }

    /// Start installing a new worker. Returns the worker it displaced, if any.
    pub fn begin_install(&mut self, mut worker: ServiceWorker) -> Option<ServiceWorker> {
        worker.set_state(ServiceWorkerState::Installing);
        let displaced = self.installing.replace(worker);
        displaced.map(make_redundant)
    }

    /// Transition installing to waiting. Returns the waiting worker it displaced.
    pub fn install_complete(&mut self, id: ServiceWorkerId) -> Option<ServiceWorker> {
        match self.installing.take() {
            Some(mut worker) if worker.id == id => {
                worker.set_state(ServiceWorkerState::Installed);
                self.waiting.replace(worker).map(make_redundant)
            }
            other => {
                self.installing = other;
                None
            }
        }
    }

    /// Drop an installing worker whose install failed.
    pub fn install_failed(&mut self, id: ServiceWorkerId) -> Option<ServiceWorker> {
        if self.installing.as_ref().is_some_and(|w| w.id == id) {
            self.installing.take().map(make_redundant)
        } else {
            None
        }
    }

    /// Move the waiting worker into the active slot in `Activating` state.
    ///
    /// Returns the new active worker's id and the previous active worker,
    /// which is now redundant.
    pub fn begin_activate(
        &mut self,
    ) -> Result<(ServiceWorkerId, Option<ServiceWorker>), ServiceWorkerError> {
        let mut worker = self.waiting.take().ok_or_else(|| {
            ServiceWorkerError::StateError(format!("no waiting worker for {}", self.scope))
        })?;

        worker.set_state(ServiceWorkerState::Activating);
        let id = worker.id;
        let previous = self.active.replace(worker).map(make_redundant);
        Ok((id, previous))
    }

    /// Finish activation once the activate event has settled.
    pub fn activate_complete(&mut self, id: ServiceWorkerId) -> bool {
        match self.active.as_mut() {
            Some(worker) if worker.id == id && worker.state == ServiceWorkerState::Activating => {
                worker.set_state(ServiceWorkerState::Activated);
                true
            }
            _ => false,
        }
    }

    /// Unregister: every worker becomes redundant. Returns their ids.
    pub fn unregister(&mut self) -> Vec<ServiceWorkerId> {
        [
            self.installing.take(),
            self.waiting.take(),
            self.active.take(),
        ]
        .into_iter()
        .flatten()
        .map(|worker| make_redundant(worker).id)
        .collect()
    }
}

fn make_redundant(mut worker: ServiceWorker) -> ServiceWorker {
    worker.set_state(ServiceWorkerState::Redundant);
    worker
}

/// Derive the registration scope from the script URL and options.
///
/// Without an explicit scope the script's directory is used. The scope must
/// share the script's origin.
pub fn resolve_scope(script_url: &Url, scope: Option<&str>) -> Result<Url, ServiceWorkerError> {
    let scope = match scope {
        Some(s) => script_url
            .join(s)
            .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?,
        None => script_url
            .join("./")
            .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?,
    };

    if scope.origin() != script_url.origin() {
        return Err(ServiceWorkerError::SecurityError(format!(
            "scope {scope} is not on the origin of {script_url}"
        )));
    }

    Ok(scope)
}

/// Find the longest registered scope that is a prefix of `url`.
pub fn longest_matching_scope<'a, I>(scopes: I, url: &Url) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    scopes
        .into_iter()
        .filter(|scope| url.as_str().starts_with(scope))
        .max_by_key(|scope| scope.len())
}
