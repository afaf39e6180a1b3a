//! The global scope a worker sees: skip-wait, claim and network access.

use futures::future::BoxFuture;
use futures::FutureExt;
use relay_net::{Fetch, NetError, Request, Response};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use url::Url;

use crate::container::{HostState, ServiceWorkerEvent};
use crate::registration::longest_matching_scope;
use crate::worker::ServiceWorkerId;
use crate::ServiceWorkerError;

/// Host operations available to a running worker.
pub trait GlobalScope: Send + Sync {
    /// The registration scope this worker serves.
    fn scope_url(&self) -> &Url;

    /// Ask the host to activate this worker without waiting for old clients.
    fn skip_waiting(&self);

    /// Become the controller of every in-scope client.
    fn claim_clients(&self) -> BoxFuture<'static, Result<(), ServiceWorkerError>>;

    /// Issue one network request.
    fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response, NetError>>;
}

/// Host-side global scope of one worker.
pub struct WorkerGlobalScope {
    worker_id: ServiceWorkerId,
    scope: Url,
    skip_waiting: AtomicBool,
    fetcher: Arc<dyn Fetch>,
    host: Weak<HostState>,
}

impl WorkerGlobalScope {
    pub(crate) fn new(
        worker_id: ServiceWorkerId,
        scope: Url,
        fetcher: Arc<dyn Fetch>,
        host: Weak<HostState>,
    ) -> Self {
        Self {
            worker_id,
            scope,
            skip_waiting: AtomicBool::new(false),
            fetcher,
            host,
        }
    }

    /// Whether the worker asked to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }
}

impl GlobalScope for WorkerGlobalScope {
    fn scope_url(&self) -> &Url {
        &self.scope
    }

    fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Release);
    }

    fn claim_clients(&self) -> BoxFuture<'static, Result<(), ServiceWorkerError>> {
        let host = self.host.clone();
        let worker_id = self.worker_id;
        let scope = self.scope.to_string();

        async move {
            let Some(host) = host.upgrade() else {
                return Err(ServiceWorkerError::StateError(
                    "worker host is gone".to_string(),
                ));
            };

            // Clients belong to the registration with the longest matching scope.
            let scopes: Vec<String> = {
                let registrations = host.registrations.read().await;
                let controls = registrations
                    .get(&scope)
                    .and_then(|r| r.get_active())
                    .is_some_and(|w| w.id == worker_id && w.can_control());
                if !controls {
                    return Err(ServiceWorkerError::StateError(
                        "only the active worker can claim clients".to_string(),
                    ));
                }
                registrations.keys().cloned().collect()
            };

            let changed = host.clients.write().await.claim(worker_id, |url| {
                longest_matching_scope(scopes.iter().map(String::as_str), url)
                    == Some(scope.as_str())
            });

            debug!(scope = %scope, claimed = changed.len(), "Clients claimed");
            for client_id in changed {
                let _ = host.event_tx.send(ServiceWorkerEvent::ControllerChange {
                    client_id,
                    worker_id,
                });
            }
            Ok(())
        }
        .boxed()
    }

    fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response, NetError>> {
        let fetcher = Arc::clone(&self.fetcher);
        async move { fetcher.fetch(request).await }.boxed()
    }
}
