//! The passthrough worker: take control immediately, forward every fetch.

use tracing::{debug, trace};

use crate::event::{ExtendableEvent, FetchEvent, ServiceWorkerHandler};
use crate::ServiceWorkerError;

/// Worker that activates as soon as it installs, claims every in-scope client
/// and sends each intercepted request straight to the network.
///
/// It keeps no state. Network failures reach the page untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughWorker;

impl PassthroughWorker {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceWorkerHandler for PassthroughWorker {
    fn on_install(&self, event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
        debug!(scope = %event.scope().scope_url(), "install: skip waiting");
        event.scope().skip_waiting();
        Ok(())
    }

    fn on_activate(&self, event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
        debug!(scope = %event.scope().scope_url(), "activate: claiming clients");
        let claim = event.scope().claim_clients();
        event.wait_until(claim);
        Ok(())
    }

    fn on_fetch(&self, event: &mut FetchEvent) -> Result<(), ServiceWorkerError> {
        trace!(url = %event.request().url, method = %event.request().method, "fetch: forwarding");
        // Forward directly to the network.
        let forwarded = event.scope().fetch(event.request().clone());
        event.respond_with(forwarded)
    }
}
