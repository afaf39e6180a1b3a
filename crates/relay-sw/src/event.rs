//! Lifecycle events dispatched to a worker, and the handler trait that receives them.

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use relay_net::{NetError, Request, Response};
use std::future::Future;
use std::sync::Arc;

use crate::scope::GlobalScope;
use crate::ServiceWorkerError;

/// Lifetime-extension future registered through `wait_until`.
pub type Extension = BoxFuture<'static, Result<(), ServiceWorkerError>>;

/// Response future registered through `respond_with`.
pub type ResponseFuture = BoxFuture<'static, Result<Response, NetError>>;

/// The lifecycle phase an [`ExtendableEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventKind {
    Install,
    Activate,
}

/// Callbacks a worker script registers with its host.
///
/// An `Err` is an uncaught exception in the handler. For install it fails the
/// install; for activate it is logged; for fetch it is ignored once
/// `respond_with` was called and otherwise sends the request to the network.
pub trait ServiceWorkerHandler: Send + Sync {
    fn on_install(&self, _event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
        Ok(())
    }

    fn on_activate(&self, _event: &mut ExtendableEvent) -> Result<(), ServiceWorkerError> {
        Ok(())
    }

    fn on_fetch(&self, _event: &mut FetchEvent) -> Result<(), ServiceWorkerError> {
        Ok(())
    }
}

/// Install or activate event.
///
/// The host does not finish the phase until every future passed to
/// [`ExtendableEvent::wait_until`] has settled.
pub struct ExtendableEvent {
    kind: LifecycleEventKind,
    scope: Arc<dyn GlobalScope>,
    extensions: Vec<Extension>,
}

impl ExtendableEvent {
    pub fn new(kind: LifecycleEventKind, scope: Arc<dyn GlobalScope>) -> Self {
        Self {
            kind,
            scope,
            extensions: Vec::new(),
        }
    }

    pub fn kind(&self) -> LifecycleEventKind {
        self.kind
    }

    /// The worker's global scope.
    pub fn scope(&self) -> &dyn GlobalScope {
        self.scope.as_ref()
    }

    /// Extend the event's lifetime until `work` settles.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<(), ServiceWorkerError>> + Send + 'static,
    {
        self.extensions.push(work.boxed());
    }

    /// Number of registered extensions.
    pub fn pending(&self) -> usize {
        self.extensions.len()
    }

    /// Wait for every extension to settle, in registration order.
    pub async fn settle(self) -> Vec<Result<(), ServiceWorkerError>> {
        future::join_all(self.extensions).await
    }
}

/// Fetch event for one request from a controlled client.
pub struct FetchEvent {
    request: Request,
    client_id: Option<String>,
    is_navigation: bool,
    scope: Arc<dyn GlobalScope>,
    response: Option<ResponseFuture>,
}

impl FetchEvent {
    pub fn new(
        request: Request,
        client_id: Option<String>,
        is_navigation: bool,
        scope: Arc<dyn GlobalScope>,
    ) -> Self {
        Self {
            request,
            client_id,
            is_navigation,
            scope,
            response: None,
        }
    }

    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn is_navigation(&self) -> bool {
        self.is_navigation
    }

    /// The worker's global scope.
    pub fn scope(&self) -> &dyn GlobalScope {
        self.scope.as_ref()
    }

    /// Supply the response for this request. May be called once.
    pub fn respond_with<F>(&mut self, response: F) -> Result<(), ServiceWorkerError>
    where
        F: Future<Output = Result<Response, NetError>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(ServiceWorkerError::StateError(
                "respond_with called twice".to_string(),
            ));
        }
        self.response = Some(response.boxed());
        Ok(())
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Split into the request and the response future, if one was supplied.
    pub fn into_parts(self) -> (Request, Option<ResponseFuture>) {
        (self.request, self.response)
    }
}
