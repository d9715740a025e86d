//! # Request Bus
//!
//! Single-dispatch call/response between extensions.
//!
//! Where the [`NotificationBus`] fans one event out to many observers, the
//! request bus routes one request to exactly one responder and hands the
//! responder's result back to the caller. Requests may be scoped to a
//! domain object (typically a document) so unrelated instances do not
//! answer each other's requests.
//!
//! ## Key Components
//!
//! - [`RequestBus`] - Responder table and dispatch
//! - [`ResponderChange`] - Payload of the responder added/removed notifications
//!
//! Responders and domains are held weakly. A responder that has been dropped
//! answers nothing; its slot is reclaimed on the next send so the request
//! can be registered again.

use crate::error::EventError;
use crate::notifications::NotificationBus;
use crate::types::{describe_scope, ObjectKey, ObjectRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::sync::Arc;
use tracing::{debug, warn};

/// Posted after a responder is registered.
pub const RESPONDER_ADDED: &str = "requests:responder_added";
/// Posted after a responder is unregistered or reclaimed.
pub const RESPONDER_REMOVED: &str = "requests:responder_removed";

/// Payload of [`RESPONDER_ADDED`] and [`RESPONDER_REMOVED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderChange {
    /// Request name whose responder changed.
    pub request: String,
}

type ResponderCallback = Arc<
    dyn Fn(&(dyn Any + Send + Sync), Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, EventError>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    request: String,
    domain: Option<ObjectKey>,
}

impl RequestKey {
    fn new(request: &str, domain: Option<&ObjectRef>) -> Self {
        Self {
            request: request.to_string(),
            domain: domain.map(ObjectRef::key),
        }
    }
}

#[derive(Clone)]
struct Responder {
    responder: ObjectRef,
    domain: Option<ObjectRef>,
    callback: ResponderCallback,
}

impl Responder {
    fn is_alive(&self) -> bool {
        self.responder.is_alive() && self.domain.as_ref().map_or(true, ObjectRef::is_alive)
    }

    fn upgrade_if_alive(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        if self.domain.as_ref().is_some_and(|domain| !domain.is_alive()) {
            return None;
        }
        self.responder.upgrade()
    }
}

/// Routes named requests to at most one responder per (request, domain).
///
/// # Examples
///
/// ```rust
/// use foundry_event_system::*;
/// use std::sync::Arc;
///
/// struct Cafe;
///
/// let requests = RequestBus::new();
/// let cafe = Arc::new(Cafe);
/// requests
///     .register(&cafe, "sandwich.make", None, |_: &Cafe, cheese: bool| {
///         if cheese { "cheese sandwich" } else { "plain sandwich" }
///     })
///     .unwrap();
///
/// let sandwich: Option<&str> = requests.send("sandwich.make", None, true);
/// assert_eq!(sandwich, Some("cheese sandwich"));
/// ```
pub struct RequestBus {
    responders: DashMap<RequestKey, Responder>,
    notifications: Option<Arc<NotificationBus>>,
}

impl std::fmt::Debug for RequestBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBus")
            .field("responders", &self.responders.len())
            .field("announces_changes", &self.notifications.is_some())
            .finish()
    }
}

impl RequestBus {
    /// Creates a request bus that does not announce responder changes.
    pub fn new() -> Self {
        Self {
            responders: DashMap::new(),
            notifications: None,
        }
    }

    /// Creates a request bus that posts [`RESPONDER_ADDED`] and
    /// [`RESPONDER_REMOVED`] on `notifications`.
    pub fn with_notifications(notifications: Arc<NotificationBus>) -> Self {
        Self {
            responders: DashMap::new(),
            notifications: Some(notifications),
        }
    }

    /// Registers `method` on `responder` as the answer to `request`.
    ///
    /// Fails with [`EventError::DuplicateResponder`] if a live responder is
    /// already registered for the same request and domain. A dead
    /// registration under that key is replaced.
    pub fn register<O, A, R, F>(
        &self,
        responder: &Arc<O>,
        request: &str,
        domain: Option<&ObjectRef>,
        method: F,
    ) -> Result<(), EventError>
    where
        O: Any + Send + Sync,
        A: Any + Send,
        R: Any + Send,
        F: Fn(&O, A) -> R + Send + Sync + 'static,
    {
        let request_name = request.to_string();
        let callback: ResponderCallback = Arc::new(
            move |target: &(dyn Any + Send + Sync), args: Box<dyn Any + Send>| {
                let target = target.downcast_ref::<O>().ok_or_else(|| EventError::TypeMismatch {
                    request: request_name.clone(),
                    expected: type_name::<O>(),
                })?;
                let args = args.downcast::<A>().map_err(|_| EventError::TypeMismatch {
                    request: request_name.clone(),
                    expected: type_name::<A>(),
                })?;
                let result: Box<dyn Any + Send> = Box::new(method(target, *args));
                Ok(result)
            },
        );
        let entry = Responder {
            responder: ObjectRef::new(responder),
            domain: domain.cloned(),
            callback,
        };

        match self.responders.entry(RequestKey::new(request, domain)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_alive() {
                    return Err(EventError::DuplicateResponder {
                        request: request.to_string(),
                        domain: describe_scope(domain),
                    });
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        debug!(
            "📝 Registered {} for request '{}' ({})",
            type_name::<O>(),
            request,
            describe_scope(domain)
        );
        self.announce(RESPONDER_ADDED, request);
        Ok(())
    }

    /// Removes the responder for `(request, domain)`.
    ///
    /// Fails with [`EventError::ResponderNotFound`] if nothing is registered.
    pub fn unregister(&self, request: &str, domain: Option<&ObjectRef>) -> Result<(), EventError> {
        if self
            .responders
            .remove(&RequestKey::new(request, domain))
            .is_none()
        {
            return Err(EventError::ResponderNotFound(format!(
                "'{}' ({})",
                request,
                describe_scope(domain)
            )));
        }

        debug!("🗑️ Unregistered request '{}' ({})", request, describe_scope(domain));
        self.announce(RESPONDER_REMOVED, request);
        Ok(())
    }

    /// Sends `request` and returns the responder's answer.
    ///
    /// Returns `None` when no live responder is registered. Type mismatches
    /// between the caller and the responder are logged and also yield
    /// `None`; use [`RequestBus::try_send`] to observe them.
    pub fn send<A, R>(&self, request: &str, domain: Option<&ObjectRef>, args: A) -> Option<R>
    where
        A: Any + Send,
        R: Any + Send,
    {
        match self.try_send(request, domain, args) {
            Ok(result) => result,
            Err(e) => {
                warn!("⚠️ Request '{}' failed: {}", request, e);
                None
            }
        }
    }

    /// Like [`RequestBus::send`] but reports argument or result type
    /// mismatches as [`EventError::TypeMismatch`].
    pub fn try_send<A, R>(
        &self,
        request: &str,
        domain: Option<&ObjectRef>,
        args: A,
    ) -> Result<Option<R>, EventError>
    where
        A: Any + Send,
        R: Any + Send,
    {
        let key = RequestKey::new(request, domain);
        // Clone out so the responder may use the bus while answering.
        let Some(entry) = self.responders.get(&key).map(|entry| entry.clone()) else {
            return Ok(None);
        };

        let target = match entry.upgrade_if_alive() {
            Some(target) => target,
            None => {
                self.reclaim(&key, request);
                return Ok(None);
            }
        };

        let result = (entry.callback)(target.as_ref(), Box::new(args))?;
        result
            .downcast::<R>()
            .map(|result| Some(*result))
            .map_err(|_| EventError::TypeMismatch {
                request: request.to_string(),
                expected: type_name::<R>(),
            })
    }

    /// True if a live responder answers `(request, domain)`.
    pub fn has_responder(&self, request: &str, domain: Option<&ObjectRef>) -> bool {
        self.responders
            .get(&RequestKey::new(request, domain))
            .map(|entry| entry.is_alive())
            .unwrap_or(false)
    }

    /// Sorted, de-duplicated names of registered requests.
    pub fn registered_requests(&self) -> Vec<String> {
        let mut requests: Vec<String> = self
            .responders
            .iter()
            .map(|entry| entry.key().request.clone())
            .collect();
        requests.sort();
        requests.dedup();
        requests
    }

    /// Number of registrations, live or not yet reclaimed.
    pub fn responder_count(&self) -> usize {
        self.responders.len()
    }

    /// Removes every responder without announcing. Returns how many there were.
    pub fn clear(&self) -> usize {
        let removed = self.responders.len();
        self.responders.clear();
        removed
    }

    fn reclaim(&self, key: &RequestKey, request: &str) {
        if self
            .responders
            .remove_if(key, |_, entry| !entry.is_alive())
            .is_some()
        {
            debug!("🗑️ Reclaimed dead responder for request '{}'", request);
            self.announce(RESPONDER_REMOVED, request);
        }
    }

    fn announce(&self, event: &str, request: &str) {
        if let Some(notifications) = &self.notifications {
            let change = ResponderChange {
                request: request.to_string(),
            };
            notifications.publish(event, None, Some(Arc::new(change)));
        }
    }
}

impl Default for RequestBus {
    fn default() -> Self {
        Self::new()
    }
}
