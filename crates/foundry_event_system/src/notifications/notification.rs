//! The value handed to every notification observer.

use crate::types::{ObjectRef, Payload};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A published notification.
///
/// Carries the event name, a weak reference to the subject the notification
/// is about (if any) and an optional type-erased payload. Observers read the
/// payload with [`Notification::data`].
#[derive(Clone)]
pub struct Notification {
    name: String,
    subject: Option<ObjectRef>,
    data: Option<Payload>,
}

impl Notification {
    pub(crate) fn new(name: &str, subject: Option<ObjectRef>, data: Option<Payload>) -> Self {
        Self {
            name: name.to_string(),
            subject,
            data,
        }
    }

    /// Event name this notification was published under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Weak reference to the subject, `None` for global notifications.
    pub fn subject(&self) -> Option<&ObjectRef> {
        self.subject.as_ref()
    }

    /// Upgrades the subject to its concrete type.
    ///
    /// Returns `None` when there is no subject, it has been dropped, or it
    /// is not a `T`.
    pub fn subject_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.subject.as_ref()?.downcast::<T>()
    }

    /// Borrows the payload as a `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref()?.downcast_ref::<T>()
    }

    /// True if a payload was attached.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Shared handle to the raw payload, for re-posting.
    pub fn payload(&self) -> Option<Payload> {
        self.data.clone()
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("name", &self.name)
            .field("subject", &self.subject)
            .field("data", &self.data.as_ref().map(|_| "[payload]"))
            .finish()
    }
}
