//! # Core Type Definitions
//!
//! Identity and reference types shared by every bus in the fabric.
//!
//! ## Key Types
//!
//! - [`ObjectRef`] - Weak, type-erased reference to an observer, subject,
//!   responder or domain
//! - [`ObjectKey`] - Address identity of the allocation an [`ObjectRef`] points to
//! - [`SubscriptionId`] / [`ActivityObserverId`] - Handles returned by registrations
//! - [`Payload`] - Type-erased notification data
//!
//! Tables never hold strong references to the objects they mention. Every
//! table entry keyed by an [`ObjectKey`] also stores the matching
//! [`ObjectRef`], which keeps the allocation (not the value) alive, so an
//! address cannot be handed out again while the key is still in a table.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Type-erased payload attached to a notification.
pub type Payload = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random identifier using UUID v4.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Handle for one registration on the [`NotificationBus`](crate::NotificationBus).
    SubscriptionId
);

uuid_id!(
    /// Handle for one observer entry on the [`ActivityPoller`](crate::ActivityPoller).
    ActivityObserverId
);

pub(crate) use uuid_id;

// ============================================================================
// Object identity
// ============================================================================

/// Address identity of a shared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(usize);

impl ObjectKey {
    /// Identity of the allocation behind `object`.
    pub fn of<T: ?Sized>(object: &Arc<T>) -> Self {
        Self(Arc::as_ptr(object) as *const () as usize)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Weak, type-erased reference to a shared object.
///
/// Used for observers, notification subjects, responders and request
/// domains. Holding an `ObjectRef` never keeps the object alive; callers
/// check [`ObjectRef::is_alive`] or [`ObjectRef::upgrade`] before use.
#[derive(Clone)]
pub struct ObjectRef {
    weak: Weak<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ObjectRef {
    /// Creates a weak reference to `object`.
    pub fn new<T: Any + Send + Sync>(object: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(object);
        Self {
            weak,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Creates a reference from an existing weak pointer.
    ///
    /// Works inside `Arc::new_cyclic`, before the first strong reference
    /// exists.
    pub fn from_weak<T: Any + Send + Sync>(weak: &Weak<T>) -> Self {
        let weak: Weak<T> = weak.clone();
        Self {
            weak,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Identity of the referenced allocation.
    pub fn key(&self) -> ObjectKey {
        ObjectKey(self.weak.as_ptr() as *const () as usize)
    }

    /// True while at least one strong reference to the object exists.
    pub fn is_alive(&self) -> bool {
        self.weak.strong_count() > 0
    }

    /// Upgrades to a strong, type-erased reference.
    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.weak.upgrade()
    }

    /// Upgrades and downcasts to the concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.upgrade()?.downcast::<T>().ok()
    }

    /// True if this reference points at `object`.
    pub fn refers_to<T: ?Sized>(&self, object: &Arc<T>) -> bool {
        self.key() == ObjectKey::of(object)
    }

    /// True if the referenced object is a `T`. False once the object is gone.
    pub fn is<T: Any>(&self) -> bool {
        self.upgrade()
            .map(|object| (*object).type_id() == TypeId::of::<T>())
            .unwrap_or(false)
    }

    /// Rust type name of the referenced object, for logs.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("type", &self.type_name)
            .field("key", &self.key())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Describes an optional scope (subject or domain) for logs and errors.
pub(crate) fn describe_scope(scope: Option<&ObjectRef>) -> String {
    match scope {
        Some(object) => format!("{}@{}", object.type_name(), object.key()),
        None => "global".to_string(),
    }
}
