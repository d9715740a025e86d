//! # Error Types
//!
//! Errors raised by the Foundry event fabric.
//!
//! Registration and unregistration failures are programmer errors and are
//! returned to the caller. Failures that happen while dispatching (handler
//! errors, dead references, unavailable idle samples) are logged and
//! swallowed by the dispatch loops so one subscriber cannot break the others.

use thiserror::Error;

/// Errors produced by the notification bus, the request bus and the
/// activity poller.
#[derive(Error, Debug)]
pub enum EventError {
    /// A responder is already registered for this request and domain.
    #[error("Responder already registered for request '{request}' (domain: {domain})")]
    DuplicateResponder {
        /// Request name.
        request: String,
        /// Domain description, `global` when unscoped.
        domain: String,
    },
    /// No subscription matched an unsubscribe call.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),
    /// No responder is registered for this request and domain.
    #[error("Responder not found: {0}")]
    ResponderNotFound(String),
    /// No activity observer matched a removal call.
    #[error("Activity observer not found: {0}")]
    ActivityObserverNotFound(String),
    /// Request arguments or result did not have the type the caller expected.
    #[error("Type mismatch for request '{request}': expected {expected}")]
    TypeMismatch {
        /// Request name.
        request: String,
        /// Name of the type the receiving side expected.
        expected: &'static str,
    },
    /// A handler reported a failure while processing a notification.
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// A preference value could not be converted.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventError {
    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::DuplicateResponder { .. } => "duplicate_responder",
            EventError::SubscriptionNotFound(_) => "subscription_not_found",
            EventError::ResponderNotFound(_) => "responder_not_found",
            EventError::ActivityObserverNotFound(_) => "activity_observer_not_found",
            EventError::TypeMismatch { .. } => "type_mismatch",
            EventError::HandlerExecution(_) => "handler_execution",
            EventError::Serialization(_) => "serialization",
        }
    }

    /// True for the "nothing registered under that key" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EventError::SubscriptionNotFound(_)
                | EventError::ResponderNotFound(_)
                | EventError::ActivityObserverNotFound(_)
        )
    }
}

/// Errors produced when sampling user idle time.
///
/// The poller treats every variant the same way: the sample is unknown for
/// that tick and user-activity thresholds cannot match.
#[derive(Error, Debug)]
pub enum IdleTimeError {
    /// The platform has no idle-time source.
    #[error("idle time is unavailable on this platform")]
    Unavailable,
    /// The external query could not be run.
    #[error("idle time query failed: {0}")]
    Command(#[from] std::io::Error),
    /// The external query ran but its output was not understood.
    #[error("idle time output could not be parsed: {0}")]
    Parse(String),
}

impl IdleTimeError {
    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            IdleTimeError::Unavailable => "idle_unavailable",
            IdleTimeError::Command(_) => "idle_command_failed",
            IdleTimeError::Parse(_) => "idle_parse_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = EventError::DuplicateResponder {
            request: "glyph.render".to_string(),
            domain: "global".to_string(),
        };
        assert_eq!(err.as_label(), "duplicate_responder");
        assert!(!err.is_not_found());

        let err = EventError::ResponderNotFound("glyph.render".to_string());
        assert!(err.is_not_found());
        assert_eq!(IdleTimeError::Unavailable.as_label(), "idle_unavailable");
    }

    #[test]
    fn test_display_includes_request_and_domain() {
        let err = EventError::DuplicateResponder {
            request: "glyph.render".to_string(),
            domain: "global".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("glyph.render"));
        assert!(message.contains("global"));
    }
}
