//! Relay failure taxonomy.

use thiserror::Error;

use courier_core::error::{AppError, ErrorKind};

/// Failures after a connection has been authenticated.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The per-connection subscription could not be provisioned.
    #[error("failed to create subscription on {topic}: {reason}")]
    SubscriptionCreateFailed {
        /// Topic the subscription was to be bound to.
        topic: String,
        /// Underlying failure.
        reason: String,
    },

    /// Writing to the connection failed; the connection is torn down.
    #[error("write to connection failed: {0}")]
    WriteFailed(String),

    /// A session, storage, or bus call failed.
    #[error("upstream collaborator failed: {0}")]
    UpstreamCollaboratorFailed(String),
}

impl RelayError {
    /// Short stable name of the variant, for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SubscriptionCreateFailed { .. } => "subscription_create_failed",
            Self::WriteFailed(_) => "write_failed",
            Self::UpstreamCollaboratorFailed(_) => "upstream_collaborator_failed",
        }
    }
}

impl From<AppError> for RelayError {
    fn from(err: AppError) -> Self {
        Self::UpstreamCollaboratorFailed(err.to_string())
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        let kind = match &err {
            RelayError::SubscriptionCreateFailed { .. } => ErrorKind::ServiceUnavailable,
            RelayError::WriteFailed(_) => ErrorKind::Internal,
            RelayError::UpstreamCollaboratorFailed(_) => ErrorKind::ExternalService,
        };
        AppError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_errors_become_upstream_failures() {
        let err: RelayError = AppError::storage("disk full").into();
        assert_eq!(err.label(), "upstream_collaborator_failed");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_subscription_failure_maps_to_unavailable() {
        let err = RelayError::SubscriptionCreateFailed {
            topic: "notifications-abc".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(AppError::from(err).kind, ErrorKind::ServiceUnavailable);
    }
}
