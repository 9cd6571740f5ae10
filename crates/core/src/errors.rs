use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("request validation failed: {0}")]
    RequestValidation(String),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model call timed out after {timeout_secs}s")]
    ModelTimeout { timeout_secs: u64 },
    #[error("malformed model response: {0}")]
    MalformedModelResponse(String),
    #[error("session could not be created: {0}")]
    SessionCreation(String),
    #[error("session store failure: {0}")]
    SessionStore(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unprocessable request: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unprocessable { .. } => 422,
            Self::Internal { .. } => 500,
        }
    }

    /// Human-readable detail returned to HTTP callers.
    pub fn detail(&self) -> String {
        match self {
            Self::Unprocessable { message, .. } => message.clone(),
            Self::Internal { message, .. } => format!("Agent processing error: {message}"),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unprocessable { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }

    /// Stable class name for structured logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::RequestValidation(_)) => "request_validation",
            Self::Domain(_) => "domain",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::ModelTimeout { .. } => "model_timeout",
            Self::MalformedModelResponse(_) => "malformed_model_response",
            Self::SessionCreation(_) => "session_creation",
            Self::SessionStore(_) => "session_store",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::RequestValidation(message)) => {
                Self::Unprocessable { message, correlation_id: "unassigned".to_owned() }
            }
            other => Self::Internal { message: other.to_string(), correlation_id: "unassigned".to_owned() },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn request_validation_maps_to_unprocessable() {
        let interface = ApplicationError::from(DomainError::RequestValidation(
            "userMessage must not be empty".to_owned(),
        ))
        .into_interface("session-1");

        assert!(matches!(
            interface,
            InterfaceError::Unprocessable {
                ref correlation_id,
                ..
            } if correlation_id == "session-1"
        ));
        assert_eq!(interface.status_code(), 422);
        assert_eq!(interface.detail(), "userMessage must not be empty");
    }

    #[test]
    fn model_failures_map_to_internal() {
        let timeout = ApplicationError::ModelTimeout { timeout_secs: 30 }.into_interface("s-2");
        let unavailable =
            ApplicationError::ModelUnavailable("connection refused".to_owned()).into_interface("s-3");

        assert_eq!(timeout.status_code(), 500);
        assert_eq!(unavailable.status_code(), 500);
        assert_eq!(timeout.detail(), "Agent processing error: model call timed out after 30s");
    }

    #[test]
    fn invariant_violation_is_internal_not_client_error() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "stored transfer state is corrupt".to_owned(),
        ))
        .into_interface("s-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.status_code(), 500);
        assert_eq!(interface.detail(), "Agent processing error: domain invariant violation: stored transfer state is corrupt");
    }

    #[test]
    fn error_classes_are_stable() {
        assert_eq!(
            ApplicationError::MalformedModelResponse("eof".to_owned()).error_class(),
            "malformed_model_response"
        );
        assert_eq!(
            ApplicationError::SessionCreation("pool closed".to_owned()).error_class(),
            "session_creation"
        );
    }
}
