use thiserror::Error;

/// Failures raised while compiling a route pattern or turning params back into a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route pattern `{pattern}` is malformed: {reason}")]
    Malformed { pattern: String, reason: String },
    #[error("missing required param `{name}` for route `{pattern}`")]
    MissingParam { pattern: String, name: String },
    #[error("param `{name}` for route `{pattern}` must be a single path segment, got `{value}`")]
    InvalidParam {
        pattern: String,
        name: String,
        value: String,
    },
}

impl RouteError {
    pub fn malformed(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Descriptor errors are fatal at compile time and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("page descriptor for `{route}` is invalid: {message}")]
    Validation { route: String, message: String },
}

impl DescriptorError {
    pub fn validation(route: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            route: route.to_string(),
            message: message.into(),
        }
    }
}
