// ABOUTME: Error types for job validation and remote worker calls
// ABOUTME: Carries the worker's detail message so failures stay actionable for the operator

use std::fmt;

/// Rejection of a job draft before anything is sent to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingTarget,
    PortOutOfRange(u32),
    MaxConnectionsNotPositive,
    ThreadCountNotPositive,
    TimeoutOutOfRange(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationError::MissingTarget => {
                write!(f, "Missing target: enter a target domain or IP address")
            }
            ValidationError::PortOutOfRange(port) => {
                write!(f, "Port {} is out of range (1-65535)", port)
            }
            ValidationError::MaxConnectionsNotPositive => {
                write!(f, "Max connections must be at least 1")
            }
            ValidationError::ThreadCountNotPositive => write!(f, "Thread count must be at least 1"),
            ValidationError::TimeoutOutOfRange(secs) => {
                write!(f, "Timeout of {}s is out of range (1-10 seconds)", secs)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure of a single exchange with the remote worker.
///
/// `code` is the HTTP status when the worker answered; `None` means the
/// request never got a response (connection refused, timeout, bad body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.code.is_none()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "Worker error ({}): {}", code, self.message),
            None => write!(f, "Transport error: {}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// What a start request can fail with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    Validation(ValidationError),
    Remote(RemoteError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestError::Validation(err) => write!(f, "{}", err),
            RequestError::Remote(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Validation(err) => Some(err),
            RequestError::Remote(err) => Some(err),
        }
    }
}

impl From<ValidationError> for RequestError {
    fn from(err: ValidationError) -> Self {
        RequestError::Validation(err)
    }
}

impl From<RemoteError> for RequestError {
    fn from(err: RemoteError) -> Self {
        RequestError::Remote(err)
    }
}
