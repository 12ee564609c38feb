use keel_core::ContainerError;
use keel_http::StreamError;
use std::fmt;

/// Failure surfaced by a request handler.
///
/// Converted into a 500 response by [`InternalErrorHandler`] when it is in
/// the chain; otherwise the connection shuts down.
///
/// [`InternalErrorHandler`]: crate::handlers::InternalErrorHandler
#[derive(Debug)]
pub enum HandlerError {
    Message(String),
    Source(Box<dyn std::error::Error>),
}

pub type HandlerResult = Result<(), HandlerError>;

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Message(message) => f.write_str(message),
            HandlerError::Source(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Source(source) => Some(source.as_ref()),
            HandlerError::Message(_) => None,
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Message(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Message(message.to_string())
    }
}

impl From<StreamError> for HandlerError {
    fn from(err: StreamError) -> Self {
        HandlerError::Source(Box::new(err))
    }
}

impl From<ContainerError> for HandlerError {
    fn from(err: ContainerError) -> Self {
        HandlerError::Source(Box::new(err))
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Source(Box::new(err))
    }
}
