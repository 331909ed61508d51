//! Console error types.

use thiserror::Error;

/// Errors raised by the navigation guard, the route registry and the tab
/// session machinery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// A protected route was requested without a token.
    #[error("login session expired")]
    AuthExpired,

    /// The user session could not be fetched from the server.
    #[error("failed to fetch user session: {0}")]
    SessionFetch(String),

    /// A menu node could not be turned into a route definition.
    #[error("route registration failed for `{name}`: {reason}")]
    RouteRegistration { name: String, reason: String },

    /// A route with this name is already live.
    #[error("route `{0}` already registered")]
    DuplicateRoute(String),

    /// Menu data references itself through its ancestor chain.
    #[error("cyclic menu data at `{0}`")]
    MenuCycle(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Redirect chain did not settle.
    #[error("too many redirects while navigating to `{0}`")]
    TooManyRedirects(String),
}

impl ConsoleError {
    pub fn registration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConsoleError::RouteRegistration {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Storage(e.to_string())
    }
}

/// Result type alias using ConsoleError.
pub type ConsoleResult<T> = Result<T, ConsoleError>;
