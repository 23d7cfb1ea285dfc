use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiError {
    Config(String),
    /// The request never completed.
    Network(String),
    Timeout(String),
    /// The portal answered 4xx/5xx (other than 401).
    AuthService {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The portal answered 401 and no refresh could recover it.
    TokenExpired(String),
    Parse(String),
    Serialization(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthService { status, .. } => Some(*status),
            ApiError::TokenExpired(_) => Some(401),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::TokenExpired(_))
    }

    /// Message reported by the portal in the error envelope, if any.
    ///
    /// Transport-level failures carry no server message, so callers fall back
    /// to their own wording.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::AuthService { message, .. } | ApiError::TokenExpired(message)
                if !message.is_empty() =>
            {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Config(message) => write!(formatter, "Config error: {message}"),
            ApiError::Network(message) => write!(formatter, "Network error: {message}"),
            ApiError::Timeout(message) => write!(formatter, "Timeout: {message}"),
            ApiError::AuthService {
                status, message, ..
            } if message.is_empty() => write!(formatter, "Request failed ({status})"),
            ApiError::AuthService {
                status,
                code: Some(code),
                message,
            } => write!(formatter, "Request failed ({status} {code}): {message}"),
            ApiError::AuthService {
                status, message, ..
            } => write!(formatter, "Request failed ({status}): {message}"),
            ApiError::TokenExpired(message) if message.is_empty() => {
                write!(formatter, "Session expired")
            }
            ApiError::TokenExpired(message) => {
                write!(formatter, "Session expired: {message}")
            }
            ApiError::Parse(message) => write!(formatter, "Response error: {message}"),
            ApiError::Serialization(message) => {
                write!(formatter, "Request error: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
