use reqwest::StatusCode;
use thiserror::Error;

/// Every way a controller operation can fail.
///
/// The `Display` text is the message shown to the user, so variants carry
/// their final wording rather than a code.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Please log in first.")]
    NotLoggedIn,

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("{0} was rejected by the server.")]
    Rejected(&'static str),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Session store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl ClientError {
    /// True when the request never left the client.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::NotLoggedIn | ClientError::Io(_)
        )
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

pub(crate) const CREDENTIALS_REQUIRED: &str = "Username and password required.";
pub(crate) const FILE_REQUIRED: &str = "Please select a file.";
pub(crate) const HASH_REQUIRED: &str = "Please provide a File Hash.";
pub(crate) const HASH_AND_FILE_REQUIRED: &str = "Please provide a File Hash and select a new file.";
pub(crate) const QUERY_REQUIRED: &str = "Please enter a search query.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_user_facing() {
        assert_eq!(
            ClientError::Validation(HASH_REQUIRED).to_string(),
            "Please provide a File Hash."
        );
        assert_eq!(
            ClientError::Rejected("Delete").to_string(),
            "Delete was rejected by the server."
        );
        let http = ClientError::Http {
            status: StatusCode::NOT_FOUND,
            message: "File not found".into(),
        };
        assert_eq!(http.to_string(), "File not found");
        assert!(!http.is_local());
        assert!(ClientError::NotLoggedIn.is_local());
    }
}
