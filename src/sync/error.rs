use crate::repository::RepositoryError;

/// Failure talking to the remote document store.
#[derive(Debug)]
pub enum RemoteError {
    /// Sync is not configured
    NotConfigured,
    /// Could not reach the server, or the request timed out
    Connection(String),
    /// Server answered with a non-success status
    Http { status: u16, body: String },
    /// Response body was not what we expected
    Decode(String),
}

impl RemoteError {
    /// Transient failures are retried with backoff. Unless the client is
    /// unauthorized, everything else is dead-lettered.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Connection(_) => true,
            RemoteError::Http { status, .. } => matches!(*status, 408 | 429) || *status >= 500,
            RemoteError::NotConfigured | RemoteError::Decode(_) => false,
        }
    }

    /// Missing or rejected credentials. These apply to every request, not
    /// to one document.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            RemoteError::NotConfigured => true,
            RemoteError::Http { status, .. } => matches!(*status, 401 | 403),
            RemoteError::Connection(_) | RemoteError::Decode(_) => false,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::NotConfigured => write!(
                f,
                "Sync not configured. Add server_url and api_key to config."
            ),
            RemoteError::Connection(e) => write!(f, "Connection error: {}", e),
            RemoteError::Http { status, body } if body.is_empty() => write!(f, "HTTP {}", status),
            RemoteError::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            RemoteError::Decode(e) => write!(f, "Invalid response: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            RemoteError::Connection(e.to_string())
        }
    }
}

#[derive(Debug)]
pub enum SyncError {
    Repository(RepositoryError),
    Remote(RemoteError),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_transient())
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Repository(e) => write!(f, "Local cache error: {}", e),
            SyncError::Remote(e) => write!(f, "Remote error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Repository(e) => Some(e),
            SyncError::Remote(e) => Some(e),
        }
    }
}

impl From<RepositoryError> for SyncError {
    fn from(e: RepositoryError) -> Self {
        SyncError::Repository(e)
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Repository(RepositoryError::Sqlite(e))
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote(e)
    }
}
