use std::error::Error;

use poem::error::ResponseError;
use poem_openapi::registry::{MetaResponses, Registry};
use poem_openapi::ApiResponse;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum LockgateError {
    #[error("database error: {0}")]
    DatabaseError(sea_orm::DbErr),
    #[error("not a valid IP address: {0}")]
    InvalidSubject(String),
    #[error("block not found: {0}")]
    BlockNotFound(Uuid),
    #[error("no attempt counter for {0}")]
    CounterNotFound(String),
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("credential store unavailable: {0}")]
    CredentialStoreUnavailable(String),
    /// An atomic counter update lost to a concurrent writer. Retried
    /// internally by the attempt tracker, never returned to callers.
    #[error("concurrent update conflict")]
    RaceLost,
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl From<sea_orm::DbErr> for LockgateError {
    fn from(err: sea_orm::DbErr) -> Self {
        // Connection-level failures surface as the retryable StoreUnavailable
        // kind; everything else stays a plain database error.
        match err {
            sea_orm::DbErr::Conn(e) => LockgateError::StoreUnavailable(e.to_string()),
            sea_orm::DbErr::ConnectionAcquire(e) => LockgateError::StoreUnavailable(e.to_string()),
            err => LockgateError::DatabaseError(err),
        }
    }
}

impl ResponseError for LockgateError {
    fn status(&self) -> poem::http::StatusCode {
        match self {
            LockgateError::InvalidSubject(_) => poem::http::StatusCode::BAD_REQUEST,
            LockgateError::BlockNotFound(_) | LockgateError::CounterNotFound(_) => {
                poem::http::StatusCode::NOT_FOUND
            }
            LockgateError::StoreUnavailable(_) => poem::http::StatusCode::SERVICE_UNAVAILABLE,
            _ => poem::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl LockgateError {
    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Other(Box::new(err))
    }
}

// Allows `Result<T, LockgateError>` to be returned from `poem-openapi`
// handlers. The response itself is produced via the `ResponseError` impl
// above; OpenAPI metadata mirrors poem-openapi's own impl for `poem::Error`.
impl ApiResponse for LockgateError {
    fn meta() -> MetaResponses {
        MetaResponses {
            responses: Vec::new(),
        }
    }

    fn register(_registry: &mut Registry) {}
}
