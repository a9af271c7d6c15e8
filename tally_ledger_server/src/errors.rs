use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use tally_ledger_engine::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error(transparent)]
    LedgerError(LedgerError),
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        if e.is_client_error() {
            Self::LedgerError(e)
        } else {
            Self::BackendError(e.to_string())
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::LedgerError(e) => match e {
                LedgerError::AccountNotFound(_)
                | LedgerError::PackageNotFound(_)
                | LedgerError::SessionNotFound(_)
                | LedgerError::ContractNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::InsufficientFunds { .. } | LedgerError::InsufficientEscrowFunds { .. } => {
                    StatusCode::PAYMENT_REQUIRED
                },
                LedgerError::DuplicateSource { .. } | LedgerError::InvalidTransition(_) => StatusCode::CONFLICT,
                LedgerError::PackageNotActive(_)
                | LedgerError::PackageKindMismatch { .. }
                | LedgerError::AmountMismatch { .. }
                | LedgerError::SplitMismatch { .. } => StatusCode::BAD_REQUEST,
                LedgerError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}
