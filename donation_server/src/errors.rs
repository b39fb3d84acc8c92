use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use donation_engine::{
    AdminAuthError,
    DonationFlowError,
    LedgerError,
    ProjectApiError,
    SettingsError,
    StatsApiError,
};
use log::error;
use serde_json::json;
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
    #[error("{0}")]
    ValidationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment provider could not process the request. {message}")]
    UpstreamError { donation_id: Option<i64>, message: String },
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSignature(_) => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::UpstreamError { donation_id: Some(id), .. } => json!({ "error": self.to_string(), "donation_id": id }),
            Self::BackendError(_) | Self::Unspecified(_) => {
                error!("💻️ {self}");
                json!({ "error": self.to_string() })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No session token was provided.")]
    MissingToken,
    #[error("The session token is invalid or has expired.")]
    InvalidSession,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Invalid callback signature. {0}")]
    InvalidSignature(String),
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DonationNotFound(_) | LedgerError::ProjectNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerError::InvalidTransition { .. } | LedgerError::DuplicateReceipt(_) => Self::Conflict(e.to_string()),
            LedgerError::ModificationNoOp => Self::ValidationError(e.to_string()),
            LedgerError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<DonationFlowError> for ServerError {
    fn from(e: DonationFlowError) -> Self {
        match e {
            DonationFlowError::Validation(_) |
            DonationFlowError::ProjectNotActive(_) |
            DonationFlowError::CheckoutMismatch(_) |
            DonationFlowError::InvalidTargetStatus(_) => Self::ValidationError(e.to_string()),
            DonationFlowError::ProjectNotFound(_) | DonationFlowError::DonationNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            DonationFlowError::AlreadySettled { .. } => Self::Conflict(e.to_string()),
            DonationFlowError::ProviderFailure { donation_id, .. } => {
                Self::UpstreamError { donation_id: Some(donation_id), message: e.to_string() }
            },
            DonationFlowError::Ledger(e) => e.into(),
        }
    }
}

impl From<ProjectApiError> for ServerError {
    fn from(e: ProjectApiError) -> Self {
        match e {
            ProjectApiError::Validation(_) | ProjectApiError::EmptyUpdate => Self::ValidationError(e.to_string()),
            ProjectApiError::ProjectNotFound(_) => Self::NoRecordFound(e.to_string()),
            ProjectApiError::Ledger(e) => e.into(),
        }
    }
}

impl From<StatsApiError> for ServerError {
    fn from(e: StatsApiError) -> Self {
        match e {
            StatsApiError::Ledger(e) => e.into(),
        }
    }
}

impl From<SettingsError> for ServerError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            SettingsError::InvalidValue { .. } | SettingsError::EmptyUpdate => Self::ValidationError(e.to_string()),
        }
    }
}

impl From<AdminAuthError> for ServerError {
    fn from(e: AdminAuthError) -> Self {
        match e {
            AdminAuthError::InvalidCredentials => Self::AuthenticationError(AuthError::InvalidCredentials),
            AdminAuthError::InvalidSession => Self::AuthenticationError(AuthError::InvalidSession),
            AdminAuthError::ValidationError(_) => Self::ValidationError(e.to_string()),
            AdminAuthError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            AdminAuthError::HashingError(_) => Self::BackendError(e.to_string()),
        }
    }
}
