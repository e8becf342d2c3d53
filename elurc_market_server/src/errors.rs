use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use elurc_market_engine::{transitions::TransitionError, CatalogApiError, MarketplaceError, OrderApiError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
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
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the resource. {0}")]
    Conflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingApiKey => StatusCode::UNAUTHORIZED,
                AuthError::InvalidApiKey => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
                AuthError::InvalidSignature(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No admin API key was provided.")]
    MissingApiKey,
    #[error("The admin API key is not valid.")]
    InvalidApiKey,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
    #[error("Request signature is invalid. {0}")]
    InvalidSignature(String),
}

impl From<MarketplaceError> for ServerError {
    fn from(e: MarketplaceError) -> Self {
        match e {
            MarketplaceError::OrderNotFound(_) | MarketplaceError::ProductNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            MarketplaceError::InvalidOrder(_) |
            MarketplaceError::InvalidWalletAddress(_) |
            MarketplaceError::InvalidPayment(_) => Self::InvalidRequestBody(e.to_string()),
            MarketplaceError::Transition(TransitionError::NoOp(_)) |
            MarketplaceError::Transition(TransitionError::Forbidden { .. }) |
            MarketplaceError::StatusChangedConcurrently(_) |
            MarketplaceError::InsufficientStock(_) |
            MarketplaceError::SignatureAlreadyUsed(_) |
            MarketplaceError::PaymentAlreadyRecorded(_) |
            MarketplaceError::PaymentNotAccepted(_, _) |
            MarketplaceError::NoPendingDiscrepancy(_) |
            MarketplaceError::AwaitingDiscrepancyReview(_) => Self::Conflict(e.to_string()),
            MarketplaceError::DatabaseError(_) => {
                error!("💻️ Database error: {e}");
                Self::BackendError(e.to_string())
            },
            MarketplaceError::OrderError(e) => e.into(),
            MarketplaceError::CatalogError(e) => e.into(),
        }
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::QueryError(_) => Self::InvalidRequestBody(e.to_string()),
            OrderApiError::DatabaseError(_) => {
                error!("💻️ Database error: {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<CatalogApiError> for ServerError {
    fn from(e: CatalogApiError) -> Self {
        match e {
            CatalogApiError::ProductNotFound(_) => Self::NoRecordFound(e.to_string()),
            CatalogApiError::SlugAlreadyExists(_) => Self::Conflict(e.to_string()),
            CatalogApiError::InvalidProduct(_) | CatalogApiError::NegativeStock(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            CatalogApiError::DatabaseError(_) => {
                error!("💻️ Database error: {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}
