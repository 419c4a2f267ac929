use http::StatusCode;
use thiserror::Error;

/// Failures talking to the email-marketing API.
///
/// Whether one of these is fatal depends on the caller: contact resolution
/// propagates them, segment resolution and subscription log and skip.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API credential is not configured")]
    Configuration,

    #[error("network error after {attempts} attempts: {source}")]
    Network {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limit still exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("API returned an invalid response ({status}): {snippet}")]
    MalformedResponse { status: StatusCode, snippet: String },

    #[error("API rejected the request ({status}): {message}")]
    Rejection { status: StatusCode, message: String },

    #[error("a contact with this email already exists")]
    DuplicateContact,

    #[error("could not build request URL: {0}")]
    InvalidUrl(String),

    #[error("could not build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Configuration => "configuration",
            ApiError::Network { .. } => "network",
            ApiError::RateLimitExceeded { .. } => "rate_limit",
            ApiError::MalformedResponse { .. } => "malformed_response",
            ApiError::Rejection { .. } | ApiError::DuplicateContact => "rejected",
            ApiError::InvalidUrl(_) | ApiError::ClientBuild(_) => "configuration",
        }
    }
}

/// Failures surfaced to the caller of a registration.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Chave da API não configurada")]
    Configuration,

    #[error("could not resolve contact: {0}")]
    ContactResolution(#[source] ApiError),

    #[error("contact not found after duplicate-email rejection")]
    ContactNotFoundAfterDuplicate,
}

impl From<ApiError> for RegistrationError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Configuration => RegistrationError::Configuration,
            other => RegistrationError::ContactResolution(other),
        }
    }
}

impl RegistrationError {
    pub fn category(&self) -> &'static str {
        match self {
            RegistrationError::Configuration => "configuration",
            RegistrationError::ContactResolution(inner) => inner.category(),
            RegistrationError::ContactNotFoundAfterDuplicate => "rejected",
        }
    }
}
